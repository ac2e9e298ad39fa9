//! Content classifier.

use crate::reference::ResolvedReference;

/// How a retrieved resource is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    /// Opaque data, returned as text.
    Data,
    /// Executable module source.
    Code,
}

/// Classify a resolved reference by the suffix of its final path segment.
#[must_use]
pub fn classify<S: AsRef<str>>(
    reference: &ResolvedReference,
    code_extensions: &[S],
) -> ContentKind {
    let Some(name) = reference.file_name() else {
        return ContentKind::Data;
    };

    if is_code_file(&name, code_extensions) {
        ContentKind::Code
    } else {
        ContentKind::Data
    }
}

/// Whether a file name ends with one of the code extensions.
#[must_use]
pub fn is_code_file<S: AsRef<str>>(name: &str, code_extensions: &[S]) -> bool {
    code_extensions.iter().any(|ext| {
        let ext = ext.as_ref();
        name.len() > ext.len() && name.ends_with(ext)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_CODE_EXTENSIONS;
    use crate::reference::resolve;

    #[test]
    fn test_local_js_is_code() {
        let reference = resolve("./lib/index.js", "/srv");
        assert_eq!(classify(&reference, DEFAULT_CODE_EXTENSIONS), ContentKind::Code);
    }

    #[test]
    fn test_text_is_data() {
        let reference = resolve("./file.txt", "/srv");
        assert_eq!(classify(&reference, DEFAULT_CODE_EXTENSIONS), ContentKind::Data);
    }

    #[test]
    fn test_remote_query_string_ignored() {
        let reference = resolve("http://test.com/index.js?cache=1", "/");
        assert_eq!(classify(&reference, DEFAULT_CODE_EXTENSIONS), ContentKind::Code);

        let reference = resolve("http://test.com/data.json?x=.js", "/");
        assert_eq!(classify(&reference, DEFAULT_CODE_EXTENSIONS), ContentKind::Data);
    }

    #[test]
    fn test_bare_extension_is_not_code() {
        assert!(!is_code_file(".js", DEFAULT_CODE_EXTENSIONS));
        assert!(is_code_file("a.cjs", DEFAULT_CODE_EXTENSIONS));
        assert!(!is_code_file("a.json", DEFAULT_CODE_EXTENSIONS));
    }

    #[test]
    fn test_custom_extensions() {
        let reference = resolve("./main.mjs", "/srv");
        assert_eq!(classify(&reference, &[".mjs"]), ContentKind::Code);
        assert_eq!(classify(&reference, DEFAULT_CODE_EXTENSIONS), ContentKind::Data);
    }
}
