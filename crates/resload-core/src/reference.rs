//! Resource identifier.
//!
//! Classifies references as local paths or remote URLs and resolves
//! relative references against a base directory or base URL.

use std::fmt;
use std::path::{Component, Path, PathBuf};
use url::Url;

/// A reference normalized to absolute form and classified local or remote.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResolvedReference {
    /// A filesystem path.
    Local(PathBuf),
    /// An absolute URL (kept as text; parse errors surface at retrieval).
    Remote(String),
}

impl ResolvedReference {
    #[must_use]
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local(_))
    }

    #[must_use]
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_))
    }

    #[must_use]
    pub fn as_local(&self) -> Option<&Path> {
        match self {
            Self::Local(path) => Some(path),
            Self::Remote(_) => None,
        }
    }

    #[must_use]
    pub fn as_remote(&self) -> Option<&str> {
        match self {
            Self::Local(_) => None,
            Self::Remote(url) => Some(url),
        }
    }

    /// The last path segment, without query string or fragment.
    #[must_use]
    pub fn file_name(&self) -> Option<String> {
        match self {
            Self::Local(path) => path.file_name().map(|n| n.to_string_lossy().into_owned()),
            Self::Remote(raw) => {
                let path = match Url::parse(raw) {
                    Ok(url) => url.path().to_string(),
                    Err(_) => raw
                        .split(['?', '#'])
                        .next()
                        .unwrap_or_default()
                        .to_string(),
                };
                path.rsplit('/')
                    .next()
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
            }
        }
    }
}

impl fmt::Display for ResolvedReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local(path) => write!(f, "{}", path.display()),
            Self::Remote(url) => write!(f, "{url}"),
        }
    }
}

/// Parse `s` as an absolute URL with a real scheme.
///
/// Single-letter schemes are rejected so `C:\dir` stays a path.
fn parse_absolute_url(s: &str) -> Option<Url> {
    let url = Url::parse(s).ok()?;
    (url.scheme().len() > 1).then_some(url)
}

/// Resolve `reference` against `base`.
///
/// `base` may be a local directory or an absolute URL. Resolution never
/// fails; malformed input is reported when the resource is retrieved.
#[must_use]
pub fn resolve(reference: &str, base: &str) -> ResolvedReference {
    if let Some(url) = parse_absolute_url(reference) {
        return from_url(url, reference);
    }

    if let Some(base_url) = parse_absolute_url(base) {
        if base_url.scheme() == "file" {
            if let Ok(dir) = base_url.to_file_path() {
                return resolve_local(reference, &dir);
            }
        }
        return match base_url.join(reference) {
            Ok(joined) => from_url(joined, reference),
            Err(_) => ResolvedReference::Remote(format!("{base}{reference}")),
        };
    }

    resolve_local(reference, Path::new(base))
}

fn from_url(url: Url, raw: &str) -> ResolvedReference {
    if url.scheme() == "file" {
        if let Ok(path) = url.to_file_path() {
            return ResolvedReference::Local(path);
        }
        return ResolvedReference::Remote(raw.to_string());
    }
    ResolvedReference::Remote(url.into())
}

fn resolve_local(reference: &str, base: &Path) -> ResolvedReference {
    let path = Path::new(reference);
    if path.is_absolute() {
        return ResolvedReference::Local(path.to_path_buf());
    }
    ResolvedReference::Local(normalize_path(&base.join(path)))
}

/// Normalize a path by removing `.` and resolving `..` components.
#[must_use]
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let at_parent =
                    matches!(result.components().next_back(), Some(Component::ParentDir));
                if at_parent || result.as_os_str().is_empty() {
                    result.push("..");
                } else {
                    // No-op at the root.
                    result.pop();
                }
            }
            other => result.push(other),
        }
    }
    result
}

/// The process working directory, or `.` if it cannot be determined.
#[must_use]
pub fn current_dir() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

/// Default base: the explicit base path if given, else the working directory.
#[must_use]
pub fn default_base(base_path: Option<&str>) -> String {
    base_path.map_or_else(
        || current_dir().to_string_lossy().into_owned(),
        str::to_string,
    )
}

/// Whether a string looks like a path or URL reference.
///
/// Matches absolute paths, `./` and `../` relative paths, and absolute
/// `http`, `https` and `file` URLs. Bare words do not match.
#[must_use]
pub fn is_path_like(s: &str) -> bool {
    if s.starts_with("./") || s.starts_with("../") || s.starts_with(".\\") || s.starts_with("..\\")
    {
        return true;
    }

    if is_absolute_path(s) {
        return true;
    }

    parse_absolute_url(s).is_some_and(|url| matches!(url.scheme(), "http" | "https" | "file"))
}

fn is_absolute_path(s: &str) -> bool {
    if s.starts_with('/') || s.starts_with("\\\\") {
        return true;
    }

    // Windows drive: C:\ or C:/
    let bytes = s.as_bytes();
    bytes.len() >= 3
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && (bytes[2] == b'\\' || bytes[2] == b'/')
}
