//! Dependency resolution for executed modules.
//!
//! A module's `require(name)` is routed by the shape of `name`:
//! - builtin names (`path`, `node:fs`, ...) resolve to a native module
//! - `./` and `../` names resolve against the module's directory context
//! - everything else is an installed package, looked up in `node_modules`
//!   directories walking up from the module's directory context
//!
//! Classification is purely syntactic; only the second step touches the
//! filesystem.

use crate::error::LoadError;
use crate::reference::normalize_path;
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::trace;

/// Names served by the engine's native module table.
pub const BUILTIN_MODULES: &[&str] = &["events", "fs", "os", "path", "util"];

/// Optional prefix accepted in front of builtin names.
pub const BUILTIN_PREFIX: &str = "node:";

/// Extensions probed for relative and package targets, in order.
pub const PROBE_EXTENSIONS: &[&str] = &[".js", ".cjs", ".json"];

/// Syntactic class of a dependency name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyKind {
    Native,
    Relative,
    Absolute,
    Package,
}

/// Result of resolving a dependency name from a module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Dependency {
    /// A builtin, by canonical (unprefixed) name.
    Native { name: String },
    /// A file addressed relative to (or absolutely from) the module.
    Relative { path: PathBuf },
    /// The entry file of an installed package.
    Package { path: PathBuf },
}

impl Dependency {
    /// Resolved file path, for non-native dependencies.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Native { .. } => None,
            Self::Relative { path } | Self::Package { path } => Some(path),
        }
    }
}

/// Whether `name` is a builtin module name (with or without `node:`).
#[must_use]
pub fn is_builtin(name: &str) -> bool {
    let name = name.strip_prefix(BUILTIN_PREFIX).unwrap_or(name);
    BUILTIN_MODULES.contains(&name)
}

/// Classify a dependency name by shape alone.
#[must_use]
pub fn classify_dependency(name: &str) -> DependencyKind {
    if name.starts_with("./") || name.starts_with("../") || name == "." || name == ".." {
        return DependencyKind::Relative;
    }

    if Path::new(name).is_absolute() {
        return DependencyKind::Absolute;
    }

    if !name.contains('/') && !name.contains('\\') && is_builtin(name) {
        return DependencyKind::Native;
    }

    DependencyKind::Package
}

/// Resolve a dependency name from a module whose directory context is
/// `dirname`.
///
/// # Errors
/// Returns `LoadError::Resolution` if no file matches.
pub fn resolve_dependency(name: &str, dirname: &Path) -> Result<Dependency, LoadError> {
    let kind = classify_dependency(name);
    trace!(name, ?kind, dirname = %dirname.display(), "Routing dependency");

    let unresolved = || LoadError::Resolution {
        specifier: name.to_string(),
        from: dirname.to_path_buf(),
    };

    match kind {
        DependencyKind::Native => Ok(Dependency::Native {
            name: name
                .strip_prefix(BUILTIN_PREFIX)
                .unwrap_or(name)
                .to_string(),
        }),
        DependencyKind::Relative => {
            let base = normalize_path(&dirname.join(name));
            resolve_path(&base)
                .map(|path| Dependency::Relative { path })
                .ok_or_else(unresolved)
        }
        DependencyKind::Absolute => resolve_path(Path::new(name))
            .map(|path| Dependency::Relative { path })
            .ok_or_else(unresolved),
        DependencyKind::Package => resolve_package(name, dirname)
            .map(|path| Dependency::Package { path })
            .ok_or_else(unresolved),
    }
}

/// Resolve a path with extension probing and directory resolution.
fn resolve_path(base: &Path) -> Option<PathBuf> {
    if base.is_file() {
        return Some(base.to_path_buf());
    }

    for ext in PROBE_EXTENSIONS {
        let mut appended = base.as_os_str().to_owned();
        appended.push(ext);
        let candidate = PathBuf::from(appended);
        if candidate.is_file() {
            return Some(candidate);
        }
    }

    if base.is_dir() {
        return resolve_directory(base);
    }

    None
}

/// Resolve a directory: `package.json` `main`, then `index.*`.
fn resolve_directory(dir: &Path) -> Option<PathBuf> {
    let pkg_json_path = dir.join("package.json");

    if let Some(main) = read_main(&pkg_json_path) {
        let main_path = normalize_path(&dir.join(main));
        if main_path.is_file() {
            return Some(main_path);
        }
        for ext in PROBE_EXTENSIONS {
            let mut appended = main_path.as_os_str().to_owned();
            appended.push(ext);
            let candidate = PathBuf::from(appended);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
        if main_path.is_dir() {
            if let Some(index) = find_index(&main_path) {
                return Some(index);
            }
        }
    }

    find_index(dir)
}

fn find_index(dir: &Path) -> Option<PathBuf> {
    PROBE_EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("index{ext}")))
        .find(|index| index.is_file())
}

/// Read the `main` field of a package.json, if any.
fn read_main(pkg_json_path: &Path) -> Option<String> {
    let content = std::fs::read_to_string(pkg_json_path).ok()?;
    let value: Value = serde_json::from_str(&content).ok()?;
    value
        .get("main")
        .and_then(Value::as_str)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
}

/// Resolve an installed package via `node_modules`, walking up from `dirname`.
fn resolve_package(spec: &str, dirname: &Path) -> Option<PathBuf> {
    if spec.is_empty() {
        return None;
    }

    let (pkg_name, subpath) = parse_bare_specifier(spec);
    let mut current = Some(dirname);

    while let Some(dir) = current {
        let pkg_dir = dir.join("node_modules").join(pkg_name);

        if pkg_dir.is_dir() {
            let target = match subpath {
                Some(sub) => resolve_path(&pkg_dir.join(sub)),
                None => resolve_path(&pkg_dir),
            };
            if target.is_some() {
                return target;
            }
        }

        current = dir.parent();
    }

    None
}

/// Parse a bare specifier into package name and optional subpath.
fn parse_bare_specifier(spec: &str) -> (&str, Option<&str>) {
    // Scoped package: @scope/pkg or @scope/pkg/subpath
    if spec.starts_with('@') {
        let mut slash_count = 0;
        for (i, c) in spec.char_indices() {
            if c == '/' {
                slash_count += 1;
                if slash_count == 2 {
                    return (&spec[..i], Some(&spec[i + 1..]));
                }
            }
        }
        return (spec, None);
    }

    if let Some(pos) = spec.find('/') {
        (&spec[..pos], Some(&spec[pos + 1..]))
    } else {
        (spec, None)
    }
}
