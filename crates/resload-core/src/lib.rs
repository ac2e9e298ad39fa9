#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

//! Core of resload: resolve a reference, retrieve it (revalidating remote
//! copies), and decide whether it is data or code.

pub mod cache;
pub mod classify;
pub mod config;
pub mod dependency;
pub mod error;
pub mod fetch;
pub mod reference;
pub mod structure;

pub use cache::{CacheEntry, ConditionalHeaders, RevalidationCache};
pub use classify::{classify, ContentKind};
pub use config::{LoadOptions, LoaderConfig};
pub use dependency::{
    classify_dependency, is_builtin, resolve_dependency, Dependency, DependencyKind,
    BUILTIN_MODULES,
};
pub use error::{codes, ErrorKind, LoadError};
pub use fetch::Fetcher;
pub use reference::{is_path_like, resolve, ResolvedReference};
pub use structure::{resolve_structure, Resolved, Structure};
