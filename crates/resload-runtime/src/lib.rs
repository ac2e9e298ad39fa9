//! Module execution environment and loader for resload.
//!
//! Uses deno_core (V8) to execute code resources as CommonJS-style modules.
//!
//! ## Usage
//!
//! ```ignore
//! use resload_runtime::{Loaded, Loader};
//! use resload_core::LoadOptions;
//!
//! let loader = Loader::new()?;
//! match loader.load("./config.js", &LoadOptions::new()).await? {
//!     Loaded::Text(text) => println!("{text}"),
//!     Loaded::Module(module) => println!("{}", module.exports().to_json()?),
//! }
//! ```

mod engine;
mod loader;
mod module;

pub use loader::{Loaded, Loader};
pub use module::{JsValue, Module};
pub use resload_core::{LoadError, LoadOptions, LoaderConfig, Resolved, Structure};
