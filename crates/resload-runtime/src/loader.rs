//! The loader facade: resolve, retrieve, classify, execute.

use crate::engine::ScriptEngine;
use crate::module::Module;
use resload_core::reference::{current_dir, default_base};
use resload_core::{
    classify, resolve, resolve_structure, ContentKind, Fetcher, LoadError, LoadOptions,
    LoaderConfig, Resolved, ResolvedReference, RevalidationCache, Structure,
};
use serde_json::Value;
use std::cell::{OnceCell, RefCell};
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;
use tracing::debug;

/// Result of loading one reference.
#[derive(Debug)]
pub enum Loaded {
    /// A data resource, decoded to text.
    Text(String),
    /// An executed code resource.
    Module(Module),
}

impl Loaded {
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Module(_) => None,
        }
    }

    #[must_use]
    pub fn as_module(&self) -> Option<&Module> {
        match self {
            Self::Module(module) => Some(module),
            Self::Text(_) => None,
        }
    }

    /// JSON form: the text as a string, or the module's exports.
    pub fn to_json(&self) -> Result<Value, LoadError> {
        match self {
            Self::Text(text) => Ok(Value::String(text.clone())),
            Self::Module(module) => module.exports().to_json(),
        }
    }
}

/// Loads local and remote references.
///
/// A loader owns its revalidation cache handle. Code runs in the script
/// engine of the loader's thread, shared with every other loader there, so
/// modules from different loaders see one global scope. It is not `Send`:
/// drive it from one task.
pub struct Loader {
    config: LoaderConfig,
    fetcher: Fetcher,
    cache: Arc<RevalidationCache>,
    engine: OnceCell<Rc<RefCell<ScriptEngine>>>,
}

impl Loader {
    /// Loader with default configuration and a fresh cache.
    pub fn new() -> Result<Self, LoadError> {
        Self::with_config(LoaderConfig::default())
    }

    pub fn with_config(config: LoaderConfig) -> Result<Self, LoadError> {
        Self::with_cache(config, RevalidationCache::shared())
    }

    /// Loader sharing an existing cache.
    pub fn with_cache(config: LoaderConfig, cache: Arc<RevalidationCache>) -> Result<Self, LoadError> {
        let fetcher = Fetcher::new(&config)?;
        Ok(Self {
            config,
            fetcher,
            cache,
            engine: OnceCell::new(),
        })
    }

    #[must_use]
    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<RevalidationCache> {
        &self.cache
    }

    /// Resolve `reference` against the options' base path.
    #[must_use]
    pub fn resolve(&self, reference: &str, options: &LoadOptions) -> ResolvedReference {
        resolve(reference, &default_base(options.base_path.as_deref()))
    }

    /// Load one reference: text for data, an executed module for code.
    pub async fn load(&self, reference: &str, options: &LoadOptions) -> Result<Loaded, LoadError> {
        let resolved = self.resolve(reference, options);
        debug!(reference, resolved = %resolved, "loading");

        let text = self.fetcher.fetch(&resolved, &self.cache).await?;
        match classify(&resolved, &self.config.code_extensions) {
            ContentKind::Data => Ok(Loaded::Text(text)),
            ContentKind::Code => self.execute(&text, &resolved, options).map(Loaded::Module),
        }
    }

    /// Load every reference in `value`, concurrently per level.
    pub async fn load_structure<T>(
        &self,
        value: Structure<T>,
        options: &LoadOptions,
    ) -> Result<Resolved<Loaded, T>, LoadError> {
        let load = |reference: String| async move { self.load(&reference, options).await };
        resolve_structure(value, &load).await
    }

    /// Load a JSON value, treating path-like strings as references.
    pub async fn load_json(
        &self,
        value: Value,
        options: &LoadOptions,
    ) -> Result<Resolved<Loaded, Value>, LoadError> {
        self.load_structure(Structure::from_json(value), options)
            .await
    }

    /// Execute already retrieved source as the module at `resolved`.
    pub fn execute(
        &self,
        source: &str,
        resolved: &ResolvedReference,
        options: &LoadOptions,
    ) -> Result<Module, LoadError> {
        let dirname = module_dirname(resolved, options);
        let filename = resolved.to_string();
        let engine = self.engine()?;

        let (id, exports) = engine
            .borrow_mut()
            .execute(source, &filename, &dirname, &self.config.code_extensions)?;
        Ok(Module::new(Rc::clone(engine), id, filename, dirname, exports))
    }

    fn engine(&self) -> Result<&Rc<RefCell<ScriptEngine>>, LoadError> {
        if let Some(engine) = self.engine.get() {
            return Ok(engine);
        }
        let engine = ScriptEngine::for_current_thread()?;
        Ok(self.engine.get_or_init(|| engine))
    }
}

/// Directory context of a module: the override, the file's directory, or
/// the working directory for remote modules.
fn module_dirname(resolved: &ResolvedReference, options: &LoadOptions) -> PathBuf {
    if let Some(dirname) = &options.dirname {
        return dirname.clone();
    }
    resolved
        .as_local()
        .and_then(|path| path.parent())
        .map_or_else(current_dir, PathBuf::from)
}
