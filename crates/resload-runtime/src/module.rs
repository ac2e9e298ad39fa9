//! Handles to executed modules and the values they export.

use crate::engine::ScriptEngine;
use deno_core::v8;
use resload_core::{resolve_dependency, Dependency, LoadError};
use std::cell::RefCell;
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// A value living in the thread's isolate.
///
/// Keeps the isolate alive for as long as the handle exists.
pub struct JsValue {
    // Must drop before `engine`.
    value: v8::Global<v8::Value>,
    engine: Rc<RefCell<ScriptEngine>>,
}

impl JsValue {
    pub(crate) fn new(engine: Rc<RefCell<ScriptEngine>>, value: v8::Global<v8::Value>) -> Self {
        Self { value, engine }
    }

    /// The JS `typeof` of this value.
    #[must_use]
    pub fn type_of(&self) -> String {
        self.engine.borrow_mut().type_of(&self.value)
    }

    #[must_use]
    pub fn is_object(&self) -> bool {
        self.engine.borrow_mut().is_object(&self.value)
    }

    #[must_use]
    pub fn is_function(&self) -> bool {
        self.engine.borrow_mut().is_function(&self.value)
    }

    #[must_use]
    pub fn as_string(&self) -> Option<String> {
        self.engine.borrow_mut().as_string(&self.value)
    }

    /// Read a property; `None` when absent or when this is not an object.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<JsValue> {
        let found = self.engine.borrow_mut().get(&self.value, key)?;
        Some(Self::new(Rc::clone(&self.engine), found))
    }

    /// Convert to a JSON value.
    pub fn to_json(&self) -> Result<serde_json::Value, LoadError> {
        self.engine.borrow_mut().to_json(&self.value)
    }
}

impl fmt::Debug for JsValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsValue")
            .field("type", &self.type_of())
            .finish()
    }
}

/// An executed module.
///
/// Dropping it unregisters the module from the engine; values already taken
/// from its exports stay usable.
pub struct Module {
    id: u32,
    filename: String,
    dirname: PathBuf,
    exports: JsValue,
}

impl Module {
    pub(crate) fn new(
        engine: Rc<RefCell<ScriptEngine>>,
        id: u32,
        filename: String,
        dirname: PathBuf,
        exports: v8::Global<v8::Value>,
    ) -> Self {
        Self {
            id,
            filename,
            dirname,
            exports: JsValue::new(engine, exports),
        }
    }

    /// The module's `__filename`: a local path or a URL.
    #[must_use]
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// The module's `__dirname`, the base for its relative dependencies.
    #[must_use]
    pub fn dirname(&self) -> &Path {
        &self.dirname
    }

    /// `module.exports` as it stood when execution finished.
    #[must_use]
    pub fn exports(&self) -> &JsValue {
        &self.exports
    }

    /// Call this module's `require`.
    pub fn require(&self, specifier: &str) -> Result<JsValue, LoadError> {
        let engine = &self.exports.engine;
        let value = engine
            .borrow_mut()
            .require(self.id, specifier, &self.filename)?;
        Ok(JsValue::new(Rc::clone(engine), value))
    }

    /// Where `require(specifier)` would go, without loading it.
    pub fn resolve(&self, specifier: &str) -> Result<Dependency, LoadError> {
        resolve_dependency(specifier, &self.dirname)
    }
}

impl Drop for Module {
    fn drop(&mut self) {
        // Runs before `exports` drops, so the engine is still alive.
        if let Ok(mut engine) = self.exports.engine.try_borrow_mut() {
            if let Err(err) = engine.release(self.id) {
                tracing::warn!(id = self.id, error = %err, "failed to release module");
            }
        }
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("id", &self.id)
            .field("filename", &self.filename)
            .field("dirname", &self.dirname)
            .finish_non_exhaustive()
    }
}
