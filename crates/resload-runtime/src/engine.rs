//! Script engine using deno_core.
//!
//! One isolate per thread hosts every module loaded on that thread. V8
//! requires isolates on a thread to be dropped in reverse creation order,
//! which loaders with independent lifetimes cannot promise, so they share
//! the thread's engine instead of owning one each.
//!
//! The environment script (`environment.js`) owns the module registry;
//! dependency resolution and file reads are ops backed by `resload-core`.

use deno_core::error::AnyError;
use deno_core::{extension, op2, serde_v8, v8, JsRuntime, RuntimeOptions};
use resload_core::fetch::read_local_sync;
use resload_core::{classify, resolve_dependency, ContentKind, Dependency, LoadError, ResolvedReference};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::{Rc, Weak};
use tracing::{debug, error, info, trace, warn};

/// Environment script defining `require`, builtins and the module registry.
const ENVIRONMENT_JS: &str = include_str!("environment.js");

/// Error code raised by `require` when a name does not resolve.
const MODULE_NOT_FOUND: &str = "MODULE_NOT_FOUND";

extension!(
    resload_environment,
    ops = [
        op_resload_resolve,
        op_resload_read,
        op_resload_exists,
        op_resload_cwd,
        op_resload_env_get,
        op_resload_os_info,
        op_resload_log,
    ],
);

thread_local! {
    // Weak, so the isolate is dropped with its last handle rather than
    // during thread-local teardown.
    static CURRENT: RefCell<Weak<RefCell<ScriptEngine>>> = const { RefCell::new(Weak::new()) };
}

/// What `require` should do with a dependency name.
#[derive(Debug, Serialize)]
struct RequireTarget {
    kind: &'static str,
    name: Option<String>,
    path: Option<String>,
    dirname: Option<String>,
    /// One of `code`, `json` or `text`.
    format: &'static str,
    message: Option<String>,
}

impl RequireTarget {
    fn native(name: String) -> Self {
        Self {
            kind: "native",
            name: Some(name),
            path: None,
            dirname: None,
            format: "code",
            message: None,
        }
    }

    fn missing(message: String) -> Self {
        Self {
            kind: "missing",
            name: None,
            path: None,
            dirname: None,
            format: "text",
            message: Some(message),
        }
    }

    fn file(kind: &'static str, path: &Path, code_extensions: &[String]) -> Self {
        let reference = ResolvedReference::Local(path.to_path_buf());
        let format = if path.extension().is_some_and(|ext| ext == "json") {
            "json"
        } else {
            match classify(&reference, code_extensions) {
                ContentKind::Code => "code",
                ContentKind::Data => "text",
            }
        };
        Self {
            kind,
            name: None,
            path: Some(path.to_string_lossy().into_owned()),
            dirname: path.parent().map(|p| p.to_string_lossy().into_owned()),
            format,
            message: None,
        }
    }
}

/// Resolve a dependency name from a module directory.
#[op2]
#[serde]
fn op_resload_resolve(
    #[string] specifier: String,
    #[string] dirname: String,
    #[serde] code_extensions: Vec<String>,
) -> RequireTarget {
    let target = match resolve_dependency(&specifier, Path::new(&dirname)) {
        Ok(Dependency::Native { name }) => RequireTarget::native(name),
        Ok(Dependency::Relative { path }) => {
            RequireTarget::file("relative", &path, &code_extensions)
        }
        Ok(Dependency::Package { path }) => RequireTarget::file("package", &path, &code_extensions),
        Err(err) => RequireTarget::missing(err.to_string()),
    };
    trace!(specifier = %specifier, dirname = %dirname, kind = target.kind, "require");
    target
}

/// Read a file as text.
#[op2]
#[string]
fn op_resload_read(#[string] path: &str) -> Result<String, AnyError> {
    read_local_sync(Path::new(path)).map_err(|e| AnyError::msg(e.to_string()))
}

#[op2(fast)]
fn op_resload_exists(#[string] path: &str) -> bool {
    Path::new(path).exists()
}

/// Get current working directory.
#[op2]
#[string]
fn op_resload_cwd() -> Result<String, AnyError> {
    std::env::current_dir()
        .map(|p| p.to_string_lossy().to_string())
        .map_err(|e| e.into())
}

/// Get environment variable.
#[op2]
#[string]
fn op_resload_env_get(#[string] key: &str) -> Option<String> {
    std::env::var(key).ok()
}

#[derive(Serialize)]
struct OsInfo {
    platform: &'static str,
    eol: &'static str,
    homedir: String,
    tmpdir: String,
}

#[op2]
#[serde]
fn op_resload_os_info() -> OsInfo {
    let platform = match std::env::consts::OS {
        "windows" => "win32",
        "macos" => "darwin",
        other => other,
    };
    let homedir = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_default();
    OsInfo {
        platform,
        eol: if cfg!(windows) { "\r\n" } else { "\n" },
        homedir,
        tmpdir: std::env::temp_dir().to_string_lossy().into_owned(),
    }
}

/// Route module console output into tracing.
#[op2(fast)]
fn op_resload_log(level: i32, #[string] msg: &str) {
    match level {
        0 => debug!(target: "resload::console", "{msg}"),
        1 => info!(target: "resload::console", "{msg}"),
        2 => warn!(target: "resload::console", "{msg}"),
        _ => error!(target: "resload::console", "{msg}"),
    }
}

/// Failure record produced by the environment when a call throws.
#[derive(Debug, Deserialize)]
struct Failure {
    code: Option<String>,
    message: String,
    stack: Option<String>,
    specifier: Option<String>,
    from: Option<String>,
}

impl Failure {
    fn into_error(self, reference: &str) -> LoadError {
        if self.code.as_deref() == Some(MODULE_NOT_FOUND) {
            return LoadError::Resolution {
                specifier: self.specifier.unwrap_or_default(),
                from: self.from.map(PathBuf::from).unwrap_or_default(),
            };
        }
        LoadError::Execution {
            reference: reference.to_string(),
            message: self.stack.unwrap_or(self.message),
        }
    }
}

/// The isolate modules run in.
pub struct ScriptEngine {
    js_runtime: JsRuntime,
}

impl ScriptEngine {
    /// Create the isolate and install the module environment.
    ///
    /// Prefer [`ScriptEngine::for_current_thread`]; a second live engine
    /// on the same thread must be dropped before the first.
    pub fn new() -> Result<Self, LoadError> {
        let mut js_runtime = JsRuntime::new(RuntimeOptions {
            extensions: vec![resload_environment::init_ops()],
            ..Default::default()
        });

        js_runtime
            .execute_script("<resload:environment>", ENVIRONMENT_JS.to_string())
            .map_err(|e| LoadError::engine(format!("environment setup failed: {e}")))?;

        debug!("script engine ready");
        Ok(Self { js_runtime })
    }

    /// The engine shared by everything on this thread, created on first use.
    pub fn for_current_thread() -> Result<Rc<RefCell<Self>>, LoadError> {
        CURRENT.with(|current| {
            if let Some(engine) = current.borrow().upgrade() {
                return Ok(engine);
            }
            let engine = Rc::new(RefCell::new(Self::new()?));
            *current.borrow_mut() = Rc::downgrade(&engine);
            Ok(engine)
        })
    }

    /// Execute `source` as a module. Returns the module id and its exports.
    ///
    /// `code_extensions` decides which dependencies `require` executes; the
    /// module's own dependencies inherit it. The module stays registered
    /// until [`ScriptEngine::release`].
    pub fn execute(
        &mut self,
        source: &str,
        filename: &str,
        dirname: &Path,
        code_extensions: &[String],
    ) -> Result<(u32, v8::Global<v8::Value>), LoadError> {
        debug!(filename, dirname = %dirname.display(), "executing module");
        let script = format!(
            "globalThis.__resload.run({}, {}, {}, {})",
            js_string(source)?,
            js_string(filename)?,
            js_string(&dirname.to_string_lossy())?,
            serde_json::to_string(code_extensions).map_err(|e| LoadError::engine(e.to_string()))?,
        );
        self.call(script, filename)
    }

    /// Forget the module with `id`. Its exports stay valid.
    pub fn release(&mut self, id: u32) -> Result<(), LoadError> {
        self.js_runtime
            .execute_script("<resload>", format!("globalThis.__resload.release({id})"))
            .map_err(|e| LoadError::engine(e.to_string()))?;
        trace!(id, "module released");
        Ok(())
    }

    /// Number of modules still registered.
    pub fn module_count(&mut self) -> Result<usize, LoadError> {
        let result = self
            .js_runtime
            .execute_script("<resload>", "globalThis.__resload.size()".to_string())
            .map_err(|e| LoadError::engine(e.to_string()))?;
        let scope = &mut self.js_runtime.handle_scope();
        let count = v8::Local::new(scope, result)
            .uint32_value(scope)
            .ok_or_else(|| LoadError::engine("module count is not a number"))?;
        Ok(count as usize)
    }

    /// Call `require(specifier)` on behalf of the module with `id`.
    pub fn require(
        &mut self,
        id: u32,
        specifier: &str,
        filename: &str,
    ) -> Result<v8::Global<v8::Value>, LoadError> {
        let script = format!("globalThis.__resload.require({id}, {})", js_string(specifier)?);
        self.call(script, filename).map(|(_, value)| value)
    }

    fn call(
        &mut self,
        script: String,
        reference: &str,
    ) -> Result<(u32, v8::Global<v8::Value>), LoadError> {
        let result = self
            .js_runtime
            .execute_script("<resload>", script)
            .map_err(|e| LoadError::engine(e.to_string()))?;

        let scope = &mut self.js_runtime.handle_scope();
        let local = v8::Local::new(scope, result);
        let object = local
            .to_object(scope)
            .ok_or_else(|| LoadError::engine("environment returned a non-object"))?;

        let ok = property(scope, object, "ok")?.is_true();
        if !ok {
            let failure: Failure = serde_v8::from_v8(scope, local)
                .map_err(|e| LoadError::engine(format!("malformed failure record: {e}")))?;
            return Err(failure.into_error(reference));
        }

        let id = property(scope, object, "id")?
            .uint32_value(scope)
            .unwrap_or_default();
        let value = property(scope, object, "value")?;
        Ok((id, v8::Global::new(scope, value)))
    }

    /// `typeof value`.
    pub fn type_of(&mut self, value: &v8::Global<v8::Value>) -> String {
        let scope = &mut self.js_runtime.handle_scope();
        let local = v8::Local::new(scope, value);
        local.type_of(scope).to_rust_string_lossy(scope)
    }

    pub fn is_object(&mut self, value: &v8::Global<v8::Value>) -> bool {
        let scope = &mut self.js_runtime.handle_scope();
        v8::Local::new(scope, value).is_object()
    }

    pub fn is_function(&mut self, value: &v8::Global<v8::Value>) -> bool {
        let scope = &mut self.js_runtime.handle_scope();
        v8::Local::new(scope, value).is_function()
    }

    /// The value as a Rust string, if it is a JS string.
    pub fn as_string(&mut self, value: &v8::Global<v8::Value>) -> Option<String> {
        let scope = &mut self.js_runtime.handle_scope();
        let local = v8::Local::new(scope, value);
        local
            .is_string()
            .then(|| local.to_rust_string_lossy(scope))
    }

    /// Read a property. `None` for non-objects and `undefined` properties.
    pub fn get(&mut self, value: &v8::Global<v8::Value>, key: &str) -> Option<v8::Global<v8::Value>> {
        let scope = &mut self.js_runtime.handle_scope();
        let local = v8::Local::new(scope, value);
        if !local.is_object() {
            return None;
        }
        let object = local.to_object(scope)?;
        let key = v8::String::new(scope, key)?;
        let found = object.get(scope, key.into())?;
        if found.is_undefined() {
            return None;
        }
        Some(v8::Global::new(scope, found))
    }

    /// Convert to JSON through serde_v8.
    pub fn to_json(&mut self, value: &v8::Global<v8::Value>) -> Result<serde_json::Value, LoadError> {
        let scope = &mut self.js_runtime.handle_scope();
        let local = v8::Local::new(scope, value);
        serde_v8::from_v8(scope, local).map_err(|e| LoadError::engine(e.to_string()))
    }
}

fn property<'s>(
    scope: &mut v8::HandleScope<'s>,
    object: v8::Local<'s, v8::Object>,
    key: &str,
) -> Result<v8::Local<'s, v8::Value>, LoadError> {
    let name = v8::String::new(scope, key)
        .ok_or_else(|| LoadError::engine("failed to allocate property name"))?;
    object
        .get(scope, name.into())
        .ok_or_else(|| LoadError::engine(format!("missing `{key}` in environment result")))
}

/// Quote `text` as a JS string literal.
fn js_string(text: &str) -> Result<String, LoadError> {
    serde_json::to_string(text).map_err(|e| LoadError::engine(e.to_string()))
}
