use std::path::PathBuf;
use std::time::Duration;

/// Default suffixes that mark a resource as executable code.
pub const DEFAULT_CODE_EXTENSIONS: &[&str] = &[".js", ".cjs"];

/// Environment variable overriding the HTTP request timeout (seconds).
pub const HTTP_TIMEOUT_ENV: &str = "RESLOAD_HTTP_TIMEOUT_SECS";

/// Environment variable overriding the HTTP user agent.
pub const USER_AGENT_ENV: &str = "RESLOAD_USER_AGENT";

/// Loader-wide configuration.
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Suffixes classified as code (matched case-sensitively, with the dot).
    pub code_extensions: Vec<String>,

    /// TCP connect timeout for remote retrieval.
    pub connect_timeout: Duration,

    /// Whole-request timeout for remote retrieval.
    pub timeout: Duration,

    /// User agent sent with every request.
    pub user_agent: String,

    /// Serialize concurrent fetches of the same remote reference.
    pub serialize_revalidation: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            code_extensions: DEFAULT_CODE_EXTENSIONS
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            connect_timeout: Duration::from_secs(5),
            timeout: Duration::from_secs(30),
            user_agent: concat!("resload/", env!("CARGO_PKG_VERSION")).to_string(),
            serialize_revalidation: true,
        }
    }
}

impl LoaderConfig {
    /// Defaults with environment overrides applied.
    ///
    /// Unparseable values are ignored.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(secs) = std::env::var(HTTP_TIMEOUT_ENV)
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
        {
            config.timeout = Duration::from_secs(secs);
        }
        if let Ok(agent) = std::env::var(USER_AGENT_ENV) {
            if !agent.is_empty() {
                config.user_agent = agent;
            }
        }
        config
    }

    #[must_use]
    pub fn with_code_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.code_extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    #[must_use]
    pub fn with_serialize_revalidation(mut self, serialize: bool) -> Self {
        self.serialize_revalidation = serialize;
        self
    }
}

/// Per-call load options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadOptions {
    /// Base used to resolve relative references: a local directory or an
    /// absolute URL. Defaults to the process working directory.
    pub base_path: Option<String>,

    /// Overrides the directory context of loaded code modules.
    pub dirname: Option<PathBuf>,
}

impl LoadOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the base path or base URL.
    #[must_use]
    pub fn with_base_path(mut self, base: impl Into<String>) -> Self {
        self.base_path = Some(base.into());
        self
    }

    /// Set the module directory override.
    #[must_use]
    pub fn with_dirname(mut self, dirname: impl Into<PathBuf>) -> Self {
        self.dirname = Some(dirname.into());
        self
    }
}
