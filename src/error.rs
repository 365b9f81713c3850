use thiserror::Error;

#[derive(Error, Debug)]
pub enum PyletError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Sandbox policy file not found: {path}")]
    PolicyNotFound { path: String },

    #[error("Python interpreter not usable: {path} ({reason})")]
    InterpreterUnusable { path: String, reason: String },

    // Sandbox runtime errors
    #[error(
        "Sandbox runtime pre-check failed (exit code {code:?}). \
         Install it with: npm install -g @anthropic-ai/sandbox-runtime"
    )]
    PreflightFailed { code: Option<i32>, stderr: String },

    #[error("Failed to invoke sandbox runtime '{command}': {source}")]
    SandboxSpawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to stage execution workspace: {0}")]
    WorkspaceSetup(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(String),

    // Generic wrapper
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PyletError {
    /// True for errors that mean the process cannot usefully serve
    /// any further invocations.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::PreflightFailed { .. } | Self::PolicyNotFound { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, PyletError>;
