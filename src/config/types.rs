use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{PyletError, Result};

/// Name of the sandbox runtime executable, resolved via PATH.
pub const DEFAULT_SANDBOX_COMMAND: &str = "srt";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PyletConfig {
    pub server: ServerConfig,
    pub execution: ExecutionConfig,
}

/// MCP transport to serve on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// Newline-delimited JSON-RPC over stdin/stdout
    Stdio,
    /// Stateless JSON-RPC over a single HTTP POST route
    #[default]
    Http,
}

/// Bind parameters for the MCP server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub transport: Transport,
    pub host: String,
    pub port: u16,
    /// Route the HTTP transport serves the tool on
    pub path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            transport: Transport::default(),
            host: "localhost".to_string(),
            port: 6400,
            path: "/mcp".to_string(),
        }
    }
}

/// Everything the code-execution orchestrator needs for one invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Seconds before a running snippet is forcibly terminated
    pub code_timeout_seconds: u64,
    /// Interpreter the sandboxed command line is composed around
    pub path_to_python_interpreter: PathBuf,
    /// Sandbox-runtime policy file, passed through via --settings
    pub path_to_srt_settings: PathBuf,
    /// Informational list surfaced in the tool description, not enforced
    pub installed_python_dependencies: Vec<String>,
    /// Parent directory for per-invocation workspaces (OS temp dir if unset)
    pub working_directory: Option<PathBuf>,
    /// Sandbox runtime executable. Overridable so tests can substitute a stub.
    pub sandbox_command: String,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self {
            code_timeout_seconds: 30,
            path_to_python_interpreter: cwd.join(".venv").join("bin").join("python"),
            path_to_srt_settings: cwd.join("default_srt_settings.json"),
            installed_python_dependencies: Vec::new(),
            working_directory: None,
            sandbox_command: DEFAULT_SANDBOX_COMMAND.to_string(),
        }
    }
}

impl ExecutionConfig {
    /// Validate the parts that must hold before any code can run.
    ///
    /// The policy file has to exist up front: srt would otherwise fail on
    /// every invocation with an error the caller can do nothing about.
    pub fn validate(&self) -> Result<()> {
        if !self.path_to_srt_settings.exists() {
            return Err(PyletError::PolicyNotFound {
                path: self.path_to_srt_settings.display().to_string(),
            });
        }
        if self.code_timeout_seconds == 0 {
            return Err(PyletError::Config(
                "code_timeout_seconds must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Directory under which per-invocation workspaces are created.
    pub fn workspace_parent(&self) -> PathBuf {
        self.working_directory
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }
}
