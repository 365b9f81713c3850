use std::sync::Arc;

use tokio::process::Command;
use tracing::info;

use crate::cli::args::{CheckArgs, ConfigAction, ConfigArgs, ExecutionOpts, ServeArgs};
use crate::config::loader::get_config_path;
use crate::config::{ExecutionConfig, PyletConfig, Transport};
use crate::error::{PyletError, Result};
use crate::executor::CodeExecutor;
use crate::mcp::{McpServer, RunPythonCodeTool, ToolHandler};

/// Start the MCP server.
///
/// Startup validates the configuration, verifies the interpreter, and runs
/// the sandbox-runtime preflight probe; any of these failing is fatal and
/// the server never starts accepting invocations.
pub async fn serve(args: ServeArgs, mut config: PyletConfig) -> Result<()> {
    apply_execution_opts(&mut config.execution, args.execution);
    if let Some(transport) = args.transport {
        config.server.transport = transport;
    }
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(path) = args.path {
        config.server.path = path;
    }

    config.execution.validate()?;
    verify_interpreter(&config.execution).await?;

    let executor = Arc::new(CodeExecutor::new(config.execution.clone()));
    executor.preflight().await?;

    let tool: Arc<dyn ToolHandler> = Arc::new(RunPythonCodeTool::new(executor));
    let server = Arc::new(McpServer::new(vec![tool]));

    info!(transport = ?config.server.transport, "Starting MCP server");
    match config.server.transport {
        Transport::Stdio => server.serve_stdio().await,
        Transport::Http => {
            server
                .serve_http(&config.server.host, config.server.port, &config.server.path)
                .await
        }
    }
}

/// Probe the interpreter and sandbox runtime, report, and exit.
pub async fn check(args: CheckArgs, mut config: PyletConfig) -> Result<()> {
    apply_execution_opts(&mut config.execution, args.execution);

    match config.execution.validate() {
        Ok(()) => println!(
            "  Policy:       {:<40} ok",
            config.execution.path_to_srt_settings.display()
        ),
        Err(e) => {
            println!("  Policy:       {}", e);
            return Err(e);
        }
    }

    match verify_interpreter(&config.execution).await {
        Ok(version) => println!("  Interpreter:  {:<40} ok", version),
        Err(e) => {
            println!("  Interpreter:  {}", e);
            return Err(e);
        }
    }

    let executor = CodeExecutor::new(config.execution.clone());
    match executor.preflight().await {
        Ok(()) => println!(
            "  Sandbox:      {:<40} ok",
            config.execution.sandbox_command
        ),
        Err(e) => {
            println!("  Sandbox:      {}", e);
            return Err(e);
        }
    }

    Ok(())
}

/// Show configuration or its file path.
pub fn config(args: ConfigArgs, config: PyletConfig) -> Result<()> {
    match args.action {
        ConfigAction::Show => {
            let rendered =
                toml::to_string_pretty(&config).map_err(|e| PyletError::Config(e.to_string()))?;
            println!("{}", rendered);
        }
        ConfigAction::Path => {
            println!("{}", get_config_path().display());
        }
    }
    Ok(())
}

fn apply_execution_opts(config: &mut ExecutionConfig, opts: ExecutionOpts) {
    if let Some(path) = opts.srt_settings {
        config.path_to_srt_settings = path;
    }
    if let Some(path) = opts.python {
        config.path_to_python_interpreter = path;
    }
    if let Some(path) = opts.workdir {
        config.working_directory = Some(path);
    }
    if let Some(timeout) = opts.timeout {
        config.code_timeout_seconds = timeout;
    }
    if !opts.dependencies.is_empty() {
        config.installed_python_dependencies = opts.dependencies;
    }
}

/// Check the configured interpreter actually runs, returning its version line.
async fn verify_interpreter(config: &ExecutionConfig) -> Result<String> {
    let path = &config.path_to_python_interpreter;
    let output = Command::new(path)
        .arg("--version")
        .output()
        .await
        .map_err(|e| PyletError::InterpreterUnusable {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(PyletError::InterpreterUnusable {
            path: path.display().to_string(),
            reason: format!(
                "--version exited with code {}",
                output.status.code().unwrap_or(-1)
            ),
        });
    }

    // Python 2 printed the version on stderr; tolerate both
    let version = if output.stdout.is_empty() {
        String::from_utf8_lossy(&output.stderr).trim().to_string()
    } else {
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    };
    info!(interpreter = %path.display(), version = %version, "Found python interpreter");

    Ok(version)
}
