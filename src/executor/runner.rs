use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::OnceCell;
use tracing::{debug, error, info, warn};

use crate::config::ExecutionConfig;
use crate::error::{PyletError, Result};

use super::artifacts::collect_artifacts;
use super::workspace::Workspace;
use super::{ExecutionOutcome, ExecutionResult, ExecutionStatus};

/// Remembered outcome of the one-time sandbox runtime probe.
#[derive(Debug, Clone)]
enum Preflight {
    Passed,
    Failed { code: Option<i32>, stderr: String },
}

/// Orchestrates one unit of untrusted Python code through the external
/// sandbox runtime: stage a workspace, invoke under a timeout, capture
/// output, classify produced files, tear everything down.
///
/// One executor is shared by all tool invocations of a server process, so
/// the preflight cell below is process-wide in effect.
pub struct CodeExecutor {
    config: ExecutionConfig,
    preflight: OnceCell<Preflight>,
}

impl CodeExecutor {
    pub fn new(config: ExecutionConfig) -> Self {
        Self {
            config,
            preflight: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    /// Verify the sandbox runtime is present and minimally functional.
    ///
    /// Runs at most once per executor lifetime. The probe is side-effect-free,
    /// so a racing duplicate run converges to a single stored value. A
    /// recorded failure is permanent: every later invocation fails fast with
    /// the same error, since nothing can execute without a working runtime.
    pub async fn preflight(&self) -> Result<()> {
        let state = self
            .preflight
            .get_or_init(|| async { self.run_probe().await })
            .await;

        match state {
            Preflight::Passed => Ok(()),
            Preflight::Failed { code, stderr } => Err(PyletError::PreflightFailed {
                code: *code,
                stderr: stderr.clone(),
            }),
        }
    }

    async fn run_probe(&self) -> Preflight {
        info!("First run: verifying the sandbox runtime is available and working...");

        let probe = format!(
            "\"{}\" -c '1+1'",
            self.config.path_to_python_interpreter.display()
        );
        let output = Command::new(&self.config.sandbox_command)
            .arg(&probe)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await;

        match output {
            Ok(out) if out.status.success() => {
                info!("Sandbox runtime pre-check succeeded");
                Preflight::Passed
            }
            Ok(out) => {
                let stderr = String::from_utf8_lossy(&out.stderr).into_owned();
                error!(
                    code = ?out.status.code(),
                    stderr = %stderr,
                    "Sandbox runtime pre-check failed"
                );
                Preflight::Failed {
                    code: out.status.code(),
                    stderr,
                }
            }
            Err(e) => {
                error!(
                    command = %self.config.sandbox_command,
                    error = %e,
                    "Sandbox runtime could not be invoked"
                );
                Preflight::Failed {
                    code: None,
                    stderr: e.to_string(),
                }
            }
        }
    }

    /// Run one unit of untrusted code to completion or timeout.
    ///
    /// Failures originating inside the executed code (syntax errors, raised
    /// exceptions, denied writes, denied network access, timeout) come back
    /// as `status = failure` in the result, never as `Err`. Only
    /// infrastructure failures (a broken sandbox runtime, an unstageable
    /// workspace) surface as errors.
    pub async fn execute(&self, code: &str) -> Result<ExecutionOutcome> {
        self.preflight().await?;

        let workspace = Workspace::stage(&self.config.workspace_parent(), code)?;
        debug!(
            code_len = code.len(),
            workspace = %workspace.root().display(),
            "Running python code"
        );

        let run = self.run_sandboxed(&workspace).await;

        // Artifact bytes must be read out now; the backing paths do not
        // survive the invocation.
        let outcome = match run {
            Ok(result) => collect_artifacts(&workspace.output_dir())
                .map(|artifacts| ExecutionOutcome { result, artifacts }),
            Err(e) => Err(e),
        };

        // Teardown runs no matter how invocation or classification fared.
        // (If `outcome` is an error we still get here; a panic above is
        // covered by the workspace's Drop.)
        if let Err(e) = workspace.close() {
            warn!(error = %e, "Failed to remove execution workspace");
        }

        outcome
    }

    async fn run_sandboxed(&self, workspace: &Workspace) -> Result<ExecutionResult> {
        let command_line = format!(
            "\"{}\" \"{}\"",
            self.config.path_to_python_interpreter.display(),
            workspace.code_file().display()
        );

        let mut child = Command::new(&self.config.sandbox_command)
            .arg("--settings")
            .arg(&self.config.path_to_srt_settings)
            .arg(&command_line)
            .current_dir(workspace.root())
            // The sandboxed code must not see ambient secrets; only the
            // search path survives so the interpreter can be found.
            .env_clear()
            .env("PATH", std::env::var("PATH").unwrap_or_default())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| PyletError::SandboxSpawn {
                command: self.config.sandbox_command.clone(),
                source: e,
            })?;

        // Drain both pipes concurrently while waiting, so whatever the child
        // wrote before a timeout kill is preserved.
        let stdout_task = tokio::spawn(read_to_end(child.stdout.take()));
        let stderr_task = tokio::spawn(read_to_end(child.stderr.take()));

        let timeout = Duration::from_secs(self.config.code_timeout_seconds);
        let (status, timed_out) = match tokio::time::timeout(timeout, child.wait()).await {
            Ok(status) => (status?, false),
            Err(_) => {
                warn!(
                    seconds = self.config.code_timeout_seconds,
                    "Execution timed out, killing sandboxed process"
                );
                // The child may have exited between the deadline and the
                // kill; either way wait() reaps it.
                let _ = child.start_kill();
                (child.wait().await?, true)
            }
        };

        let stdout = stdout_task.await.unwrap_or_default();
        let stderr = stderr_task.await.unwrap_or_default();
        let stdout = String::from_utf8_lossy(&stdout).trim().to_string();
        let stderr = String::from_utf8_lossy(&stderr).trim().to_string();

        debug!(
            exit_code = ?status.code(),
            timed_out,
            stdout_len = stdout.len(),
            stderr_len = stderr.len(),
            "Sandboxed run completed"
        );

        let status_tag = if status.success() && !timed_out {
            ExecutionStatus::Success
        } else {
            ExecutionStatus::Failure
        };

        let error = if !stderr.is_empty() {
            Some(stderr)
        } else if timed_out {
            Some(format!(
                "Execution timed out after {} seconds",
                self.config.code_timeout_seconds
            ))
        } else if status_tag == ExecutionStatus::Failure {
            Some(format!(
                "Process exited with code {}",
                status.code().unwrap_or(-1)
            ))
        } else {
            None
        };

        Ok(ExecutionResult {
            status: status_tag,
            output: stdout,
            error,
        })
    }
}

async fn read_to_end<R: AsyncRead + Unpin>(pipe: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        // A read error mid-stream (e.g. the child was killed) just means we
        // keep the partial buffer.
        let _ = pipe.read_to_end(&mut buf).await;
    }
    buf
}
