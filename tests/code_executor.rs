//! End-to-end tests for the code-execution orchestrator.
//!
//! The sandbox runtime is substituted with a stub shell script so the full
//! pipeline (staging, invocation, capture, classification, teardown) runs
//! without srt or a Python interpreter installed.

#![cfg(unix)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use pylet::config::ExecutionConfig;
use pylet::executor::{ArtifactKind, CodeExecutor, ExecutionStatus};
use pylet::mcp::protocol::ToolContent;
use pylet::mcp::{RunPythonCodeTool, ToolHandler};
use pylet::PyletError;

struct TestEnv {
    // Removing the tempdir tears down stub, policy, and workdir together
    root: tempfile::TempDir,
    workdir: PathBuf,
    config: ExecutionConfig,
}

/// Stage a stub sandbox executable and a config pointing at it.
///
/// The stub distinguishes the preflight probe (no `--settings` flag) from a
/// real run, logs probes to `probes.log`, and otherwise runs `body` with
/// cwd = workspace, exactly as srt would.
fn env_with_stub(body: &str, timeout_secs: u64) -> TestEnv {
    use std::os::unix::fs::PermissionsExt;

    let root = tempfile::tempdir().unwrap();
    let probe_log = root.path().join("probes.log");

    let stub = root.path().join("srt-stub");
    let script = format!(
        "#!/bin/sh\n\
         if [ \"$1\" != \"--settings\" ]; then\n\
         \techo probe >> \"{}\"\n\
         \texit 0\n\
         fi\n\
         {}\n",
        probe_log.display(),
        body
    );
    std::fs::write(&stub, script).unwrap();
    std::fs::set_permissions(&stub, std::fs::Permissions::from_mode(0o755)).unwrap();

    let policy = root.path().join("srt_settings.json");
    std::fs::write(&policy, "{}").unwrap();

    let workdir = root.path().join("work");

    let config = ExecutionConfig {
        code_timeout_seconds: timeout_secs,
        // The stub never invokes the interpreter; any path will do
        path_to_python_interpreter: PathBuf::from("/usr/bin/python3"),
        path_to_srt_settings: policy,
        installed_python_dependencies: Vec::new(),
        working_directory: Some(workdir.clone()),
        sandbox_command: stub.display().to_string(),
    };

    TestEnv {
        root,
        workdir,
        config,
    }
}

impl TestEnv {
    fn executor(&self) -> CodeExecutor {
        CodeExecutor::new(self.config.clone())
    }

    fn probe_count(&self) -> usize {
        std::fs::read_to_string(self.root.path().join("probes.log"))
            .map(|s| s.lines().count())
            .unwrap_or(0)
    }
}

fn leftover_workspaces(workdir: &Path) -> usize {
    std::fs::read_dir(workdir).map(|it| it.count()).unwrap_or(0)
}

#[tokio::test]
async fn hello_world_roundtrip() {
    let env = env_with_stub("printf 'Hello, world!\\n'", 30);
    let executor = env.executor();

    let outcome = executor.execute("print(\"Hello, world!\")").await.unwrap();

    assert_eq!(outcome.result.status, ExecutionStatus::Success);
    assert_eq!(outcome.result.output, "Hello, world!");
    assert_eq!(outcome.result.error, None);
    assert!(outcome.artifacts.is_empty());
    assert_eq!(leftover_workspaces(&env.workdir), 0);
}

#[tokio::test]
async fn repeated_runs_are_idempotent() {
    let env = env_with_stub("printf '25\\n'", 30);
    let executor = env.executor();

    let first = executor.execute("a = 5\nprint(a*a)").await.unwrap();
    let second = executor.execute("a = 5\nprint(a*a)").await.unwrap();

    assert_eq!(first.result.status, second.result.status);
    assert_eq!(first.result.output, second.result.output);
    assert_eq!(first.result.error, second.result.error);
}

#[tokio::test]
async fn failure_preserves_partial_output() {
    let env = env_with_stub(
        "printf '1\\n'\n\
         printf \"NameError: name 'unknown_func' is not defined\\n\" >&2\n\
         exit 1",
        30,
    );
    let executor = env.executor();

    let outcome = executor.execute("print(1)\nunknown_func()").await.unwrap();

    assert_eq!(outcome.result.status, ExecutionStatus::Failure);
    assert_eq!(outcome.result.output, "1");
    let error = outcome.result.error.unwrap();
    assert!(error.contains("NameError: name 'unknown_func' is not defined"));
    assert!(outcome.artifacts.is_empty());
    assert_eq!(leftover_workspaces(&env.workdir), 0);
}

#[tokio::test]
async fn stderr_is_surfaced_even_on_success() {
    let env = env_with_stub("printf 'warning\\n' >&2\nprintf 'ok\\n'", 30);
    let executor = env.executor();

    let outcome = executor.execute("print('ok')").await.unwrap();

    assert_eq!(outcome.result.status, ExecutionStatus::Success);
    assert_eq!(outcome.result.output, "ok");
    assert_eq!(outcome.result.error.as_deref(), Some("warning"));
}

#[tokio::test]
async fn output_files_become_classified_artifacts() {
    // The stub writes into the workspace's output directory: a text file,
    // a PNG signature, and an MP3 ID3 header
    let env = env_with_stub(
        "printf 'hi' > output/file.txt\n\
         printf '\\211PNG\\r\\n\\032\\n' > output/plot.png\n\
         printf 'ID3' > output/clip.mp3",
        30,
    );
    let executor = env.executor();

    let outcome = executor.execute("...").await.unwrap();

    assert_eq!(outcome.result.status, ExecutionStatus::Success);
    assert_eq!(outcome.artifacts.len(), 3);

    // Enumeration order is stable (by name)
    assert_eq!(outcome.artifacts[0].file_name, "clip.mp3");
    assert_eq!(outcome.artifacts[0].kind, ArtifactKind::Audio);
    assert_eq!(outcome.artifacts[0].mime_type, "audio/mpeg");

    assert_eq!(outcome.artifacts[1].file_name, "file.txt");
    assert_eq!(outcome.artifacts[1].kind, ArtifactKind::File);
    assert_eq!(outcome.artifacts[1].mime_type, "text/plain");
    assert_eq!(outcome.artifacts[1].bytes, b"hi");

    assert_eq!(outcome.artifacts[2].file_name, "plot.png");
    assert_eq!(outcome.artifacts[2].kind, ArtifactKind::Image);
    assert_eq!(outcome.artifacts[2].mime_type, "image/png");

    // Artifact bytes outlive the workspace itself
    assert_eq!(leftover_workspaces(&env.workdir), 0);
}

#[tokio::test]
async fn writes_outside_output_are_not_surfaced() {
    let env = env_with_stub("printf 'stray' > stray.txt\nprintf 'done\\n'", 30);
    let executor = env.executor();

    let outcome = executor.execute("...").await.unwrap();

    assert_eq!(outcome.result.status, ExecutionStatus::Success);
    assert!(outcome.artifacts.is_empty());
    assert_eq!(leftover_workspaces(&env.workdir), 0);
}

#[tokio::test]
async fn timeout_terminates_the_run() {
    let env = env_with_stub("exec sleep 30", 1);
    let executor = env.executor();

    let started = Instant::now();
    let outcome = executor.execute("import time; time.sleep(30)").await.unwrap();

    // Well under the sleep duration: the child was killed, not waited out
    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(outcome.result.status, ExecutionStatus::Failure);
    assert!(outcome.result.error.unwrap().contains("timed out"));
    assert_eq!(leftover_workspaces(&env.workdir), 0);
}

#[tokio::test]
async fn preflight_failure_is_fatal_and_permanent() {
    use std::os::unix::fs::PermissionsExt;

    let root = tempfile::tempdir().unwrap();
    let stub = root.path().join("srt-stub");
    std::fs::write(&stub, "#!/bin/sh\necho boom >&2\nexit 7\n").unwrap();
    std::fs::set_permissions(&stub, std::fs::Permissions::from_mode(0o755)).unwrap();

    let policy = root.path().join("srt_settings.json");
    std::fs::write(&policy, "{}").unwrap();
    let workdir = root.path().join("work");

    let executor = CodeExecutor::new(ExecutionConfig {
        path_to_srt_settings: policy,
        working_directory: Some(workdir.clone()),
        sandbox_command: stub.display().to_string(),
        ..Default::default()
    });

    let err = executor.execute("print(1)").await.unwrap_err();
    assert!(matches!(err, PyletError::PreflightFailed { .. }));
    assert!(err.is_fatal());

    // The failure sticks: later invocations are refused without re-probing
    let err = executor.execute("print(1)").await.unwrap_err();
    assert!(matches!(err, PyletError::PreflightFailed { .. }));

    // Preflight failed before anything was staged
    assert_eq!(leftover_workspaces(&workdir), 0);
}

#[tokio::test]
async fn preflight_probe_runs_only_once() {
    let env = env_with_stub("printf 'ok\\n'", 30);
    let executor = env.executor();

    executor.execute("print(1)").await.unwrap();
    executor.execute("print(2)").await.unwrap();
    executor.execute("print(3)").await.unwrap();

    assert_eq!(env.probe_count(), 1);
}

#[tokio::test]
async fn concurrent_runs_use_isolated_workspaces() {
    let env = env_with_stub("pwd > output/where.txt\nprintf 'done\\n'", 30);
    let executor = Arc::new(env.executor());

    let (a, b) = tokio::join!(executor.execute("run_a"), executor.execute("run_b"));
    let a = a.unwrap();
    let b = b.unwrap();

    assert_eq!(a.result.status, ExecutionStatus::Success);
    assert_eq!(b.result.status, ExecutionStatus::Success);
    assert_eq!(a.artifacts.len(), 1);
    assert_eq!(b.artifacts.len(), 1);

    // Each run saw its own workspace, never the other's
    assert_ne!(a.artifacts[0].bytes, b.artifacts[0].bytes);
    assert_eq!(leftover_workspaces(&env.workdir), 0);
}

#[tokio::test]
async fn tool_call_returns_result_first_then_artifacts() {
    let env = env_with_stub("printf 'hi' > output/file.txt\nprintf 'done\\n'", 30);
    let tool = RunPythonCodeTool::new(Arc::new(env.executor()));

    let content = tool
        .execute(serde_json::json!({"python_code": "..."}))
        .await
        .unwrap();

    assert_eq!(content.len(), 2);
    match &content[0] {
        ToolContent::Text { text } => {
            let result: serde_json::Value = serde_json::from_str(text).unwrap();
            assert_eq!(result["status"], "success");
            assert_eq!(result["output"], "done");
        }
        other => panic!("expected the execution result first, got {:?}", other),
    }
    match &content[1] {
        ToolContent::Resource { resource } => {
            assert_eq!(resource.mime_type, "text/plain");
        }
        other => panic!("expected a resource block, got {:?}", other),
    }
}
