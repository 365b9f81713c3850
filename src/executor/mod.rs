mod artifacts;
mod runner;
mod workspace;

pub use artifacts::{classify_bytes, Artifact, ArtifactKind};
pub use runner::CodeExecutor;
pub use workspace::Workspace;

use serde::{Deserialize, Serialize};

/// Status tag of one sandboxed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Success,
    Failure,
}

/// Captured output of one sandboxed run.
///
/// `status` is `Success` iff the child exit code was zero. `error` carries
/// the captured stderr; a failing run that produced no stderr (a timeout,
/// a signal kill) gets a synthesized message instead so failures are never
/// silent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub status: ExecutionStatus,
    pub output: String,
    pub error: Option<String>,
}

/// Everything one invocation produced: the result plus any files the code
/// wrote under the workspace output directory, in enumeration order.
#[derive(Debug)]
pub struct ExecutionOutcome {
    pub result: ExecutionResult,
    pub artifacts: Vec<Artifact>,
}
