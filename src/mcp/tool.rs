//! The `run_python_code` tool and the handler seam the server dispatches
//! through.

use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::{PyletError, Result};
use crate::executor::{Artifact, ArtifactKind, CodeExecutor};
use crate::mcp::protocol::{EmbeddedResource, ToolContent};

/// Individual tool handler
#[async_trait]
pub trait ToolHandler: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> String;
    fn input_schema(&self) -> Value;
    async fn execute(&self, input: Value) -> Result<Vec<ToolContent>>;
}

/// Tool that executes Python code through the sandbox orchestrator.
pub struct RunPythonCodeTool {
    executor: Arc<CodeExecutor>,
}

impl RunPythonCodeTool {
    pub fn new(executor: Arc<CodeExecutor>) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl ToolHandler for RunPythonCodeTool {
    fn name(&self) -> &str {
        "run_python_code"
    }

    fn description(&self) -> String {
        let config = self.executor.config();
        let dependencies = if config.installed_python_dependencies.is_empty() {
            "none".to_string()
        } else {
            config.installed_python_dependencies.join(", ")
        };

        format!(
            "Tool to execute Python code in a sandbox and return stdout, stderr, \
             and any produced files.\n\
             \n\
             ### Guidelines\n\
             - To output values, you have to use the print statement.\n\
             - You do **not** have any access to the internet.\n\
             - Your code must finish within {} seconds before the run is canceled.\n\
             - You have these additional python packages installed: {}\n\
             - To output files or images, save them into the \"./output\" folder.",
            config.code_timeout_seconds, dependencies
        )
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "python_code": {
                    "type": "string",
                    "description": "The python code to execute"
                }
            },
            "required": ["python_code"]
        })
    }

    /// Run the submitted code and build the result-first content sequence:
    /// the execution result is always the first block, artifacts follow in
    /// the order files were enumerated.
    async fn execute(&self, input: Value) -> Result<Vec<ToolContent>> {
        let code = input
            .get("python_code")
            .and_then(|v| v.as_str())
            .ok_or_else(|| PyletError::Config("Missing 'python_code' parameter".to_string()))?;

        let outcome = self.executor.execute(code).await?;
        debug!(
            status = ?outcome.result.status,
            artifacts = outcome.artifacts.len(),
            "Tool call completed"
        );

        let mut content = vec![ToolContent::Text {
            text: serde_json::to_string(&outcome.result)?,
        }];
        content.extend(outcome.artifacts.into_iter().map(artifact_to_content));

        Ok(content)
    }
}

fn artifact_to_content(artifact: Artifact) -> ToolContent {
    let data = BASE64.encode(&artifact.bytes);
    match artifact.kind {
        ArtifactKind::Image => ToolContent::Image {
            data,
            mime_type: artifact.mime_type,
        },
        ArtifactKind::Audio => ToolContent::Audio {
            data,
            mime_type: artifact.mime_type,
        },
        ArtifactKind::File => ToolContent::Resource {
            resource: EmbeddedResource {
                uri: format!("file:///{}", artifact.file_name),
                mime_type: artifact.mime_type,
                blob: data,
            },
        },
    }
}
