//! MCP (Model Context Protocol) surface for the code-execution tool
//!
//! A hand-rolled JSON-RPC 2.0 server with stdio and HTTP transports, plus
//! the `run_python_code` tool it exposes.

pub mod protocol;
pub mod server;
pub mod tool;

pub use server::McpServer;
pub use tool::{RunPythonCodeTool, ToolHandler};
