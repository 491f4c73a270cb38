//! MCP server integration.
//!
//! Serves the SQL toolkit over the Model Context Protocol using rmcp.

pub mod service;

pub use service::SqlAgentService;
