//! SQL Agent Tools Library
//!
//! Four tools an LLM agent uses to answer questions from a relational
//! database (MySQL, PostgreSQL, SQLite): list tables, describe tables,
//! check a query, and run it. The tools are served over MCP by the binary
//! and can be embedded directly through [`SqlToolkit`].

pub mod config;
pub mod db;
pub mod error;
pub mod mcp;
pub mod models;
pub mod tools;
pub mod transport;

pub use config::Config;
pub use error::{DbError, DbResult};
pub use mcp::SqlAgentService;
pub use tools::{SqlTool, SqlToolkit, ToolCall, ToolkitOptions};
