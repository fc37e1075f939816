//! MCP server for task and plugin semantic search
//!
//! Exposes the index and search operations as MCP tools over stdio.

mod server;

pub use server::run_mcp_server;
