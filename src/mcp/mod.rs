//! Tool surface of the memory system.
//!
//! [`ToolDispatcher`] maps tool names and JSON arguments onto
//! [`MemorySystem`](crate::memory::MemorySystem) operations and logs every
//! call. With the `mcp` feature, [`server`] exposes the same tools over the
//! Model Context Protocol on stdio.

pub mod dispatch;
pub mod params;

#[cfg(feature = "mcp")]
pub mod server;

pub use dispatch::{error_payload, ToolDispatcher, TOOL_NAMES};

#[cfg(feature = "mcp")]
pub use server::{start_stdio_server, MemoriaMcpServer};
