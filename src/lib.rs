//! # memoria - persistent memory for AI assistants
//!
//! Conversations, curated memories, schedule items, development project
//! history and tool-call telemetry, stored in five local SQLite databases and
//! searchable by embedding similarity with a text-matching fallback.
//!
//! ## Overview
//!
//! memoria can be used in two ways:
//!
//! 1. **As an MCP server** - Run the `memoria` binary; tools are served on stdio
//! 2. **As a library** - Embed [`MemorySystem`] in your own Rust project
//!
//! ### Basic Example
//!
//! ```rust,ignore
//! use memoria::{ConfigManager, MemorySystem, NewMemory, SearchRequest};
//!
//! #[tokio::main]
//! async fn main() -> memoria::Result<()> {
//!     let config = ConfigManager::new("memoria.toml")?;
//!     let system = MemorySystem::open(config).await?;
//!
//!     system
//!         .create_memory(NewMemory::new("Prefers oat milk").of_type("preference").importance(7))
//!         .await?;
//!
//!     let response = system.search_memories(&SearchRequest::new("coffee order")).await?;
//!     for result in response.results {
//!         println!("{:.2} {}", result.similarity_score, result.hit.text());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `mcp` | MCP stdio server (default) |
//!
//! ## Modules
//!
//! - [`db`] - The five SQLite stores
//! - [`embeddings`] - OpenAI-compatible embedding client
//! - [`search`] - Semantic and text search across stores
//! - [`memory`] - The [`MemorySystem`] facade and prompt context helpers
//! - [`monitor`] - Chat transcript import and directory watching
//! - [`maintenance`] - Retention cleanup, schema upgrades, compaction
//! - [`reflection`] - Tool usage analysis
//! - [`mcp`] - Tool dispatch and the MCP server
//! - [`types`] - Records, inputs and errors

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(rustdoc::missing_crate_level_docs)]

/// Command-line interface.
pub mod cli;
/// SQLite stores (conversations, memories, schedule, projects, tool calls).
pub mod db;
/// Embedding providers.
pub mod embeddings;
/// Periodic and on-demand database maintenance.
pub mod maintenance;
/// Tool dispatch and the Model Context Protocol server.
pub mod mcp;
/// The memory system facade.
pub mod memory;
/// Conversation file import and monitoring.
pub mod monitor;
/// Self-reflection over tool usage.
pub mod reflection;
/// Search across every store.
pub mod search;
/// Core types (records, inputs, errors).
pub mod types;
/// Configuration, logging and time utilities.
pub mod utils;

// Re-export commonly used types
pub use embeddings::{EmbeddingProvider, OpenAiCompatibleEmbeddings};
pub use maintenance::{AutoMaintenance, DatabaseMaintenance, MaintenanceReport};
pub use mcp::ToolDispatcher;
pub use memory::MemorySystem;
pub use monitor::ConversationFileMonitor;
pub use search::{SearchRequest, SearchResponse, SearchScope};
pub use types::{AppError, MessageRole, NewMemory, NewMessage, Result};
pub use utils::toml_config::{ConfigManager, MemoriaConfig};
