//! CLI module for memoria
//!
//! Provides command-line interface parsing and handling for the memoria binary.
//! Uses clap for argument parsing and owo-colors for colored terminal output.

pub mod commands;
pub mod init;
pub mod output;

use crate::utils::toml_config::DEFAULT_CONFIG_FILE;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// memoria - persistent memory for AI assistants
///
/// Stores conversations, curated memories, schedule items and development
/// project history in local SQLite databases and serves them over MCP.
#[derive(Parser, Debug)]
#[command(
    name = "memoria",
    version,
    about = "memoria - persistent memory for AI assistants",
    long_about = "Stores conversations, curated memories, schedule items and development project\n\
                  history in local SQLite databases, with semantic search over an\n\
                  OpenAI-compatible embedding endpoint.\n\n\
                  Run without arguments to start the MCP server on stdio.",
    after_help = "EXAMPLES:\n    \
                  memoria init --watch ~/chats     # Scaffold memoria.toml\n    \
                  memoria                          # Serve MCP on stdio\n    \
                  memoria search \"coffee order\"    # Search every database\n    \
                  memoria maintenance --force      # Clean up and compact now"
)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE, global = true, env = "MEMORIA_CONFIG")]
    pub config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve the memory tools over MCP on stdio (default)
    Serve {
        /// Do not start the conversation file monitor
        #[arg(long)]
        no_monitor: bool,

        /// Do not schedule automatic maintenance
        #[arg(long)]
        no_maintenance: bool,
    },

    /// Create memoria.toml and the data directory
    Init {
        /// Directory to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Overwrite existing files
        #[arg(short, long)]
        force: bool,

        /// Data directory, relative to the config file's directory
        #[arg(long, default_value = "memory_data")]
        data_dir: String,

        /// OpenAI-compatible embedding server
        #[arg(long, default_value = "http://localhost:1234")]
        embeddings_url: String,

        /// Embedding model name
        #[arg(long, default_value = "text-embedding-nomic-embed-text-v1.5")]
        model: String,

        /// Disable embeddings; search falls back to text matching
        #[arg(long)]
        no_embeddings: bool,

        /// Directory to watch for chat transcripts (repeatable)
        #[arg(long = "watch", value_name = "DIR")]
        watch: Vec<PathBuf>,
    },

    /// Report database, monitor and embedding health
    Health {
        /// Print the raw JSON report
        #[arg(long)]
        json: bool,
    },

    /// Store a curated memory
    Remember {
        /// What to remember
        content: String,

        /// Memory type, e.g. preference, fact, safety
        #[arg(short = 't', long = "type")]
        memory_type: Option<String>,

        /// Importance from 1 to 10
        #[arg(short, long, default_value_t = 5)]
        importance: i64,

        /// Tag (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,
    },

    /// Search stored memory
    Search {
        /// Free-text query
        query: String,

        /// Maximum number of results
        #[arg(short, long)]
        limit: Option<usize>,

        /// all, ai_memories, conversations, schedule or projects
        #[arg(short, long, default_value = "all")]
        scope: String,

        /// Only memories of this type
        #[arg(short = 't', long = "type")]
        memory_type: Option<String>,

        #[arg(long)]
        min_importance: Option<i64>,

        #[arg(long)]
        max_importance: Option<i64>,

        /// Print the raw JSON response
        #[arg(long)]
        json: bool,
    },

    /// Import chat transcript files or directories once
    Import {
        /// Files or directories
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Clean up old data and compact the databases
    Maintenance {
        /// Run even if maintenance ran recently
        #[arg(short, long)]
        force: bool,

        /// Print the raw JSON report
        #[arg(long)]
        json: bool,
    },

    /// Analyze recent tool usage and store a reflection
    Reflect {
        /// Look-back window in days
        #[arg(short, long, default_value_t = 7)]
        days: i64,

        /// Only calls from this client
        #[arg(long)]
        client: Option<String>,
    },

    /// Invoke a memory tool by name with JSON arguments
    Call {
        /// Tool name; see `memoria tools`
        tool: String,

        /// JSON object of arguments
        #[arg(default_value = "{}")]
        args: String,
    },

    /// List the available memory tools
    Tools,

    /// Show configuration information
    Config {
        /// Show the full configuration
        #[arg(short = 'f', long)]
        full: bool,

        /// Validate the configuration file
        #[arg(long)]
        validate: bool,
    },
}

impl Default for Commands {
    fn default() -> Self {
        Commands::Serve {
            no_monitor: false,
            no_maintenance: false,
        }
    }
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
