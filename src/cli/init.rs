//! Init command implementation
//!
//! Scaffolds `memoria.toml`, the data directory and an `.env.example`.

use super::output::Output;
use crate::utils::toml_config::{MemoriaConfig, DEFAULT_CONFIG_FILE};
use std::fs;
use std::path::{Path, PathBuf};

/// Result of the init operation
#[derive(Debug)]
pub enum InitResult {
    Success,
    /// memoria.toml exists and `--force` was not given
    AlreadyExists,
    /// Nothing further was written; the message says what failed
    Error(String),
}

/// Configuration for the init command
pub struct InitConfig {
    /// Directory to initialize
    pub path: PathBuf,
    /// Overwrite existing files
    pub force: bool,
    /// Data directory written to `[storage]`
    pub data_dir: String,
    /// OpenAI-compatible embedding server
    pub embeddings_url: String,
    pub model: String,
    /// Write `[embeddings] enabled = false`
    pub no_embeddings: bool,
    /// Directories for the conversation file monitor; enables monitoring
    pub watch: Vec<PathBuf>,
}

/// Run the init command
pub fn run(config: InitConfig, output: &Output) -> InitResult {
    output.banner();
    output.header("Initializing memoria");

    let base_path = &config.path;
    let config_path = base_path.join(DEFAULT_CONFIG_FILE);
    if config_path.exists() && !config.force {
        output.warning(&format!("{} already exists!", DEFAULT_CONFIG_FILE));
        output.hint("Use --force to overwrite existing files");
        return InitResult::AlreadyExists;
    }

    output.subheader("Creating directories");
    let data_path = base_path.join(&config.data_dir);
    if data_path.exists() {
        output.skipped(&config.data_dir, "already exists");
    } else if let Err(e) = fs::create_dir_all(&data_path) {
        return InitResult::Error(format!("Failed to create {}: {}", config.data_dir, e));
    } else {
        output.created("directory", &config.data_dir);
    }

    output.subheader("Creating configuration files");
    let toml_content = generate_memoria_toml(&config);

    // Never write a file the server would refuse to load
    if let Err(e) = toml::from_str::<MemoriaConfig>(&toml_content) {
        return InitResult::Error(format!("Generated configuration is invalid: {}", e));
    }

    if let Err(e) = write_file(&config_path, &toml_content, config.force) {
        return InitResult::Error(format!("Failed to create {}: {}", DEFAULT_CONFIG_FILE, e));
    }
    output.created("config", DEFAULT_CONFIG_FILE);

    let env_example_path = base_path.join(".env.example");
    if let Err(e) = write_file(&env_example_path, &generate_env_example(), config.force) {
        return InitResult::Error(format!("Failed to create .env.example: {}", e));
    }
    output.created("env", ".env.example");

    let gitignore_path = base_path.join(".gitignore");
    if !gitignore_path.exists() {
        if let Err(e) = write_file(&gitignore_path, &generate_gitignore(&config.data_dir), false) {
            output.warning(&format!("Failed to create .gitignore: {}", e));
        } else {
            output.created("file", ".gitignore");
        }
    }

    output.complete("memoria initialized successfully!");

    output.header("Next Steps");
    output.newline();
    if config.no_embeddings {
        output.info("1. Embeddings are disabled; search uses text matching");
    } else {
        output.info("1. Start an OpenAI-compatible embedding server, e.g. LM Studio:");
        output.command(&format!("# serving {} at {}", config.model, config.embeddings_url));
    }
    output.newline();
    output.info("2. Check the setup:");
    output.command("memoria health");
    output.newline();
    output.info("3. Register the MCP server with your client:");
    output.command("memoria serve --config memoria.toml");

    InitResult::Success
}

fn write_file(path: &Path, content: &str, force: bool) -> std::io::Result<()> {
    if path.exists() && !force {
        return Ok(());
    }
    fs::write(path, content)
}

fn toml_string(value: &str) -> String {
    toml::Value::String(value.to_string()).to_string()
}

fn generate_memoria_toml(config: &InitConfig) -> String {
    let watch_directories = config
        .watch
        .iter()
        .map(|p| toml_string(&p.display().to_string()))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        r#"# memoria configuration
# Generated by: memoria init
#
# Search, retention and maintenance settings are hot-reloaded.
# Storage and embedding settings apply on restart.

[storage]
data_dir = {data_dir}

[embeddings]
enabled = {embeddings_enabled}
base_url = {base_url}
model = {model}
# api_key_env = "MEMORIA_EMBEDDINGS_API_KEY"
timeout_secs = 30
max_retries = 3
warmup_retries = 5
retry_delay_secs = 5

[search]
similarity_threshold = 0.3
memory_importance_boost = 0.1
insight_importance_boost = 0.15
conversation_candidate_limit = 1000
default_limit = 10
duplicate_window_minutes = 60

[monitoring]
enabled = {monitoring_enabled}
watch_directories = [{watch_directories}]
extensions = ["json", "jsonl", "txt", "md", "log"]
scan_on_start = true

[maintenance]
enabled = true
initial_delay_secs = 300
interval_hours = 3
retry_delay_secs = 300
min_interval_minutes = 60

[retention.conversations]
max_age_days = 90
max_count = 10000
preserve_important = true

[retention.curated_memories]
max_age_days = 365
max_count = 5000
preserve_important = true

[retention.schedule]
max_age_days = 30
cleanup_completed = true

[retention.tool_calls]
max_age_days = 30
max_count = 50000

[logging]
level = "info"
format = "pretty"

[mcp]
client_id = "unknown"
"#,
        data_dir = toml_string(&config.data_dir),
        embeddings_enabled = !config.no_embeddings,
        base_url = toml_string(&config.embeddings_url),
        model = toml_string(&config.model),
        monitoring_enabled = !config.watch.is_empty(),
        watch_directories = watch_directories,
    )
}

fn generate_env_example() -> String {
    r#"# memoria environment
# Copy to .env; values here override memoria.toml

# Logging (RUST_LOG wins over [logging].level)
RUST_LOG=info
# LOG_FORMAT=json

# MEMORIA_DATA_DIR=./memory_data
# MEMORIA_EMBEDDINGS_URL=http://localhost:1234
# MEMORIA_EMBEDDINGS_MODEL=text-embedding-nomic-embed-text-v1.5
# MEMORIA_EMBEDDINGS_API_KEY=
"#
    .to_string()
}

fn generate_gitignore(data_dir: &str) -> String {
    format!(
        r#"# memoria
.env
{}/
*.db
*.db-shm
*.db-wal
"#,
        data_dir.trim_end_matches('/')
    )
}
