//! TOML-based configuration for memoria
//!
//! All settings live in `memoria.toml`. Every section and field has a
//! default, so an empty (or absent) file yields a working local setup that
//! stores data under `./memory_data` and embeds through LM Studio.
//!
//! # Hot Reloading
//!
//! Search tuning, retention policies and maintenance intervals are read from
//! [`ConfigManager`] on every use, so edits to `memoria.toml` apply without a
//! restart. The storage location and embedding endpoint are fixed at startup.

use arc_swap::ArcSwap;
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "memoria.toml";

/// Root configuration structure loaded from memoria.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoriaConfig {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub embeddings: EmbeddingsConfig,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub monitoring: MonitoringConfig,

    #[serde(default)]
    pub maintenance: MaintenanceConfig,

    #[serde(default)]
    pub retention: RetentionConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub mcp: McpConfig,
}

// ============= Storage =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the five SQLite databases
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("memory_data")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

// ============= Embeddings =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Base URL of an OpenAI-compatible server (LM Studio, Ollama, vLLM, OpenAI)
    #[serde(default = "default_embeddings_url")]
    pub base_url: String,

    #[serde(default = "default_embeddings_model")]
    pub model: String,

    /// Environment variable holding a bearer token, if the server needs one
    pub api_key_env: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Retry budget for model-loading failures once the model has served a request
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Retry budget before the first successful request (cold JIT load)
    #[serde(default = "default_warmup_retries")]
    pub warmup_retries: u32,

    /// Base delay; attempt `n` waits `(n + 1) * retry_delay_secs`
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_embeddings_url() -> String {
    "http://localhost:1234".to_string()
}

fn default_embeddings_model() -> String {
    "text-embedding-nomic-embed-text-v1.5".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_warmup_retries() -> u32 {
    5
}

fn default_retry_delay_secs() -> u64 {
    5
}

impl Default for EmbeddingsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: default_embeddings_url(),
            model: default_embeddings_model(),
            api_key_env: None,
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            warmup_retries: default_warmup_retries(),
            retry_delay_secs: default_retry_delay_secs(),
        }
    }
}

// ============= Search =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Minimum cosine similarity (exclusive) for a semantic hit
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,

    /// Weight of `importance / 10` added to curated memory scores
    #[serde(default = "default_memory_boost")]
    pub memory_importance_boost: f32,

    /// Weight of `importance / 10` added to project insight scores
    #[serde(default = "default_insight_boost")]
    pub insight_importance_boost: f32,

    /// How many of the newest embedded messages a semantic search scans
    #[serde(default = "default_conversation_candidate_limit")]
    pub conversation_candidate_limit: usize,

    #[serde(default = "default_search_limit")]
    pub default_limit: usize,

    /// Window for treating a repeated message in the same session as a duplicate
    #[serde(default = "default_duplicate_window_minutes")]
    pub duplicate_window_minutes: i64,
}

fn default_similarity_threshold() -> f32 {
    0.3
}

fn default_memory_boost() -> f32 {
    0.1
}

fn default_insight_boost() -> f32 {
    0.15
}

fn default_conversation_candidate_limit() -> usize {
    1000
}

fn default_search_limit() -> usize {
    10
}

fn default_duplicate_window_minutes() -> i64 {
    60
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
            memory_importance_boost: default_memory_boost(),
            insight_importance_boost: default_insight_boost(),
            conversation_candidate_limit: default_conversation_candidate_limit(),
            default_limit: default_search_limit(),
            duplicate_window_minutes: default_duplicate_window_minutes(),
        }
    }
}

// ============= File Monitoring =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub watch_directories: Vec<PathBuf>,

    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Import files already present when the monitor starts
    #[serde(default = "default_true")]
    pub scan_on_start: bool,
}

fn default_extensions() -> Vec<String> {
    ["json", "jsonl", "txt", "md", "log"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            watch_directories: Vec::new(),
            extensions: default_extensions(),
            scan_on_start: true,
        }
    }
}

// ============= Maintenance =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenanceConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_initial_delay_secs")]
    pub initial_delay_secs: u64,

    #[serde(default = "default_interval_hours")]
    pub interval_hours: u64,

    /// Back-off after a failed run
    #[serde(default = "default_maintenance_retry_secs")]
    pub retry_delay_secs: u64,

    /// Unforced runs closer together than this are skipped
    #[serde(default = "default_min_interval_minutes")]
    pub min_interval_minutes: i64,
}

fn default_initial_delay_secs() -> u64 {
    300
}

fn default_interval_hours() -> u64 {
    3
}

fn default_maintenance_retry_secs() -> u64 {
    300
}

fn default_min_interval_minutes() -> i64 {
    60
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            initial_delay_secs: default_initial_delay_secs(),
            interval_hours: default_interval_hours(),
            retry_delay_secs: default_maintenance_retry_secs(),
            min_interval_minutes: default_min_interval_minutes(),
        }
    }
}

// ============= Retention =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    #[serde(default = "default_conversation_retention")]
    pub conversations: RetentionPolicy,

    #[serde(default = "default_memory_retention")]
    pub curated_memories: RetentionPolicy,

    #[serde(default = "default_schedule_retention")]
    pub schedule: RetentionPolicy,

    #[serde(default = "default_tool_call_retention")]
    pub tool_calls: RetentionPolicy,
}

/// Age and size limits for one database.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetentionPolicy {
    pub max_age_days: i64,

    /// Cap on rows kept (messages, memories or tool calls); `None` means unbounded
    pub max_count: Option<i64>,

    #[serde(default)]
    pub preserve_important: bool,

    #[serde(default)]
    pub cleanup_completed: bool,
}

fn default_conversation_retention() -> RetentionPolicy {
    RetentionPolicy {
        max_age_days: 90,
        max_count: Some(10_000),
        preserve_important: true,
        cleanup_completed: false,
    }
}

fn default_memory_retention() -> RetentionPolicy {
    RetentionPolicy {
        max_age_days: 365,
        max_count: Some(5_000),
        preserve_important: true,
        cleanup_completed: false,
    }
}

fn default_schedule_retention() -> RetentionPolicy {
    RetentionPolicy {
        max_age_days: 30,
        max_count: None,
        preserve_important: false,
        cleanup_completed: true,
    }
}

fn default_tool_call_retention() -> RetentionPolicy {
    RetentionPolicy {
        max_age_days: 30,
        max_count: Some(50_000),
        preserve_important: false,
        cleanup_completed: false,
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self::standard()
    }
}

impl RetentionConfig {
    /// The built-in policies (also what an empty `[retention]` table means).
    pub fn standard() -> Self {
        Self {
            conversations: default_conversation_retention(),
            curated_memories: default_memory_retention(),
            schedule: default_schedule_retention(),
            tool_calls: default_tool_call_retention(),
        }
    }
}

// ============= Logging / MCP =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// `pretty` or `json`
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpConfig {
    /// Client id recorded with every logged tool call
    #[serde(default = "default_client_id")]
    pub client_id: String,
}

fn default_client_id() -> String {
    "unknown".to_string()
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            client_id: default_client_id(),
        }
    }
}

/// Errors that can occur during configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Environment variable '{0}' referenced in config is not set")]
    MissingEnvVar(String),

    #[error("Watch error: {0}")]
    WatchError(#[from] notify::Error),
}

impl MemoriaConfig {
    /// Load configuration from a TOML file, apply env overrides and validate
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let mut config: MemoriaConfig = toml::from_str(&content)?;
        config.apply_env_overrides();

        config.validate()?;

        Ok(config)
    }

    /// Like [`MemoriaConfig::load`], but a missing file yields the defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        match Self::load(path.as_ref()) {
            Err(ConfigError::FileNotFound(p)) => {
                info!("No config at {:?}, using defaults", p);
                let mut config = MemoriaConfig::default();
                config.apply_env_overrides();
                config.validate()?;
                Ok(config)
            }
            other => other,
        }
    }

    /// `MEMORIA_DATA_DIR`, `MEMORIA_EMBEDDINGS_URL` and `MEMORIA_EMBEDDINGS_MODEL`
    pub fn apply_env_overrides(&mut self) {
        if let Ok(dir) = std::env::var("MEMORIA_DATA_DIR") {
            self.storage.data_dir = PathBuf::from(dir);
        }
        if let Ok(url) = std::env::var("MEMORIA_EMBEDDINGS_URL") {
            self.embeddings.base_url = url;
        }
        if let Ok(model) = std::env::var("MEMORIA_EMBEDDINGS_MODEL") {
            self.embeddings.model = model;
        }
    }

    /// Validate the configuration for internal consistency and env var availability
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(ref env) = self.embeddings.api_key_env {
            self.validate_env_var(env)?;
        }

        if self.embeddings.enabled && self.embeddings.base_url.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "embeddings.base_url must not be empty".to_string(),
            ));
        }

        if !(-1.0..=1.0).contains(&self.search.similarity_threshold) {
            return Err(ConfigError::ValidationError(format!(
                "search.similarity_threshold must be within [-1, 1], got {}",
                self.search.similarity_threshold
            )));
        }

        if self.search.default_limit == 0 {
            return Err(ConfigError::ValidationError(
                "search.default_limit must be at least 1".to_string(),
            ));
        }

        if self.search.duplicate_window_minutes < 0 {
            return Err(ConfigError::ValidationError(
                "search.duplicate_window_minutes must not be negative".to_string(),
            ));
        }

        if self.maintenance.interval_hours == 0 {
            return Err(ConfigError::ValidationError(
                "maintenance.interval_hours must be at least 1".to_string(),
            ));
        }

        for (name, policy) in [
            ("conversations", &self.retention.conversations),
            ("curated_memories", &self.retention.curated_memories),
            ("schedule", &self.retention.schedule),
            ("tool_calls", &self.retention.tool_calls),
        ] {
            if policy.max_age_days < 1 {
                return Err(ConfigError::ValidationError(format!(
                    "retention.{}.max_age_days must be at least 1",
                    name
                )));
            }
            if matches!(policy.max_count, Some(n) if n < 1) {
                return Err(ConfigError::ValidationError(format!(
                    "retention.{}.max_count must be at least 1",
                    name
                )));
            }
        }

        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            return Err(ConfigError::ValidationError(format!(
                "logging.format must be 'pretty' or 'json', got '{}'",
                self.logging.format
            )));
        }

        if self.monitoring.enabled && self.monitoring.watch_directories.is_empty() {
            warn!("monitoring.enabled is set but no watch_directories are configured");
        }

        Ok(())
    }

    fn validate_env_var(&self, name: &str) -> Result<(), ConfigError> {
        std::env::var(name).map_err(|_| ConfigError::MissingEnvVar(name.to_string()))?;
        Ok(())
    }

    /// The embedding API key, if one is configured
    pub fn embeddings_api_key(&self) -> Result<Option<String>, ConfigError> {
        match self.embeddings.api_key_env {
            Some(ref env) => std::env::var(env)
                .map(Some)
                .map_err(|_| ConfigError::MissingEnvVar(env.clone())),
            None => Ok(None),
        }
    }
}

// ============= Hot Reloading Configuration Manager =============

/// Thread-safe configuration manager with hot reloading support
pub struct ConfigManager {
    config: Arc<ArcSwap<MemoriaConfig>>,
    config_path: PathBuf,
    watcher: RwLock<Option<RecommendedWatcher>>,
    reload_tx: Option<mpsc::UnboundedSender<()>>,
}

impl ConfigManager {
    /// Create a new configuration manager and load the initial config.
    ///
    /// A missing file is not an error: defaults are used and the file is
    /// picked up by the watcher once it is created.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        // Convert to absolute path for reliable file watching
        let path = path.as_ref();
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .map_err(ConfigError::ReadError)?
                .join(path)
        };

        let config = MemoriaConfig::load_or_default(&path)?;

        Ok(Self {
            config: Arc::new(ArcSwap::from_pointee(config)),
            config_path: path,
            watcher: RwLock::new(None),
            reload_tx: None,
        })
    }

    /// Get the current configuration (lockless read)
    pub fn config(&self) -> Arc<MemoriaConfig> {
        self.config.load_full()
    }

    /// Path the configuration was loaded from
    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Manually reload the configuration from disk
    pub fn reload(&self) -> Result<(), ConfigError> {
        info!("Reloading configuration from {:?}", self.config_path);

        let new_config = MemoriaConfig::load(&self.config_path)?;
        self.config.store(Arc::new(new_config));

        info!("Configuration reloaded successfully");
        Ok(())
    }

    /// Start watching for configuration file changes
    pub fn start_watching(&mut self) -> Result<(), ConfigError> {
        let (tx, mut rx) = mpsc::unbounded_channel::<()>();
        self.reload_tx = Some(tx.clone());

        let config_path = self.config_path.clone();
        let config_arc = Arc::clone(&self.config);
        let watched_name = config_path.file_name().map(|n| n.to_os_string());

        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            match res {
                Ok(event) => {
                    let touches_config = event
                        .paths
                        .iter()
                        .any(|p| p.file_name().map(|n| n.to_os_string()) == watched_name);
                    if touches_config && (event.kind.is_modify() || event.kind.is_create()) {
                        // Debounced in the receiver
                        let _ = tx.send(());
                    }
                }
                Err(e) => {
                    error!("Config watcher error: {:?}", e);
                }
            }
        })?;

        // Watch the parent directory so editors that replace the file are seen
        if let Some(parent) = self.config_path.parent() {
            watcher.watch(parent, RecursiveMode::NonRecursive)?;
        }

        *self.watcher.write() = Some(watcher);

        tokio::spawn(async move {
            let mut last_reload: Option<std::time::Instant> = None;
            let debounce_duration = Duration::from_millis(500);

            while rx.recv().await.is_some() {
                if matches!(last_reload, Some(t) if t.elapsed() < debounce_duration) {
                    continue;
                }

                // Let the write finish
                tokio::time::sleep(Duration::from_millis(100)).await;

                match MemoriaConfig::load(&config_path) {
                    Ok(new_config) => {
                        config_arc.store(Arc::new(new_config));
                        info!("Configuration hot-reloaded successfully");
                        last_reload = Some(std::time::Instant::now());
                    }
                    Err(e) => {
                        warn!(
                            "Failed to hot-reload config: {}. Keeping previous config.",
                            e
                        );
                    }
                }
            }
        });

        info!("Configuration hot-reload watcher started");
        Ok(())
    }

    /// Stop watching for configuration changes
    pub fn stop_watching(&self) {
        *self.watcher.write() = None;
        info!("Configuration hot-reload watcher stopped");
    }
}

impl Clone for ConfigManager {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            config_path: self.config_path.clone(),
            watcher: RwLock::new(None), // Watcher is not cloned
            reload_tx: self.reload_tx.clone(),
        }
    }
}

impl ConfigManager {
    /// Create a config manager directly from a config (useful for testing)
    /// This won't have file watching capabilities.
    pub fn from_config(config: MemoriaConfig) -> Self {
        Self {
            config: Arc::new(ArcSwap::from_pointee(config)),
            config_path: PathBuf::from("test-config.toml"),
            watcher: RwLock::new(None),
            reload_tx: None,
        }
    }

    /// Replace the active configuration in place
    pub fn replace(&self, config: MemoriaConfig) {
        self.config.store(Arc::new(config));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_config() -> String {
        r#"
[storage]
data_dir = "./data/memory"

[embeddings]
base_url = "http://127.0.0.1:11434"
model = "nomic-embed-text"
max_retries = 2

[search]
similarity_threshold = 0.4
memory_importance_boost = 0.2

[monitoring]
enabled = true
watch_directories = ["./exports"]

[retention.conversations]
max_age_days = 30
preserve_important = true

[logging]
level = "debug"
format = "json"
"#
        .to_string()
    }

    #[test]
    fn test_parse_config() {
        let config: MemoriaConfig =
            toml::from_str(&create_test_config()).expect("Failed to parse config");

        assert_eq!(config.storage.data_dir, PathBuf::from("./data/memory"));
        assert_eq!(config.embeddings.model, "nomic-embed-text");
        assert_eq!(config.embeddings.max_retries, 2);
        assert_eq!(config.embeddings.warmup_retries, 5);
        assert_eq!(config.search.similarity_threshold, 0.4);
        assert_eq!(config.search.conversation_candidate_limit, 1000);
        assert_eq!(config.retention.conversations.max_age_days, 30);
        assert_eq!(config.retention.conversations.max_count, None);
        assert_eq!(config.retention.tool_calls.max_age_days, 30);
        assert_eq!(config.logging.format, "json");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: MemoriaConfig = toml::from_str("").unwrap();

        assert_eq!(config.storage.data_dir, PathBuf::from("memory_data"));
        assert_eq!(config.embeddings.base_url, "http://localhost:1234");
        assert_eq!(
            config.embeddings.model,
            "text-embedding-nomic-embed-text-v1.5"
        );
        assert_eq!(config.search.similarity_threshold, 0.3);
        assert_eq!(config.retention.conversations.max_age_days, 90);
        assert_eq!(config.retention.curated_memories.max_age_days, 365);
        assert!(config.retention.schedule.cleanup_completed);
        assert_eq!(config.retention.tool_calls.max_count, Some(50_000));
        assert_eq!(config.maintenance.interval_hours, 3);
        assert_eq!(config.mcp.client_id, "unknown");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_matches_empty_file() {
        let parsed: MemoriaConfig = toml::from_str("").unwrap();
        let standard = RetentionConfig::standard();
        assert_eq!(
            parsed.retention.conversations.max_count,
            standard.conversations.max_count
        );
    }

    #[test]
    fn test_validation_rejects_bad_threshold() {
        let mut config: MemoriaConfig = toml::from_str("").unwrap();
        config.search.similarity_threshold = 1.5;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_validation_rejects_bad_log_format() {
        let config: MemoriaConfig = toml::from_str("[logging]\nformat = \"xml\"").unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_validation_missing_api_key_env() {
        let config: MemoriaConfig = toml::from_str(
            "[embeddings]\napi_key_env = \"MEMORIA_TEST_KEY_THAT_IS_NEVER_SET\"",
        )
        .unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingEnvVar(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let result = MemoriaConfig::load("/definitely/not/here/memoria.toml");
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_manager_reload_picks_up_changes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("memoria.toml");
        fs::write(&path, "[search]\nsimilarity_threshold = 0.3\n").unwrap();

        let manager = ConfigManager::new(&path).unwrap();
        assert_eq!(manager.config().search.similarity_threshold, 0.3);

        fs::write(&path, "[search]\nsimilarity_threshold = 0.5\n").unwrap();
        manager.reload().unwrap();
        assert_eq!(manager.config().search.similarity_threshold, 0.5);
    }

    #[test]
    fn test_manager_keeps_config_on_bad_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("memoria.toml");
        fs::write(&path, "[search]\ndefault_limit = 7\n").unwrap();

        let manager = ConfigManager::new(&path).unwrap();
        fs::write(&path, "[search\nbroken").unwrap();

        assert!(manager.reload().is_err());
        assert_eq!(manager.config().search.default_limit, 7);
    }

    #[test]
    fn test_from_config_and_replace() {
        let manager = ConfigManager::from_config(MemoriaConfig::default());
        let mut updated = MemoriaConfig::default();
        updated.search.default_limit = 3;
        manager.replace(updated);
        assert_eq!(manager.config().search.default_limit, 3);
    }
}
