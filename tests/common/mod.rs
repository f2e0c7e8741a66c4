#![allow(dead_code)]

pub mod mocks;

use memoria::embeddings::EmbeddingProvider;
use memoria::utils::toml_config::{ConfigManager, MemoriaConfig};
use memoria::MemorySystem;
use mocks::MockEmbedder;
use std::path::Path;
use std::sync::Arc;

/// Defaults with the duplicate window and maintenance delay that tests
/// expect.
pub fn test_config() -> MemoriaConfig {
    let mut config = MemoriaConfig::default();
    config.maintenance.initial_delay_secs = 3600;
    config.monitoring.extensions = vec!["json".into(), "jsonl".into(), "txt".into(), "md".into()];
    config
}

/// In-memory system backed by the given embedder.
pub async fn memory_system(embedder: Arc<dyn EmbeddingProvider>) -> Arc<MemorySystem> {
    Arc::new(
        MemorySystem::open_in_memory(embedder, ConfigManager::from_config(test_config()))
            .await
            .expect("Failed to open in-memory system"),
    )
}

/// In-memory system with the keyword mock embedder.
pub async fn mock_system() -> (Arc<MemorySystem>, Arc<MockEmbedder>) {
    let embedder = Arc::new(MockEmbedder::new());
    let system = memory_system(embedder.clone()).await;
    (system, embedder)
}

/// File-backed system under `data_dir`.
pub async fn file_system(data_dir: &Path, embedder: Arc<dyn EmbeddingProvider>) -> Arc<MemorySystem> {
    let mut config = test_config();
    config.storage.data_dir = data_dir.to_path_buf();
    let stores = memoria::db::Stores::open(data_dir)
        .await
        .expect("Failed to open data directory");
    Arc::new(MemorySystem::with_parts(stores, embedder, ConfigManager::from_config(config)))
}
