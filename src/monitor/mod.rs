//! Conversation file monitoring.
//!
//! Watches directories for exported chat transcripts and imports every new
//! or changed file through a [`ConversationSink`]. Files are identified by a
//! SHA-256 of their content, so touching a file without changing it never
//! imports it twice.

pub mod parsers;

use crate::types::{NewMessage, Result, StoreMessageOutcome};
use crate::utils::time::now_timestamp;
use async_trait::async_trait;
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub use parsers::{detect_source_application, parse_transcript, ParsedMessage, ParsedTranscript};

/// `source_type` recorded on imported messages.
pub const FILE_IMPORT_SOURCE: &str = "file_import";

/// Where imported messages are written.
#[async_trait]
pub trait ConversationSink: Send + Sync {
    async fn store_imported_message(&self, message: NewMessage) -> Result<StoreMessageOutcome>;
}

/// Monitor state shared with health reporting.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MonitorStatus {
    pub enabled: bool,
    pub running: bool,
    pub watch_directories: Vec<PathBuf>,
    pub files_imported: u64,
    pub messages_imported: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_import: Option<String>,
}

pub type SharedMonitorStatus = Arc<RwLock<MonitorStatus>>;

/// Outcome of importing one file.
#[derive(Debug, Clone, Serialize)]
pub struct ImportSummary {
    pub path: PathBuf,
    pub format: String,
    pub source_application: String,
    /// `true` when the same content was imported before
    pub unchanged: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    pub messages_imported: usize,
    pub duplicates_skipped: usize,
}

/// Reads, hashes, parses and stores transcript files.
struct Importer {
    sink: Arc<dyn ConversationSink>,
    extensions: Vec<String>,
    seen_hashes: Mutex<HashSet<String>>,
    status: SharedMonitorStatus,
}

impl Importer {
    fn accepts(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|ext| {
                self.extensions
                    .iter()
                    .any(|allowed| allowed.trim_start_matches('.').eq_ignore_ascii_case(ext))
            })
            .unwrap_or(false)
    }

    async fn import_file(&self, path: &Path) -> Result<ImportSummary> {
        let content = tokio::fs::read_to_string(path).await?;
        let hash = content_hash(&content);
        let source_application = detect_source_application(path).to_string();

        if self.seen_hashes.lock().contains(&hash) {
            debug!(path = %path.display(), "File content unchanged, skipping");
            return Ok(ImportSummary {
                path: path.to_path_buf(),
                format: String::new(),
                source_application,
                unchanged: true,
                session_id: None,
                conversation_id: None,
                messages_imported: 0,
                duplicates_skipped: 0,
            });
        }

        let transcript = parse_transcript(path, &content);
        let session_id = Uuid::new_v4().to_string();
        let conversation_id = Uuid::new_v4().to_string();
        let imported_at = now_timestamp();
        let mut imported = 0;
        let mut duplicates = 0;

        for message in &transcript.messages {
            let metadata = serde_json::json!({
                "source_file": path.display().to_string(),
                "source_application": source_application,
                "format": transcript.format,
                "imported_at": imported_at,
            });
            let outcome = self
                .sink
                .store_imported_message(
                    NewMessage::new(message.role, message.content.as_str())
                        .in_session(session_id.as_str())
                        .in_conversation(conversation_id.as_str())
                        .with_metadata(metadata)
                        .with_source(FILE_IMPORT_SOURCE),
                )
                .await?;
            if outcome.duplicate {
                duplicates += 1;
            } else {
                imported += 1;
            }
        }

        self.seen_hashes.lock().insert(hash);
        {
            let mut status = self.status.write();
            status.files_imported += 1;
            status.messages_imported += imported as u64;
            status.last_import = Some(imported_at);
        }

        info!(
            path = %path.display(),
            format = transcript.format,
            source = %source_application,
            messages = imported,
            "Imported conversation file"
        );

        Ok(ImportSummary {
            path: path.to_path_buf(),
            format: transcript.format.to_string(),
            source_application,
            unchanged: false,
            session_id: Some(session_id),
            conversation_id: Some(conversation_id),
            messages_imported: imported,
            duplicates_skipped: duplicates,
        })
    }

    async fn import_logged(&self, path: &Path) {
        if let Err(e) = self.import_file(path).await {
            warn!(path = %path.display(), "Failed to import conversation file: {}", e);
        }
    }
}

/// Watches directories for chat transcripts and imports them.
pub struct ConversationFileMonitor {
    importer: Arc<Importer>,
    watcher: Mutex<Option<RecommendedWatcher>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ConversationFileMonitor {
    pub fn new(
        sink: Arc<dyn ConversationSink>,
        status: SharedMonitorStatus,
        directories: Vec<PathBuf>,
        extensions: Vec<String>,
    ) -> Self {
        {
            let mut s = status.write();
            s.enabled = true;
            s.watch_directories = directories;
        }
        Self {
            importer: Arc::new(Importer {
                sink,
                extensions,
                seen_hashes: Mutex::new(HashSet::new()),
                status,
            }),
            watcher: Mutex::new(None),
            task: Mutex::new(None),
        }
    }

    pub fn status(&self) -> MonitorStatus {
        self.importer.status.read().clone()
    }

    pub fn is_running(&self) -> bool {
        self.task.lock().as_ref().map(|t| !t.is_finished()).unwrap_or(false)
    }

    /// Import a single file now, regardless of its extension.
    pub async fn import_file(&self, path: impl AsRef<Path>) -> Result<ImportSummary> {
        self.importer.import_file(path.as_ref()).await
    }

    /// Import every matching file already present under the watched
    /// directories.
    pub async fn scan_existing(&self) -> Vec<ImportSummary> {
        let directories = self.importer.status.read().watch_directories.clone();
        let mut summaries = Vec::new();
        for dir in directories {
            for path in collect_files(&dir).await {
                if !self.importer.accepts(&path) {
                    continue;
                }
                match self.importer.import_file(&path).await {
                    Ok(summary) => summaries.push(summary),
                    Err(e) => warn!(path = %path.display(), "Failed to import conversation file: {}", e),
                }
            }
        }
        summaries
    }

    /// Start watching. With `scan_on_start`, files already on disk are
    /// imported first.
    pub fn start(&self, scan_on_start: bool) -> Result<()> {
        if self.is_running() {
            return Ok(());
        }

        let (tx, mut rx) = mpsc::unbounded_channel::<PathBuf>();
        let mut watcher = notify::recommended_watcher(move |res: std::result::Result<Event, notify::Error>| {
            match res {
                Ok(event) => {
                    if event.kind.is_create() || event.kind.is_modify() {
                        for path in event.paths {
                            let _ = tx.send(path);
                        }
                    }
                }
                Err(e) => error!("File monitor watcher error: {:?}", e),
            }
        })
        .map_err(|e| crate::types::AppError::Internal(format!("Failed to create file watcher: {}", e)))?;

        let directories = self.importer.status.read().watch_directories.clone();
        for dir in &directories {
            watch_directory(&mut watcher, dir);
        }
        *self.watcher.lock() = Some(watcher);

        let directory_count = directories.len();
        let importer = Arc::clone(&self.importer);
        let handle = tokio::spawn(async move {
            if scan_on_start {
                for dir in &directories {
                    for path in collect_files(dir).await {
                        if importer.accepts(&path) {
                            importer.import_logged(&path).await;
                        }
                    }
                }
            }

            while let Some(path) = rx.recv().await {
                if !importer.accepts(&path) || !path.is_file() {
                    continue;
                }
                // Let the writer finish
                tokio::time::sleep(Duration::from_millis(250)).await;
                importer.import_logged(&path).await;
            }
        });
        *self.task.lock() = Some(handle);

        self.importer.status.write().running = true;
        info!(directories = directory_count, "Conversation file monitoring started");
        Ok(())
    }

    /// Stop watching; files already imported stay imported.
    pub fn stop(&self) {
        *self.watcher.lock() = None;
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
        self.importer.status.write().running = false;
        info!("Conversation file monitoring stopped");
    }

    /// Add a directory, watching it immediately when the monitor is running.
    pub fn add_watch_directory(&self, directory: impl Into<PathBuf>) {
        let directory = directory.into();
        {
            let mut status = self.importer.status.write();
            if status.watch_directories.contains(&directory) {
                return;
            }
            status.watch_directories.push(directory.clone());
        }
        if let Some(watcher) = self.watcher.lock().as_mut() {
            watch_directory(watcher, &directory);
        }
        info!(directory = %directory.display(), "Added watch directory");
    }
}

impl Drop for ConversationFileMonitor {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().take() {
            task.abort();
        }
    }
}

fn watch_directory(watcher: &mut RecommendedWatcher, dir: &Path) {
    if !dir.is_dir() {
        warn!(directory = %dir.display(), "Watch directory does not exist, skipping");
        return;
    }
    if let Err(e) = watcher.watch(dir, RecursiveMode::Recursive) {
        warn!(directory = %dir.display(), "Failed to watch directory: {}", e);
    }
}

/// Hex SHA-256 of file content.
pub fn content_hash(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

/// Every regular file under `root`, recursively, in a stable order.
async fn collect_files(root: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) => {
                debug!(directory = %dir.display(), "Cannot read directory: {}", e);
                continue;
            }
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            match entry.file_type().await {
                Ok(ft) if ft.is_dir() => pending.push(path),
                Ok(ft) if ft.is_file() => files.push(path),
                _ => {}
            }
        }
    }

    files.sort();
    files
}
