//! Handlers for the one-shot CLI commands.
//!
//! Each handler prints through [`Output`] and returns `anyhow::Result` so the
//! binary can report failures uniformly.

use super::output::Output;
use crate::mcp::{ToolDispatcher, TOOL_NAMES};
use crate::memory::{HealthStatus, MemorySystem};
use crate::monitor::{ConversationFileMonitor, ConversationSink};
use crate::search::SearchRequest;
use crate::types::NewMemory;
use crate::utils::toml_config::{ConfigManager, MemoriaConfig};
use anyhow::Context;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Client id recorded for tool calls made from the command line.
pub const CLI_CLIENT_ID: &str = "cli";

fn truncate(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        return flat;
    }
    let cut: String = flat.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{}...", cut)
}

pub async fn health(system: &MemorySystem, json: bool, output: &Output) -> anyhow::Result<()> {
    let report = system.get_system_health().await;
    if json {
        output.json(&serde_json::to_value(&report)?);
        return Ok(());
    }

    let status = match report.status {
        HealthStatus::Healthy => "healthy",
        HealthStatus::Degraded => "degraded",
        HealthStatus::Error => "error",
    };
    output.header("System health");
    output.status("status", status);
    output.kv("data directory", &report.data_dir);

    output.subheader("Databases");
    for (name, stats) in &report.databases {
        let counts = stats
            .counts
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(", ");
        output.kv(name, &format!("{:.2} MB ({})", stats.size_mb, counts));
    }

    output.subheader("Embeddings");
    output.status("service", report.embedding_service.status);
    output.kv("model", &report.embedding_service.model);
    if let Some(dimensions) = report.embedding_service.dimensions {
        output.kv("dimensions", &dimensions.to_string());
    }

    output.subheader("File monitoring");
    output.kv("enabled", &report.file_monitoring.enabled.to_string());
    output.kv("files imported", &report.file_monitoring.files_imported.to_string());

    for issue in &report.issues {
        output.warning(issue);
    }
    Ok(())
}

pub async fn remember(
    system: &MemorySystem,
    memory: NewMemory,
    output: &Output,
) -> anyhow::Result<()> {
    let memory_id = system.create_memory(memory).await?;
    system.wait_for_embeddings().await;
    output.success(&format!("Stored memory {}", memory_id));
    Ok(())
}

pub async fn search(system: &MemorySystem, request: SearchRequest, json: bool, output: &Output) -> anyhow::Result<()> {
    let response = system.search_memories(&request).await?;

    if json {
        output.json(&serde_json::to_value(&response)?);
        return Ok(());
    }

    output.header(&format!("{} result(s) for \"{}\"", response.count, response.query));
    if let Some(ref note) = response.note {
        output.info(note);
    }
    if response.results.is_empty() {
        return Ok(());
    }
    let table = output.table(&[("Score", 6), ("Type", 24), ("Content", 60)]);
    for result in &response.results {
        let score = format!("{:.3}", result.similarity_score);
        let text = truncate(result.hit.text(), 60);
        table.row(&[score.as_str(), result.hit.kind(), text.as_str()]);
    }
    Ok(())
}

/// Import files, and every matching file under directories, once.
pub async fn import(system: Arc<MemorySystem>, paths: &[PathBuf], output: &Output) -> anyhow::Result<()> {
    let (directories, files): (Vec<PathBuf>, Vec<PathBuf>) = paths.iter().cloned().partition(|p| p.is_dir());
    let extensions = system.config().config().monitoring.extensions.clone();
    let sink: Arc<dyn ConversationSink> = system.clone();
    let monitor = ConversationFileMonitor::new(sink, system.monitor_status(), directories, extensions);

    output.header("Importing conversations");
    let mut summaries = monitor.scan_existing().await;
    for file in &files {
        match monitor.import_file(file).await {
            Ok(summary) => summaries.push(summary),
            Err(e) => output.error(&format!("{}: {}", file.display(), e)),
        }
    }

    let total = summaries.len();
    for (i, summary) in summaries.iter().enumerate() {
        let detail = if summary.unchanged {
            "unchanged since last import".to_string()
        } else {
            format!(
                "{} message(s) from {} ({}), {} duplicate(s) skipped",
                summary.messages_imported, summary.source_application, summary.format, summary.duplicates_skipped
            )
        };
        output.step(
            (i + 1) as u32,
            total as u32,
            &format!("{}: {}", summary.path.display(), detail),
        );
    }

    system.wait_for_embeddings().await;
    let status = monitor.status();
    output.success(&format!(
        "Imported {} message(s) from {} file(s)",
        status.messages_imported, status.files_imported
    ));
    Ok(())
}

pub async fn maintenance(system: &MemorySystem, force: bool, json: bool, output: &Output) -> anyhow::Result<()> {
    let report = system.run_database_maintenance(force).await;
    if json {
        output.json(&serde_json::to_value(&report)?);
    } else if report.skipped {
        output.status("maintenance", "skipped");
        if let Some(ref reason) = report.reason {
            output.info(reason);
        }
        output.hint("Use --force to run anyway");
    } else {
        output.header("Database maintenance");
        for upgrade in &report.schema_upgrades {
            output.list_item(upgrade);
        }
        output.kv("items cleaned", &report.items_cleaned().to_string());
        output.kv("space saved", &format!("{:.2} MB", report.total_space_saved_mb()));
    }

    match report.error {
        Some(e) => Err(anyhow::anyhow!("Maintenance failed: {}", e)),
        None => Ok(()),
    }
}

pub async fn reflect(system: &MemorySystem, days: i64, client: Option<&str>, output: &Output) -> anyhow::Result<()> {
    let result = system.reflect_on_tool_usage(days, client).await?;
    output.header(&format!("Tool usage over {} day(s)", result.period_days));
    output.info(&result.reflection.content);

    output.subheader("Insights");
    for insight in &result.reflection.insights {
        output.list_item(insight);
    }
    output.subheader("Recommendations");
    for recommendation in &result.reflection.recommendations {
        output.list_item(recommendation);
    }
    Ok(())
}

pub async fn call_tool(system: Arc<MemorySystem>, tool: &str, args: &str, output: &Output) -> anyhow::Result<()> {
    let args: Value = serde_json::from_str(args).context("tool arguments must be a JSON object")?;
    let dispatcher = ToolDispatcher::new(system.clone()).with_client_id(CLI_CLIENT_ID);
    let result = dispatcher.call(tool, args).await;
    system.wait_for_embeddings().await;
    output.json(&result?);
    Ok(())
}

pub fn list_tools(output: &Output) {
    output.header("Tools");
    for name in TOOL_NAMES {
        output.list_item(name);
    }
}

/// `memoria config`: summary, full dump or validation of the file.
pub fn config(path: &Path, full: bool, validate: bool, output: &Output) -> anyhow::Result<()> {
    if validate {
        MemoriaConfig::load(path).with_context(|| format!("{} is not valid", path.display()))?;
        output.success(&format!("{} is valid", path.display()));
        return Ok(());
    }

    let manager = ConfigManager::new(path)?;
    let config = manager.config();
    if full {
        println!("{}", toml::to_string_pretty(config.as_ref())?);
        return Ok(());
    }

    output.header("Configuration");
    output.kv("file", &manager.path().display().to_string());
    output.kv("data directory", &config.storage.data_dir.display().to_string());
    let embeddings = if config.embeddings.enabled {
        format!("{} at {}", config.embeddings.model, config.embeddings.base_url)
    } else {
        "disabled".to_string()
    };
    output.kv("embeddings", &embeddings);
    output.kv("monitoring", &config.monitoring.enabled.to_string());
    for dir in &config.monitoring.watch_directories {
        output.list_item(&dir.display().to_string());
    }
    output.kv(
        "maintenance",
        &format!("every {} hour(s)", config.maintenance.interval_hours),
    );
    Ok(())
}
