use memoria::cli::init::{self, InitConfig, InitResult};
use memoria::cli::output::Output;
use memoria::cli::{commands, Cli, Commands};
use memoria::db::MemoryFilter;
use memoria::monitor::{ConversationFileMonitor, ConversationSink};
use memoria::utils::logging::init_logging;
use memoria::utils::toml_config::{ConfigManager, LoggingConfig};
use memoria::{AutoMaintenance, MemorySystem, NewMemory, SearchRequest, SearchScope};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse_args();
    let output = if cli.no_color {
        Output::no_color()
    } else {
        Output::new()
    };

    let command = cli.command.unwrap_or_default();
    let result = run(command, &cli.config, cli.verbose, &output).await;
    if let Err(ref e) = result {
        output.error(&format!("{:#}", e));
    }
    result
}

async fn run(command: Commands, config_path: &Path, verbose: bool, output: &Output) -> anyhow::Result<()> {
    match command {
        // Commands that must work without a valid config file
        Commands::Init {
            path,
            force,
            data_dir,
            embeddings_url,
            model,
            no_embeddings,
            watch,
        } => {
            let config = InitConfig {
                path,
                force,
                data_dir,
                embeddings_url,
                model,
                no_embeddings,
                watch,
            };
            match init::run(config, output) {
                InitResult::Error(e) => Err(anyhow::anyhow!(e)),
                InitResult::Success | InitResult::AlreadyExists => Ok(()),
            }
        }
        Commands::Config { full, validate } => {
            init_logging(&LoggingConfig::default(), verbose);
            commands::config(config_path, full, validate, output)
        }
        Commands::Tools => {
            commands::list_tools(output);
            Ok(())
        }

        Commands::Serve {
            no_monitor,
            no_maintenance,
        } => serve(load_config(config_path, verbose)?, no_monitor, no_maintenance).await,
        Commands::Health { json } => commands::health(&*open_system(config_path, verbose).await?, json, output).await,
        Commands::Remember {
            content,
            memory_type,
            importance,
            tags,
        } => {
            let mut memory = NewMemory::new(content).importance(importance).tags(tags);
            if let Some(memory_type) = memory_type {
                memory = memory.of_type(memory_type);
            }
            commands::remember(&*open_system(config_path, verbose).await?, memory, output).await
        }
        Commands::Search {
            query,
            limit,
            scope,
            memory_type,
            min_importance,
            max_importance,
            json,
        } => {
            let mut request = SearchRequest::new(query)
                .scope(scope.parse::<SearchScope>()?)
                .filter(MemoryFilter {
                    min_importance,
                    max_importance,
                    memory_type,
                });
            if let Some(limit) = limit {
                request = request.limit(limit);
            }
            commands::search(&*open_system(config_path, verbose).await?, request, json, output).await
        }
        Commands::Import { paths } => commands::import(open_system(config_path, verbose).await?, &paths, output).await,
        Commands::Maintenance { force, json } => {
            commands::maintenance(&*open_system(config_path, verbose).await?, force, json, output).await
        }
        Commands::Reflect { days, client } => {
            commands::reflect(&*open_system(config_path, verbose).await?, days, client.as_deref(), output).await
        }
        Commands::Call { tool, args } => {
            commands::call_tool(open_system(config_path, verbose).await?, &tool, &args, output).await
        }
    }
}

fn load_config(path: &Path, verbose: bool) -> anyhow::Result<ConfigManager> {
    let manager = ConfigManager::new(path)?;
    init_logging(&manager.config().logging, verbose);
    Ok(manager)
}

async fn open_system(path: &Path, verbose: bool) -> anyhow::Result<Arc<MemorySystem>> {
    let manager = load_config(path, verbose)?;
    Ok(Arc::new(MemorySystem::open(manager).await?))
}

/// Serve MCP on stdio with the file monitor and automatic maintenance
/// running alongside, until the client disconnects or Ctrl-C.
async fn serve(mut manager: ConfigManager, no_monitor: bool, no_maintenance: bool) -> anyhow::Result<()> {
    if let Err(e) = manager.start_watching() {
        warn!("Config hot-reload unavailable: {}", e);
    }

    let system = Arc::new(MemorySystem::open(manager.clone()).await?);
    let settings = manager.config();

    let monitor = if settings.monitoring.enabled && !no_monitor {
        let sink: Arc<dyn ConversationSink> = system.clone();
        let monitor = ConversationFileMonitor::new(
            sink,
            system.monitor_status(),
            settings.monitoring.watch_directories.clone(),
            settings.monitoring.extensions.clone(),
        );
        match monitor.start(settings.monitoring.scan_on_start) {
            Ok(()) => Some(monitor),
            Err(e) => {
                warn!("File monitoring disabled: {}", e);
                None
            }
        }
    } else {
        None
    };

    let auto_maintenance = if settings.maintenance.enabled && !no_maintenance {
        let auto = AutoMaintenance::new(system.maintenance(), manager.clone());
        auto.start();
        Some(auto)
    } else {
        None
    };

    let result = run_server(Arc::clone(&system)).await;

    if let Some(monitor) = monitor {
        monitor.stop();
    }
    if let Some(auto) = auto_maintenance {
        auto.stop();
    }
    system.wait_for_embeddings().await;
    manager.stop_watching();
    info!("memoria stopped");
    result
}

#[cfg(feature = "mcp")]
async fn run_server(system: Arc<MemorySystem>) -> anyhow::Result<()> {
    let dispatcher = memoria::ToolDispatcher::new(system);
    tokio::select! {
        result = memoria::mcp::start_stdio_server(dispatcher) => result?,
        _ = tokio::signal::ctrl_c() => info!("Interrupted, shutting down"),
    }
    Ok(())
}

#[cfg(not(feature = "mcp"))]
async fn run_server(_system: Arc<MemorySystem>) -> anyhow::Result<()> {
    anyhow::bail!("memoria was built without the `mcp` feature; rebuild with --features mcp to serve")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("memoria.toml");
        let data_dir = dir.path().join("data");
        std::fs::write(
            &path,
            format!(
                "[storage]\ndata_dir = {:?}\n\n[embeddings]\nenabled = false\n\n[monitoring]\nenabled = false\n",
                data_dir.display().to_string()
            ),
        )
        .unwrap();
        path
    }

    #[tokio::test]
    async fn test_commands_without_config_file() {
        let dir = TempDir::new().unwrap();
        let output = Output::no_color();
        let missing = dir.path().join("absent.toml");

        run(Commands::Tools, &missing, false, &output).await.unwrap();
        let init = Commands::Init {
            path: dir.path().to_path_buf(),
            force: false,
            data_dir: "memory_data".into(),
            embeddings_url: "http://localhost:1234".into(),
            model: "nomic".into(),
            no_embeddings: true,
            watch: Vec::new(),
        };
        run(init, &missing, false, &output).await.unwrap();
        assert!(dir.path().join("memoria.toml").exists());

        let validate = Commands::Config { full: false, validate: true };
        assert!(run(validate, &missing, false, &output).await.is_err());
    }

    #[tokio::test]
    async fn test_system_commands_open_the_configured_store() {
        let dir = TempDir::new().unwrap();
        let config = write_config(&dir);
        let output = Output::no_color();

        let remember = Commands::Remember {
            content: "Prefers aisle seats".into(),
            memory_type: Some("preference".into()),
            importance: 6,
            tags: vec!["travel".into()],
        };
        run(remember, &config, false, &output).await.unwrap();
        assert!(dir.path().join("data").join("ai_memories.db").exists());

        let search = |scope: &str| Commands::Search {
            query: "aisle".into(),
            limit: Some(3),
            scope: scope.into(),
            memory_type: None,
            min_importance: None,
            max_importance: None,
            json: true,
        };
        run(search("ai_memories"), &config, false, &output).await.unwrap();
        assert!(run(search("everything"), &config, false, &output).await.is_err());

        let reflect = Commands::Reflect { days: 1_000_000_000, client: None };
        assert!(run(reflect, &config, false, &output).await.is_err());
    }
}
