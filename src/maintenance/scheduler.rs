use super::{DatabaseMaintenance, MaintenanceReport};
use crate::utils::toml_config::ConfigManager;
use parking_lot::Mutex;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Periodic maintenance in a background task.
///
/// Intervals are read from `[maintenance]` before every sleep, so a config
/// reload takes effect after the current wait.
pub struct AutoMaintenance {
    maintenance: DatabaseMaintenance,
    config: ConfigManager,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl AutoMaintenance {
    pub fn new(maintenance: DatabaseMaintenance, config: ConfigManager) -> Self {
        Self {
            maintenance,
            config,
            task: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .map(|t| !t.is_finished())
            .unwrap_or(false)
    }

    /// Spawn the maintenance loop. Calling `start` twice is a no-op.
    pub fn start(&self) {
        let mut task = self.task.lock();
        if task.as_ref().map(|t| !t.is_finished()).unwrap_or(false) {
            return;
        }

        let maintenance = self.maintenance.clone();
        let config = self.config.clone();
        *task = Some(tokio::spawn(async move {
            let initial_delay = config.config().maintenance.initial_delay_secs;
            info!(initial_delay_secs = initial_delay, "Automatic maintenance scheduled");
            tokio::time::sleep(Duration::from_secs(initial_delay)).await;

            loop {
                let report = maintenance.run_maintenance(false).await;
                let settings = config.config().maintenance.clone();
                let wait = match report.error {
                    Some(ref e) => {
                        warn!(
                            retry_in_secs = settings.retry_delay_secs,
                            "Automatic maintenance failed: {}", e
                        );
                        Duration::from_secs(settings.retry_delay_secs)
                    }
                    None => {
                        log_summary(&report);
                        Duration::from_secs(settings.interval_hours.max(1) * 3600)
                    }
                };
                tokio::time::sleep(wait).await;
            }
        }));
    }

    pub fn stop(&self) {
        if let Some(task) = self.task.lock().take() {
            task.abort();
            info!("Automatic maintenance stopped");
        }
    }

    /// Run one forced pass now, independent of the schedule.
    pub async fn run_once(&self) -> MaintenanceReport {
        let report = self.maintenance.run_maintenance(true).await;
        log_summary(&report);
        report
    }
}

impl Drop for AutoMaintenance {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().take() {
            task.abort();
        }
    }
}

fn log_summary(report: &MaintenanceReport) {
    if report.skipped {
        info!("Maintenance skipped: {}", report.reason.as_deref().unwrap_or("recently run"));
        return;
    }
    info!(
        space_saved_mb = report.total_space_saved_mb(),
        items_cleaned = report.items_cleaned(),
        schema_upgrades = report.schema_upgrades.len(),
        "Maintenance summary"
    );
}
