//! Periodic scan driver.
//!
//! One long-running task reads the config each iteration: disabled means
//! re-check in 30 s, enabled means scan then sleep for the configured
//! interval. `restart` tears the task down (cancelling an in-flight scan at
//! its next chunk boundary) and starts a fresh one; callers invoke it after
//! config changes that touch the auto-scan fields.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use linkarr_config::ConfigStore;
use linkarr_model::AutoScanStatus;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::engine::IngestionEngine;
use crate::error::CoreError;

const DISABLED_RECHECK: Duration = Duration::from_secs(30);
const ERROR_BACKOFF: Duration = Duration::from_secs(60);

#[derive(Debug, Default, Clone, Copy)]
struct ScanTimes {
    last_scan: Option<DateTime<Utc>>,
    next_scan: Option<DateTime<Utc>>,
}

#[derive(Debug)]
struct DriverTask {
    handle: JoinHandle<()>,
    cancel: CancellationToken,
}

/// Restartable timer around [`IngestionEngine::scan`].
#[derive(Debug)]
pub struct AutoScanner {
    config: Arc<ConfigStore>,
    engine: Arc<IngestionEngine>,
    task: Mutex<Option<DriverTask>>,
    times: Arc<RwLock<ScanTimes>>,
}

impl AutoScanner {
    pub fn new(config: Arc<ConfigStore>, engine: Arc<IngestionEngine>) -> Self {
        Self {
            config,
            engine,
            task: Mutex::new(None),
            times: Arc::new(RwLock::new(ScanTimes::default())),
        }
    }

    pub async fn status(&self) -> AutoScanStatus {
        let config = self.config.load();
        let times = *self.times.read().await;
        let running = self
            .task
            .lock()
            .await
            .as_ref()
            .is_some_and(|task| !task.handle.is_finished());
        AutoScanStatus {
            enabled: config.auto_scan_enabled,
            interval: config.auto_scan_interval,
            unit: config.auto_scan_unit,
            running,
            last_scan: times.last_scan,
            next_scan: times.next_scan,
        }
    }

    pub async fn start(&self) {
        let mut task = self.task.lock().await;
        if task.as_ref().is_some_and(|task| !task.handle.is_finished()) {
            info!("auto-scanner already running");
            return;
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_loop(
            Arc::clone(&self.config),
            Arc::clone(&self.engine),
            Arc::clone(&self.times),
            cancel.clone(),
        ));
        *task = Some(DriverTask { handle, cancel });
        info!("auto-scanner started");
    }

    pub async fn stop(&self) {
        let mut task = self.task.lock().await;
        if let Some(task) = task.take() {
            task.cancel.cancel();
            task.handle.abort();
            let _ = task.handle.await;
        }
        self.times.write().await.next_scan = None;
        info!("auto-scanner stopped");
    }

    /// Tear down and respawn; used after auto-scan config changes.
    pub async fn restart(&self) {
        self.stop().await;
        self.start().await;
    }
}

async fn run_loop(
    config: Arc<ConfigStore>,
    engine: Arc<IngestionEngine>,
    times: Arc<RwLock<ScanTimes>>,
    cancel: CancellationToken,
) {
    loop {
        if cancel.is_cancelled() {
            break;
        }
        let document = config.load();

        if !document.auto_scan_enabled {
            times.write().await.next_scan = None;
            if sleep_or_cancel(DISABLED_RECHECK, &cancel).await {
                break;
            }
            continue;
        }

        let interval_seconds = document.auto_scan_interval_seconds();
        if interval_seconds == 0 {
            // Interval 0 is disabled-in-practice; keep re-checking.
            times.write().await.next_scan = None;
            if sleep_or_cancel(DISABLED_RECHECK, &cancel).await {
                break;
            }
            continue;
        }

        info!("auto-scan: starting scheduled scan");
        match engine.scan_with_cancel(None, cancel.child_token()).await {
            Ok(_) => {
                times.write().await.last_scan = Some(Utc::now());
                info!("auto-scan: scan finished");
            }
            Err(CoreError::ScanInProgress) => {
                info!("auto-scan: skipped, a scan is already running");
            }
            Err(err) => {
                error!(%err, "auto-scan: scan failed");
                if sleep_or_cancel(ERROR_BACKOFF, &cancel).await {
                    break;
                }
                continue;
            }
        }

        times.write().await.next_scan =
            Some(Utc::now() + chrono::Duration::seconds(interval_seconds as i64));
        if sleep_or_cancel(Duration::from_secs(interval_seconds), &cancel).await {
            break;
        }
    }
}

/// Sleep for `duration`, returning true when cancelled instead.
async fn sleep_or_cancel(duration: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => true,
        _ = tokio::time::sleep(duration) => false,
    }
}
