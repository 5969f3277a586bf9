use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::config::SchedulerConfig;
use crate::monitor::{CycleOutcome, ScanMonitor};
use crate::utils::error::{AppError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanStats {
    pub cycles_started: u64,
    /// Cycles suppressed because the previous one was still running.
    pub cycles_skipped: u64,
    pub cycles_failed: u64,
    pub products_checked: u64,
    pub alerts_sent: u64,
    pub products_skipped: u64,
    pub products_failed: u64,
    pub last_cycle_started: Option<DateTime<Utc>>,
    pub uptime_seconds: u64,
}

/// Fires a full scan cycle on a fixed period. A cycle that fires while the
/// previous one is still running is skipped, and every cycle runs under a
/// supervisor handle that shutdown can abort.
pub struct ScanScheduler {
    scheduler: JobScheduler,
    monitor: Arc<ScanMonitor>,
    config: SchedulerConfig,
    in_progress: Arc<AtomicBool>,
    stats: Arc<Mutex<ScanStats>>,
    running_cycles: Arc<Mutex<Vec<tokio::task::JoinHandle<()>>>>,
    start_time: DateTime<Utc>,
}

impl ScanScheduler {
    pub async fn new(monitor: Arc<ScanMonitor>, config: SchedulerConfig) -> Result<Self> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| AppError::Internal(format!("Scheduler setup failed: {}", e)))?;

        Ok(Self {
            scheduler,
            monitor,
            config,
            in_progress: Arc::new(AtomicBool::new(false)),
            stats: Arc::new(Mutex::new(ScanStats::default())),
            running_cycles: Arc::new(Mutex::new(Vec::new())),
            start_time: Utc::now(),
        })
    }

    pub async fn start(&mut self) -> Result<()> {
        let interval = Duration::from_secs(self.config.scan_interval_minutes * 60);

        let monitor = Arc::clone(&self.monitor);
        let in_progress = Arc::clone(&self.in_progress);
        let stats = Arc::clone(&self.stats);
        let running_cycles = Arc::clone(&self.running_cycles);

        let job = Job::new_repeated_async(interval, move |_uuid, _lock| {
            let monitor = Arc::clone(&monitor);
            let in_progress = Arc::clone(&in_progress);
            let stats = Arc::clone(&stats);
            let running_cycles = Arc::clone(&running_cycles);

            Box::pin(async move {
                Self::fire(monitor, in_progress, stats, running_cycles).await;
            })
        })
        .map_err(|e| AppError::Internal(format!("Failed to build scan job: {}", e)))?;

        self.scheduler
            .add(job)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to add scan job: {}", e)))?;
        self.scheduler
            .start()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to start scheduler: {}", e)))?;

        tracing::info!(
            "Scan scheduler started, interval: {} minutes",
            self.config.scan_interval_minutes
        );
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<()> {
        // Abort in-flight cycles so outstanding fetches and sleeps die cleanly,
        // and wait until they are gone before stopping the timer.
        let handles: Vec<_> = self.running_cycles.lock().await.drain(..).collect();
        for handle in &handles {
            handle.abort();
        }
        let _ = futures::future::join_all(handles).await;

        self.scheduler
            .shutdown()
            .await
            .map_err(|e| AppError::Internal(format!("Scheduler shutdown failed: {}", e)))?;
        tracing::info!("Scan scheduler shutdown");
        Ok(())
    }

    /// Run one cycle immediately, outside the timer. Respects the same
    /// overlap suppression as timed cycles.
    pub async fn run_cycle_now(&self) -> Result<CycleOutcome> {
        if self
            .in_progress
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(AppError::Internal("A scan cycle is already running".to_string()));
        }

        {
            let mut stats = self.stats.lock().await;
            stats.cycles_started += 1;
            stats.last_cycle_started = Some(Utc::now());
        }

        let result = self.monitor.run_cycle().await;
        self.in_progress.store(false, Ordering::SeqCst);

        match result {
            Ok(outcome) => {
                Self::record_outcome(&self.stats, &outcome).await;
                Ok(outcome)
            }
            Err(e) => {
                self.stats.lock().await.cycles_failed += 1;
                Err(e)
            }
        }
    }

    pub async fn stats(&self) -> ScanStats {
        let mut snapshot = self.stats.lock().await.clone();
        let uptime = Utc::now().signed_duration_since(self.start_time);
        snapshot.uptime_seconds = uptime.num_seconds().max(0) as u64;
        snapshot
    }

    pub fn is_cycle_running(&self) -> bool {
        self.in_progress.load(Ordering::SeqCst)
    }

    async fn fire(
        monitor: Arc<ScanMonitor>,
        in_progress: Arc<AtomicBool>,
        stats: Arc<Mutex<ScanStats>>,
        running_cycles: Arc<Mutex<Vec<tokio::task::JoinHandle<()>>>>,
    ) {
        if in_progress
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::warn!("Previous scan cycle still running, skipping this one");
            stats.lock().await.cycles_skipped += 1;
            return;
        }

        {
            let mut stats = stats.lock().await;
            stats.cycles_started += 1;
            stats.last_cycle_started = Some(Utc::now());
        }

        tracing::info!("Running scheduled price scan");

        let stats_for_cycle = Arc::clone(&stats);
        let handle = tokio::spawn(async move {
            match monitor.run_cycle().await {
                Ok(outcome) => {
                    tracing::info!(
                        "Scan cycle complete: {} domains, {} checked, {} alerts",
                        outcome.domains,
                        outcome.checked,
                        outcome.alerts
                    );
                    Self::record_outcome(&stats_for_cycle, &outcome).await;
                }
                Err(e) => {
                    tracing::error!("Scan cycle failed: {}", e);
                    stats_for_cycle.lock().await.cycles_failed += 1;
                }
            }
            in_progress.store(false, Ordering::SeqCst);
        });

        let mut cycles = running_cycles.lock().await;
        cycles.retain(|h| !h.is_finished());
        cycles.push(handle);
    }

    async fn record_outcome(stats: &Arc<Mutex<ScanStats>>, outcome: &CycleOutcome) {
        let mut stats = stats.lock().await;
        stats.products_checked += outcome.checked as u64;
        stats.alerts_sent += outcome.alerts as u64;
        stats.products_skipped += outcome.skipped as u64;
        stats.products_failed += outcome.failed as u64;
    }
}
