//! Periodic scans, one job per monitor

use domain_intake::{Monitor, ScanReport, Scanner};
use eyre::{Result, WrapErr};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{info, warn};

/// A monitor bound to the scanner for its store, with a single-flight guard
#[derive(Clone)]
pub struct MonitorJob {
    scanner: Scanner,
    monitor: Monitor,
    running: Arc<Mutex<()>>,
}

impl MonitorJob {
    pub fn new(scanner: Scanner, monitor: Monitor) -> Self {
        Self {
            scanner,
            monitor,
            running: Arc::new(Mutex::new(())),
        }
    }

    pub fn monitor(&self) -> &Monitor {
        &self.monitor
    }

    /// Scan once, unless the previous scan of this monitor is still running
    pub async fn run_once(&self) -> Option<ScanReport> {
        let Ok(_running) = self.running.try_lock() else {
            warn!(monitor = %self.monitor.kind, "Previous scan still running, skipping tick");
            return None;
        };
        Some(self.scanner.scan(&self.monitor).await)
    }
}

/// Register a repeated job per monitor and start the scheduler.
///
/// Every monitor is scanned once right away, before the first interval elapses.
pub async fn start_scheduler(jobs: Vec<MonitorJob>) -> Result<JobScheduler> {
    let sched = JobScheduler::new()
        .await
        .wrap_err("Failed to create job scheduler")?;

    for job in &jobs {
        let interval = job.monitor().interval;
        let scheduled = job.clone();

        let cron_job = Job::new_repeated_async(interval, move |_uuid, _lock| {
            let job = scheduled.clone();
            Box::pin(async move {
                job.run_once().await;
            })
        })
        .wrap_err_with(|| format!("Failed to create job for {}", job.monitor().kind))?;

        sched
            .add(cron_job)
            .await
            .wrap_err_with(|| format!("Failed to register job for {}", job.monitor().kind))?;

        info!(
            monitor = %job.monitor().kind,
            collection = %job.monitor().collection,
            interval_secs = interval.as_secs(),
            "Monitor scheduled"
        );
    }

    sched.start().await.wrap_err("Failed to start scheduler")?;

    for job in jobs {
        tokio::spawn(async move {
            job.run_once().await;
        });
    }

    Ok(sched)
}
