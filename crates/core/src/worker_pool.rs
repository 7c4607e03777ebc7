use mediasoup::worker::{Worker, WorkerSettings};
use mediasoup::worker_manager::WorkerManager;
use sfu_config::SfuSettings;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{error, info};

/// Grace period between a worker death and the fail-fast process exit, so a
/// supervisor has time to observe the log line before the process is gone.
const DEATH_GRACE: Duration = Duration::from_secs(2);

/// Pool of mediasoup workers with round-robin selection.
///
/// Media workers carry non-reconstructible RTP state; on death this pool
/// schedules a process exit rather than attempting in-place recovery.
pub struct WorkerPool {
    workers: Vec<Worker>,
    next: AtomicUsize,
}

impl WorkerPool {
    /// Creates a pool of mediasoup workers based on settings.
    pub async fn new(settings: &SfuSettings) -> anyhow::Result<Self> {
        let worker_manager = WorkerManager::new();
        let mut workers = Vec::with_capacity(settings.num_workers as usize);

        for i in 0..settings.num_workers {
            let mut worker_settings = WorkerSettings::default();
            worker_settings.rtc_port_range = settings.rtc_min_port..=settings.rtc_max_port;

            let worker = worker_manager
                .create_worker(worker_settings)
                .await
                .map_err(|e| anyhow::anyhow!("failed to create mediasoup worker {}: {}", i, e))?;

            let worker_id = worker.id();
            worker
                .on_dead(move |reason| {
                    error!(?reason, %worker_id, "mediasoup worker died, exiting process");
                    tokio::spawn(async move {
                        tokio::time::sleep(DEATH_GRACE).await;
                        std::process::exit(1);
                    });
                })
                .detach();

            info!(worker_id = %worker.id(), "mediasoup worker {} created", i);
            workers.push(worker);
        }

        Ok(Self {
            workers,
            next: AtomicUsize::new(0),
        })
    }

    /// Returns the next worker using round-robin selection.
    pub fn next_worker(&self) -> &Worker {
        let idx = self.next.fetch_add(1, Ordering::Relaxed) % self.workers.len();
        &self.workers[idx]
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }
}
