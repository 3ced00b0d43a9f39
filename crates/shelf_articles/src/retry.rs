use async_trait::async_trait;
use shelf_core::{Error, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::logging::Logger;

/// A unit of periodic work
#[async_trait]
pub trait RetryJob: Send + Sync {
    fn name(&self) -> &str;
    async fn run(&self) -> Result<()>;
}

struct Running {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Runs a job every `interval` until stopped. The first run happens one interval after start.
pub struct RetryWorker {
    job: Arc<dyn RetryJob>,
    interval: Duration,
    running: Mutex<Option<Running>>,
    logger: Logger,
}

impl RetryWorker {
    pub fn new(job: Arc<dyn RetryJob>, interval: Duration) -> Result<Self> {
        if interval.is_zero() {
            return Err(Error::InvalidInput("retry interval must be positive".to_string()));
        }
        let logger = Logger::new()
            .with_prefix("[retry-worker]")
            .with_prefix(format!("[{}]", job.name()));
        Ok(Self {
            job,
            interval,
            running: Mutex::new(None),
            logger,
        })
    }

    pub async fn start(&self) -> Result<()> {
        let mut running = self.running.lock().await;
        if running.is_some() {
            return Err(Error::InvalidInput(format!("worker {} is already running", self.job.name())));
        }

        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let job = self.job.clone();
        let interval = self.interval;
        let logger = self.logger.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    biased;
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        logger.debug("Running scheduled job");
                        tokio::select! {
                            biased;
                            _ = shutdown_rx.changed() => {
                                logger.info("Shutdown requested, abandoning in-flight run");
                                break;
                            }
                            outcome = job.run() => match outcome {
                                Ok(()) => logger.debug("Scheduled job completed"),
                                Err(e) => logger.error(&format!("Scheduled job failed: {}", e)),
                            },
                        }
                    }
                }
            }
        });

        self.logger.info(&format!("Started (every {:?})", self.interval));
        *running = Some(Running { shutdown, handle });
        Ok(())
    }

    /// Signal the loop and wait for it to exit; an in-flight run is cancelled
    pub async fn stop(&self) -> Result<()> {
        let Some(Running { shutdown, handle }) = self.running.lock().await.take() else {
            return Ok(());
        };
        let _ = shutdown.send(true);
        handle.await.map_err(|e| Error::External(e.into()))?;
        self.logger.info("Stopped");
        Ok(())
    }

    pub async fn is_running(&self) -> bool {
        self.running
            .lock()
            .await
            .as_ref()
            .is_some_and(|running| !running.handle.is_finished())
    }
}
