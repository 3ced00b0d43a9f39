use anyhow::anyhow;
use shelf_core::{Article, Error, Result};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use uuid::Uuid;

use crate::logging::Logger;
use crate::processor::ArticleProcessor;

struct Job {
    article_id: Uuid,
    done: oneshot::Sender<Result<Article>>,
}

/// Handle on one queued extraction. Dropping it does not cancel the work.
#[derive(Debug)]
pub struct ExtractionTicket {
    article_id: Uuid,
    receiver: oneshot::Receiver<Result<Article>>,
}

impl ExtractionTicket {
    pub fn article_id(&self) -> Uuid {
        self.article_id
    }

    /// Wait for the extraction outcome
    pub async fn wait(self) -> Result<Article> {
        self.receiver
            .await
            .map_err(|_| Error::External(anyhow!("extraction of article {} was abandoned", self.article_id)))?
    }
}

/// Queue feeding metadata extraction to a background worker.
///
/// At most `concurrency` extractions run at once; `shutdown` stops accepting work
/// and waits for everything already queued.
pub struct ArticlePipeline {
    sender: Mutex<Option<mpsc::UnboundedSender<Job>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ArticlePipeline {
    pub fn start(processor: Arc<ArticleProcessor>, concurrency: usize) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
        let logger = Logger::new().with_prefix("[pipeline]");
        let worker = tokio::spawn(run_worker(processor, receiver, semaphore, logger));

        Self {
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
        }
    }

    pub async fn submit(&self, article_id: Uuid) -> Result<ExtractionTicket> {
        let (done, receiver) = oneshot::channel();
        let sender = self.sender.lock().await;
        let sender = sender
            .as_ref()
            .ok_or_else(|| Error::External(anyhow!("article pipeline is shut down")))?;
        sender
            .send(Job { article_id, done })
            .map_err(|_| Error::External(anyhow!("article pipeline worker has stopped")))?;

        Ok(ExtractionTicket { article_id, receiver })
    }

    pub async fn shutdown(&self) -> Result<()> {
        // Dropping the sender closes the queue once it drains
        self.sender.lock().await.take();
        if let Some(worker) = self.worker.lock().await.take() {
            worker.await.map_err(|e| Error::External(e.into()))?;
        }
        Ok(())
    }
}

async fn run_worker(
    processor: Arc<ArticleProcessor>,
    mut receiver: mpsc::UnboundedReceiver<Job>,
    semaphore: Arc<Semaphore>,
    logger: Logger,
) {
    let mut tasks = JoinSet::new();
    logger.debug("Worker started");

    loop {
        tokio::select! {
            job = receiver.recv() => {
                let Some(job) = job else { break };
                let Ok(permit) = semaphore.clone().acquire_owned().await else { break };
                let processor = processor.clone();
                let logger = logger.clone();
                tasks.spawn(async move {
                    let _permit = permit;
                    let result = processor.extract_metadata(job.article_id).await;
                    if let Err(e) = &result {
                        logger.warn(&format!("Extraction for {} failed: {}", job.article_id, e));
                    }
                    // The submitter may have dropped its ticket
                    let _ = job.done.send(result);
                });
            }
            Some(finished) = tasks.join_next(), if !tasks.is_empty() => {
                if let Err(e) = finished {
                    logger.error(&format!("Extraction task panicked: {}", e));
                }
            }
        }
    }

    while let Some(finished) = tasks.join_next().await {
        if let Err(e) = finished {
            logger.error(&format!("Extraction task panicked: {}", e));
        }
    }
    logger.debug("Worker stopped");
}
