//! Task runner collaborator.

use super::job::{Job, JobId};
use crate::error::{Result, SearchError};
use async_trait::async_trait;
use esutils_log::debug;
use tokio::sync::mpsc;

/// Accepts jobs for asynchronous execution.
///
/// Delivery is at least once and jobs may run in any order, so every job
/// body must be safe to run again.
#[async_trait]
pub trait TaskRunner: Send + Sync {
    /// Submit a job without waiting for it to run.
    async fn enqueue(&self, job: Job) -> Result<JobId>;
}

/// A task runner backed by an in-process channel.
///
/// Jobs are consumed by an [`IndexWorker`](super::IndexWorker) holding the
/// receiving end.
#[derive(Debug, Clone)]
pub struct ChannelTaskRunner {
    sender: mpsc::UnboundedSender<Job>,
}

impl ChannelTaskRunner {
    /// Create a runner and the receiver its jobs arrive on.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Job>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    pub(crate) fn downgrade(&self) -> mpsc::WeakUnboundedSender<Job> {
        self.sender.downgrade()
    }
}

#[async_trait]
impl TaskRunner for ChannelTaskRunner {
    async fn enqueue(&self, job: Job) -> Result<JobId> {
        let id = job.id;
        debug!("Enqueueing job {} (type: {})", id, job.job_type);

        self.sender
            .send(job)
            .map_err(|_| SearchError::Queue("task channel is closed".to_string()))?;
        Ok(id)
    }
}
