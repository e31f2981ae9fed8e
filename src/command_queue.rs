//! Queue of download jobs handed from caller threads to the event loop.
//!
//! Jobs are picked up in the order they were submitted. Every job runs as
//! its own task on the loop so that downloads interleave; its result goes
//! to the completion callback first, then to the waiting caller.

use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::download::{DownloadRequest, Downloaded};
use crate::error::Result;

/// Invoked once on the loop thread with the outcome of a download.
pub type CompletionCallback = Box<dyn FnOnce(&Result<Downloaded>) + Send + 'static>;

/// Sending half of the one-shot result channel of a caller.
pub type ResultSender = std::sync::mpsc::Sender<Result<Downloaded>>;

/// Runs one download on the loop.
pub type JobProcessor =
    Arc<dyn Fn(DownloadRequest) -> BoxFuture<'static, Result<Downloaded>> + Send + Sync>;

/// A download submitted to the loop.
pub struct DownloadJob {
    pub request: DownloadRequest,
    pub callback: Option<CompletionCallback>,
    pub reply: Option<ResultSender>,
}

impl DownloadJob {
    fn complete(self, result: Result<Downloaded>) {
        if let Some(callback) = self.callback {
            callback(&result);
        }
        if let Some(reply) = self.reply {
            if reply.send(result).is_err() {
                trace!("nobody waits for the result of {}", self.request);
            }
        }
    }
}

/// Submitting side of the job queue.
///
/// Cloning yields another handle to the same queue; the worker ends once
/// every handle is dropped.
#[derive(Clone)]
pub struct CommandQueue {
    command_sender: mpsc::UnboundedSender<DownloadJob>,
}

impl CommandQueue {
    /// Creates the queue and starts its worker on the current runtime.
    ///
    /// The returned handle completes once the queue is closed. Jobs still
    /// running at that point keep running until the runtime shuts down.
    pub fn new(processor: JobProcessor) -> (Self, JoinHandle<()>) {
        let (command_sender, mut command_receiver) = mpsc::unbounded_channel::<DownloadJob>();

        let worker = tokio::spawn(async move {
            while let Some(job) = command_receiver.recv().await {
                trace!("starting job {}", job.request);
                let download = processor(job.request.clone());
                tokio::spawn(async move {
                    let result = download.await;
                    job.complete(result);
                });
            }
            debug!("command queue closed");
        });

        (Self { command_sender }, worker)
    }

    /// Submits a job. Fails when the worker is gone, handing the job back.
    pub fn submit(&self, job: DownloadJob) -> std::result::Result<(), DownloadJob> {
        self.command_sender.send(job).map_err(|e| e.0)
    }
}
