use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, SendError, Sender};
use log::{debug, error, info, warn};

use crate::error::WorkerError;
use crate::worker::batch::{BatchJob, BatchRunner};

/// Fixed set of OS threads pulling batches off an unbounded queue.
pub struct WorkerPool {
    job_sender: Sender<BatchJob>,
    workers: Vec<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl WorkerPool {
    pub fn new(runner: Arc<BatchRunner>, worker_count: usize) -> Result<Self, WorkerError> {
        let worker_count = worker_count.max(1);
        let (job_sender, job_receiver) = unbounded::<BatchJob>();
        let shutdown = Arc::new(AtomicBool::new(false));

        let mut workers = Vec::with_capacity(worker_count);

        for worker_id in 0..worker_count {
            let job_rx = job_receiver.clone();
            let shutdown_flag = Arc::clone(&shutdown);
            let worker_runner = Arc::clone(&runner);

            let handle = thread::Builder::new()
                .name(format!("docdesk-worker-{}", worker_id))
                .spawn(move || run_worker(worker_id, job_rx, shutdown_flag, worker_runner))
                .map_err(|e| WorkerError::SpawnFailed(e.to_string()))?;

            workers.push(handle);
        }

        info!("Started {} workers", worker_count);

        Ok(Self {
            job_sender,
            workers,
            shutdown,
        })
    }

    /// Queues a batch. A batch that cannot be queued has its job failed
    /// before the error is returned, so no job is left pending forever.
    pub fn submit(&self, job: BatchJob) -> Result<(), WorkerError> {
        if self.shutdown.load(Ordering::Relaxed) {
            return Err(reject(job));
        }

        self.job_sender
            .send(job)
            .map_err(|SendError(job)| reject(job))
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Batches waiting for a free worker.
    pub fn queued(&self) -> usize {
        self.job_sender.len()
    }

    pub fn shutdown(&self) {
        info!("Shutting down worker pool...");
        self.shutdown.store(true, Ordering::Relaxed);
    }

    pub fn wait(self) {
        drop(self.job_sender);

        for (i, worker) in self.workers.into_iter().enumerate() {
            if let Err(e) = worker.join() {
                error!("Worker {} panicked: {:?}", i, e);
            } else {
                debug!("Worker {} finished", i);
            }
        }

        info!("All workers have stopped");
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }
}

fn reject(job: BatchJob) -> WorkerError {
    let err = WorkerError::ChannelClosed;
    warn!("Job {} not queued: {}", job.handle.id(), err);
    job.handle.fail(&err.to_string());
    err
}

fn run_worker(
    worker_id: usize,
    job_receiver: Receiver<BatchJob>,
    shutdown: Arc<AtomicBool>,
    runner: Arc<BatchRunner>,
) {
    debug!("Worker {} started", worker_id);

    loop {
        if shutdown.load(Ordering::Relaxed) {
            debug!("Worker {} received shutdown signal", worker_id);
            break;
        }

        match job_receiver.recv_timeout(Duration::from_millis(100)) {
            Ok(job) => {
                debug!("Worker {} processing job {}", worker_id, job.handle.id());
                runner.run(job);
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                debug!("Worker {} job channel disconnected", worker_id);
                break;
            }
        }
    }

    debug!("Worker {} stopped", worker_id);
}
