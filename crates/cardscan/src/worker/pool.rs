use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender};
use log::{debug, error, info};

use crate::error::WorkerError;
use crate::pipeline::{Pipeline, ProgressReporter};
use crate::worker::job::{IngestJob, IngestJobResult};

/// Fixed set of threads sharing one pipeline.
pub struct WorkerPool {
    job_sender: Sender<IngestJob>,
    result_receiver: Receiver<IngestJobResult>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new(
        pipeline: Arc<Pipeline>,
        progress: Arc<dyn ProgressReporter>,
        worker_count: usize,
    ) -> Result<Self, WorkerError> {
        if worker_count == 0 {
            return Err(WorkerError::SpawnFailed(
                "worker_count must be > 0".to_string(),
            ));
        }

        let (job_sender, job_receiver) = bounded::<IngestJob>(worker_count * 2);
        let (result_sender, result_receiver) = bounded::<IngestJobResult>(worker_count * 2);

        let mut workers = Vec::with_capacity(worker_count);

        for worker_id in 0..worker_count {
            let job_rx = job_receiver.clone();
            let result_tx = result_sender.clone();
            let worker_pipeline = Arc::clone(&pipeline);
            let worker_progress = Arc::clone(&progress);

            let handle = thread::Builder::new()
                .name(format!("cardscan-worker-{}", worker_id))
                .spawn(move || {
                    run_worker(worker_id, job_rx, result_tx, worker_pipeline, worker_progress);
                })
                .map_err(|e| WorkerError::SpawnFailed(e.to_string()))?;

            workers.push(handle);
        }

        info!("Started {} workers", worker_count);

        Ok(Self {
            job_sender,
            result_receiver,
            workers,
        })
    }

    /// Submits every job and collects one result per job, in completion order.
    ///
    /// Jobs are fed from a separate thread so the bounded channels cannot
    /// deadlock when there are more jobs than channel capacity. The feeder
    /// owns the only job sender; once it is done, workers drain the queue and
    /// exit, which closes the result channel. A job whose worker panicked
    /// yields no result, so the returned list can be shorter than `jobs`.
    pub fn run_batch(self, jobs: Vec<IngestJob>) -> Vec<IngestJobResult> {
        let WorkerPool {
            job_sender,
            result_receiver,
            workers,
        } = self;

        let expected = jobs.len();
        let feeder = thread::spawn(move || {
            for job in jobs {
                if job_sender.send(job).is_err() {
                    break;
                }
            }
        });

        let mut results = Vec::with_capacity(expected);
        while results.len() < expected {
            match result_receiver.recv() {
                Ok(result) => results.push(result),
                Err(_) => break,
            }
        }

        if feeder.join().is_err() {
            error!("Job feeder panicked");
        }
        join_workers(workers);

        if results.len() < expected {
            error!(
                "{} of {} jobs produced no result",
                expected - results.len(),
                expected
            );
        }
        results
    }
}

fn join_workers(workers: Vec<JoinHandle<()>>) {
    for (i, worker) in workers.into_iter().enumerate() {
        if let Err(e) = worker.join() {
            error!("Worker {} panicked: {:?}", i, e);
        } else {
            debug!("Worker {} finished", i);
        }
    }

    info!("All workers have stopped");
}

fn run_worker(
    worker_id: usize,
    job_receiver: Receiver<IngestJob>,
    result_sender: Sender<IngestJobResult>,
    pipeline: Arc<Pipeline>,
    progress: Arc<dyn ProgressReporter>,
) {
    debug!("Worker {} started", worker_id);

    // Ends once every job sender is gone and the queue is empty.
    for job in job_receiver.iter() {
        debug!("Worker {} processing job {}", worker_id, job.id);

        let result = match pipeline.ingest(
            &job.source_path,
            &job.original_name,
            &job.owner,
            progress.as_ref(),
        ) {
            Ok(outcome) => IngestJobResult::success(&job, outcome),
            Err(failure) => IngestJobResult::failure(&job, &failure),
        };

        if let Err(e) = result_sender.send(result) {
            error!("Worker {} failed to send result: {}", worker_id, e);
            break;
        }
    }

    debug!("Worker {} stopped", worker_id);
}
