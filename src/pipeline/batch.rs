//! Batch orchestration over a discovered job list.
//!
//! Dispatch has two modes chosen by `workers`: a sequential loop that
//! preserves enumeration order, and a bounded pool of exactly `workers`
//! tasks pulling from a shared job queue. Delivery likewise has two
//! modes: collect everything, or stream each output path as its job
//! completes. One job's failure never stops the rest of the batch.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};

use super::convert::ConversionPipeline;
use super::discovery::discover_jobs;
use crate::error::{ConvertError, Result};
use crate::formats::CapabilitySet;
use crate::types::{BatchOptions, ConversionJob, ConversionResult, ProgressCallback};

/// Collected outcome of a batch run.
#[derive(Debug, Default)]
pub struct BatchOutput {
    /// One result per dispatched job. Sequential runs keep enumeration
    /// order; pooled runs are in completion order.
    pub results: Vec<ConversionResult>,
}

impl BatchOutput {
    /// Paths of the successfully written outputs.
    pub fn converted(&self) -> Vec<&Path> {
        self.results
            .iter()
            .filter_map(|r| match r {
                ConversionResult::Success { output, .. } => Some(output.path.as_path()),
                ConversionResult::Failure { .. } => None,
            })
            .collect()
    }

    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }
}

/// Runs a directory batch through the conversion pipeline.
#[derive(Clone)]
pub struct BatchOrchestrator {
    pipeline: ConversionPipeline,
}

impl BatchOrchestrator {
    pub fn new(pipeline: ConversionPipeline) -> Self {
        Self { pipeline }
    }

    /// Convert a directory tree and collect every result.
    pub async fn run(
        &self,
        input_root: &Path,
        output_root: &Path,
        options: &BatchOptions,
        progress: Option<ProgressCallback>,
    ) -> Result<BatchOutput> {
        let jobs = self.prepare(input_root, output_root, options)?;
        let total = jobs.len();
        let (tx, mut rx) = mpsc::channel(total.max(1));

        let driver = tokio::spawn(dispatch(
            self.pipeline.clone(),
            jobs,
            options.workers,
            progress,
            tx,
        ));

        let mut output = BatchOutput::default();
        while let Some(result) = rx.recv().await {
            if let ConversionResult::Failure {
                source, error, ..
            } = &result
            {
                tracing::error!(
                    source = %source.path.display(),
                    error = %error,
                    "conversion failed"
                );
            }
            output.results.push(result);
        }
        // The driver only ends after all workers have; surface panics.
        driver
            .await
            .map_err(|e| ConvertError::Codec {
                path: input_root.to_path_buf(),
                message: format!("batch driver aborted: {e}"),
            })?;

        tracing::info!(
            total,
            succeeded = output.succeeded(),
            failed = output.failed(),
            "batch complete"
        );
        Ok(output)
    }

    /// Convert a directory tree, streaming each successful output path as
    /// its job completes.
    ///
    /// Dropping the receiver early does not cancel in-flight jobs; they
    /// finish and their delivery is discarded.
    pub async fn run_streaming(
        &self,
        input_root: &Path,
        output_root: &Path,
        options: &BatchOptions,
        progress: Option<ProgressCallback>,
    ) -> Result<mpsc::Receiver<PathBuf>> {
        let jobs = self.prepare(input_root, output_root, options)?;
        let (result_tx, mut result_rx) = mpsc::channel(jobs.len().max(1));
        let (path_tx, path_rx) = mpsc::channel(jobs.len().max(1));

        tokio::spawn(dispatch(
            self.pipeline.clone(),
            jobs,
            options.workers,
            progress,
            result_tx,
        ));
        tokio::spawn(async move {
            while let Some(result) = result_rx.recv().await {
                match result {
                    ConversionResult::Success { output, .. } => {
                        // Receiver gone: keep draining so workers finish.
                        let _ = path_tx.send(output.path).await;
                    }
                    ConversionResult::Failure { source, error, .. } => {
                        tracing::error!(
                            source = %source.path.display(),
                            error = %error,
                            "conversion failed"
                        );
                    }
                }
            }
        });

        Ok(path_rx)
    }

    /// Validate batch options and build the job list eagerly.
    fn prepare(
        &self,
        input_root: &Path,
        output_root: &Path,
        options: &BatchOptions,
    ) -> Result<Vec<ConversionJob>> {
        if let Some(format) = options.output_format {
            if format.is_source_only() {
                return Err(ConvertError::Unimplemented { format });
            }
            if !self.pipeline.registry().is_supported(format) {
                return Err(ConvertError::CodecUnavailable {
                    format,
                    hint: CapabilitySet::hint_for(format).to_string(),
                });
            }
        }
        discover_jobs(input_root, output_root, options, self.pipeline.registry())
    }
}

/// Run the job list to completion, sending one result per job.
async fn dispatch(
    pipeline: ConversionPipeline,
    jobs: Vec<ConversionJob>,
    workers: usize,
    progress: Option<ProgressCallback>,
    results: mpsc::Sender<ConversionResult>,
) {
    if workers <= 1 {
        for job in jobs {
            let result = pipeline.execute_job(job).await;
            report(&progress, &result);
            if results.send(result).await.is_err() {
                break;
            }
        }
        return;
    }

    let (job_tx, job_rx) = mpsc::channel::<ConversionJob>(workers);
    let job_rx = Arc::new(Mutex::new(job_rx));

    let mut handles = Vec::with_capacity(workers);
    for _ in 0..workers {
        let pipeline = pipeline.clone();
        let job_rx = Arc::clone(&job_rx);
        let results = results.clone();
        let progress = progress.clone();

        handles.push(tokio::spawn(async move {
            loop {
                // Hold the lock only while pulling the next job.
                let job = { job_rx.lock().await.recv().await };
                let Some(job) = job else { break };

                let result = pipeline.execute_job(job).await;
                report(&progress, &result);
                let _ = results.send(result).await;
            }
        }));
    }
    drop(results);

    for job in jobs {
        if job_tx.send(job).await.is_err() {
            break;
        }
    }
    drop(job_tx);

    for handle in handles {
        let _ = handle.await;
    }
}

/// Invoke the progress callback exactly once for a finished job, always
/// as (source, destination, error-or-none).
fn report(progress: &Option<ProgressCallback>, result: &ConversionResult) {
    let Some(callback) = progress else { return };
    match result {
        ConversionResult::Success { source, output } => {
            callback(&source.path, &output.path, None);
        }
        ConversionResult::Failure {
            source,
            dest,
            error,
        } => {
            callback(&source.path, &dest.path, Some(error));
        }
    }
}
