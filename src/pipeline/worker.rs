//! Worker pool: evaluate, convert and discard raw pages with bounded parallelism.
//!
//! ## Why a rendezvous queue?
//!
//! Raw pages live on a small ramdisk. If the scanner could run ahead of the
//! workers, pages would pile up until the disk filled. [`JobSender::submit`]
//! therefore returns only once an idle worker has actually taken the job
//! (capacity-zero semantics). Together with the advance handshake this stops
//! the scanner whenever every worker is busy.
//!
//! Decoding and pixel counting are CPU-bound and run on the blocking pool;
//! the compressor is an external process awaited asynchronously.

use crate::error::ScanError;
use crate::pipeline::blank;
use crate::pipeline::store::PageJob;
use crate::progress::ProgressCallback;
use crate::tools::Compressor;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

struct Dispatch {
    job: PageJob,
    taken: oneshot::Sender<()>,
}

/// Create the job queue shared by the results reader and the workers.
pub fn job_queue() -> (JobSender, JobReceiver) {
    let (tx, rx) = mpsc::channel(1);
    (
        JobSender { tx },
        JobReceiver {
            rx: Arc::new(Mutex::new(rx)),
        },
    )
}

/// Producer handle. The queue closes when the last sender is dropped.
#[derive(Clone)]
pub struct JobSender {
    tx: mpsc::Sender<Dispatch>,
}

impl JobSender {
    /// Hand a job to the pool, waiting until a worker has taken it.
    pub async fn submit(&self, job: PageJob) -> Result<(), ScanError> {
        let sequence = job.sequence;
        let (taken, taken_rx) = oneshot::channel();
        self.tx
            .send(Dispatch { job, taken })
            .await
            .map_err(|_| ScanError::QueueClosed { sequence })?;
        taken_rx
            .await
            .map_err(|_| ScanError::QueueClosed { sequence })
    }
}

/// Consumer handle shared by all workers.
#[derive(Clone)]
pub struct JobReceiver {
    rx: Arc<Mutex<mpsc::Receiver<Dispatch>>>,
}

impl JobReceiver {
    /// Take the next job; `None` once the queue is closed and empty.
    pub async fn next(&self) -> Option<PageJob> {
        let dispatch = self.rx.lock().await.recv().await?;
        let _ = dispatch.taken.send(());
        Some(dispatch.job)
    }
}

/// What every worker needs besides its jobs.
pub struct WorkerContext {
    pub compressor: Arc<dyn Compressor>,
    pub dpi: u32,
    pub progress: Option<ProgressCallback>,
}

/// Per-worker tallies returned when the queue closes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub processed: usize,
    pub kept: usize,
    pub discarded: usize,
}

/// Spawn `workers` page workers on a shared queue.
pub fn spawn_workers(
    workers: usize,
    jobs: JobReceiver,
    ctx: Arc<WorkerContext>,
) -> JoinSet<Result<WorkerStats, ScanError>> {
    let mut set = JoinSet::new();
    for id in 0..workers {
        set.spawn(run_worker(id, jobs.clone(), Arc::clone(&ctx)));
    }
    set
}

/// Worker loop: process jobs until the queue closes. The first error ends it.
pub async fn run_worker(
    id: usize,
    jobs: JobReceiver,
    ctx: Arc<WorkerContext>,
) -> Result<WorkerStats, ScanError> {
    let mut stats = WorkerStats::default();

    while let Some(job) = jobs.next().await {
        debug!("worker {}: page {}", id, job.sequence);
        let kept = process_page(&job, &ctx).await?;
        stats.processed += 1;
        if kept {
            stats.kept += 1;
        } else {
            stats.discarded += 1;
        }
    }

    debug!(
        "worker {} done: {} pages, {} kept",
        id, stats.processed, stats.kept
    );
    Ok(stats)
}

/// Evaluate one page, convert it if it carries content, delete the raw file.
///
/// Returns whether the page was kept.
pub async fn process_page(job: &PageJob, ctx: &WorkerContext) -> Result<bool, ScanError> {
    let source = job.source_path.clone();
    let dark_ratio = tokio::task::spawn_blocking(move || {
        blank::decode_page(&source).map(|img| blank::dark_ratio(&img))
    })
    .await
    .map_err(|e| ScanError::Internal(format!("page evaluation task panicked: {e}")))??;

    let keep = blank::is_content(dark_ratio);
    info!(
        "Page {}: dark pixel ratio {:.6} → {}",
        job.sequence,
        dark_ratio,
        if keep { "keep" } else { "discard" }
    );

    if keep {
        ctx.compressor
            .compress(&job.source_path, &job.output_path, ctx.dpi)
            .await?;
    }

    if let Err(e) = tokio::fs::remove_file(&job.source_path).await {
        warn!(
            "Could not remove raw page {}: {}",
            job.source_path.display(),
            e
        );
    }

    job.record(keep, dark_ratio)?;

    if let Some(ref cb) = ctx.progress {
        cb.on_page_evaluated(job.sequence, dark_ratio, keep);
    }

    Ok(keep)
}
