//! Session orchestration: scanner, readers, worker pool, gate and upload.
//!
//! ## Ordering of a scan
//!
//! ```text
//!  start scanner ─┬─ status reader  (stderr, answers prompts)
//!                 ├─ results reader (stdout, owns the store)
//!                 └─ N workers
//!
//!  wait: scanner exit ─▶ store hand-off ─▶ status reader ─▶ worker drain
//! ```
//!
//! While waiting, a failed worker or a failed status reader ends the scan
//! at once: remaining tasks are aborted and dropping the scanner's exit
//! future kills the child process.

use crate::config::{ScanConfig, MAX_WORKERS};
use crate::error::ScanError;
use crate::output::{PageSummary, ScanSummary};
use crate::pipeline::driver::{read_results, read_status};
use crate::pipeline::finalize::finalize;
use crate::pipeline::handshake::advance_channel;
use crate::pipeline::store::PageStore;
use crate::pipeline::upload::upload_with_retry;
use crate::pipeline::worker::{job_queue, spawn_workers, WorkerContext, WorkerStats};
use crate::preflight;
use crate::session::Session;
use crate::tools::{ScanProcess, Toolchain};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::{AbortHandle, JoinError, JoinSet};
use tracing::{debug, info};

/// What the scan phase produced.
#[derive(Debug)]
pub struct ScanOutcome {
    /// All pages in scan order, with their verdicts.
    pub store: PageStore,
    /// Exit code of the scanner, `None` if it was killed by a signal.
    pub scanner_exit: Option<i32>,
    /// Prompts the status reader answered.
    pub prompts: usize,
    /// Totals over all workers.
    pub workers: WorkerStats,
}

/// Aborts the reader tasks when the scan ends early.
struct AbortOnDrop(Vec<AbortHandle>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        for handle in &self.0 {
            handle.abort();
        }
    }
}

fn joined<T>(res: Result<Result<T, ScanError>, JoinError>) -> Result<T, ScanError> {
    res.map_err(|e| ScanError::Internal(format!("pipeline task failed: {e}")))?
}

fn tally(
    total: &mut WorkerStats,
    res: Result<Result<WorkerStats, ScanError>, JoinError>,
) -> Result<(), ScanError> {
    let stats = joined(res)?;
    total.processed += stats.processed;
    total.kept += stats.kept;
    total.discarded += stats.discarded;
    Ok(())
}

async fn worker_failure(
    workers: &mut JoinSet<Result<WorkerStats, ScanError>>,
) -> Option<ScanError> {
    while let Some(res) = workers.join_next().await {
        if let Err(e) = joined(res) {
            return Some(e);
        }
    }
    None
}

/// Run the scanner with `args` until every page has been evaluated.
///
/// Scanner exit status is logged but not interpreted: the scanner reports
/// failure when the feeder simply ran out of paper.
pub async fn scan(
    config: &ScanConfig,
    tools: &Toolchain,
    args: &[String],
) -> Result<ScanOutcome, ScanError> {
    let ScanProcess {
        stdin,
        stdout,
        stderr,
        mut exit,
    } = tools.scanner.start(args).await?;

    let (queue, jobs) = job_queue();
    let (advance_tx, advance_rx) = advance_channel();

    let ctx = Arc::new(WorkerContext {
        compressor: Arc::clone(&tools.compressor),
        dpi: config.dpi,
        progress: config.progress_callback.clone(),
    });
    let mut workers = spawn_workers(config.workers.clamp(1, MAX_WORKERS), jobs, ctx);

    let mut status = tokio::spawn(read_status(
        stderr,
        stdin,
        advance_rx,
        Duration::from_millis(config.ack_delay_ms),
    ));
    let mut results = tokio::spawn(read_results(
        stdout,
        queue,
        advance_tx,
        config.progress_callback.clone(),
    ));
    let _guard = AbortOnDrop(vec![status.abort_handle(), results.abort_handle()]);

    let mut totals = WorkerStats::default();
    let mut prompts = None;

    let scanner_exit = loop {
        tokio::select! {
            biased;
            Some(res) = workers.join_next() => tally(&mut totals, res)?,
            res = &mut status, if prompts.is_none() => prompts = Some(joined(res)?),
            code = &mut exit => break code?,
        }
    };
    info!("Scanner exited ({:?})", scanner_exit);

    let store = loop {
        tokio::select! {
            biased;
            Some(res) = workers.join_next() => tally(&mut totals, res)?,
            res = &mut results => match joined(res) {
                Ok(store) => break store,
                // A closed queue means the workers are gone; report why.
                Err(e) => return Err(worker_failure(&mut workers).await.unwrap_or(e)),
            },
        }
    };

    let prompts = match prompts {
        Some(n) => n,
        None => joined(status.await)?,
    };

    while let Some(res) = workers.join_next().await {
        tally(&mut totals, res)?;
    }
    debug!(
        "scan finished: {} pages, {} prompts answered, {} kept",
        store.len(),
        prompts,
        totals.kept
    );

    Ok(ScanOutcome {
        store,
        scanner_exit,
        prompts,
        workers: totals,
    })
}

/// Scan, assemble and upload. `temp_dir` receives the merged document.
pub async fn run_session(
    config: &ScanConfig,
    tools: &Toolchain,
    temp_dir: &Path,
    args: &[String],
) -> Result<ScanSummary, ScanError> {
    let started = Instant::now();
    info!(
        "Using {} dpi, {} convert workers and prefix '{}'",
        config.dpi, config.workers, config.prefix
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_scan_start(config.workers);
    }

    let outcome = scan(config, tools, args).await?;
    let scanned = outcome.store.len();
    let kept = outcome.workers.kept;
    if let Some(ref cb) = config.progress_callback {
        cb.on_scan_complete(scanned, kept);
    }

    let document = finalize(
        &outcome.store,
        tools.merger.as_ref(),
        temp_dir,
        &config.prefix,
    )
    .await?;
    info!(
        "{} pages scanned to {}",
        document.pages,
        document.path.display()
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_document_assembled(document.pages, &document.path);
    }

    let upload_attempts = upload_with_retry(
        tools.uploader.as_ref(),
        &document.path,
        config.upload_attempts,
        config.progress_callback.as_ref(),
    )
    .await?;

    Ok(ScanSummary {
        pages_scanned: scanned,
        pages_kept: document.pages,
        pages_discarded: scanned - document.pages,
        document: document.path,
        upload_attempts,
        duration_ms: started.elapsed().as_millis() as u64,
        pages: PageSummary::from_store(&outcome.store),
    })
}

/// Preflight, then a full session with the system programs.
pub async fn run(config: &ScanConfig, session: &mut Session) -> Result<ScanSummary, ScanError> {
    let args = preflight::run(config, session).await?;
    let temp_dir = session
        .temp_dir()
        .ok_or_else(|| ScanError::Internal("session directory missing after preflight".into()))?
        .to_path_buf();
    run_session(config, &Toolchain::system(config), &temp_dir, &args).await
}
