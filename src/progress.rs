//! Progress-callback trait for per-page scan events.
//!
//! Inject an [`Arc<dyn ScanProgressCallback>`] via
//! [`crate::config::ScanConfigBuilder::progress_callback`] to receive events
//! while a session runs. The CLI turns them into a spinner; a kiosk display
//! could forward them to its own socket.
//!
//! # Example
//!
//! ```rust
//! use scanpipe::{ScanConfig, ScanProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct KeptCounter {
//!     kept: AtomicUsize,
//! }
//!
//! impl ScanProgressCallback for KeptCounter {
//!     fn on_page_evaluated(&self, sequence: usize, dark_ratio: f64, kept: bool) {
//!         if kept {
//!             self.kept.fetch_add(1, Ordering::SeqCst);
//!         }
//!         eprintln!("page {sequence}: {dark_ratio:.5}");
//!     }
//! }
//!
//! let config = ScanConfig::builder()
//!     .progress_callback(Arc::new(KeptCounter { kept: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use std::path::Path;
use std::sync::Arc;

/// Called by the coordinator as pages move through the pipeline.
///
/// Implementations must be `Send + Sync`: page evaluation events arrive from
/// the worker tasks concurrently and possibly out of scan order. All methods
/// default to no-ops.
pub trait ScanProgressCallback: Send + Sync {
    /// Called once, right before the scanner process is started.
    fn on_scan_start(&self, workers: usize) {
        let _ = workers;
    }

    /// Called when the scanner reports a new page file.
    ///
    /// # Arguments
    /// * `sequence`: 1-based scan position
    fn on_page_scanned(&self, sequence: usize) {
        let _ = sequence;
    }

    /// Called when a worker has classified a page.
    ///
    /// # Arguments
    /// * `sequence`  : 1-based scan position
    /// * `dark_ratio`: blank-page score of the page
    /// * `kept`      : `false` if the page was discarded as blank
    fn on_page_evaluated(&self, sequence: usize, dark_ratio: f64, kept: bool) {
        let _ = (sequence, dark_ratio, kept);
    }

    /// Called once after the scanner exited and all workers drained.
    fn on_scan_complete(&self, scanned: usize, kept: usize) {
        let _ = (scanned, kept);
    }

    /// Called once the merged document exists.
    fn on_document_assembled(&self, pages: usize, path: &Path) {
        let _ = (pages, path);
    }

    /// Called before every upload attempt (1-based).
    fn on_upload_attempt(&self, attempt: u32, max_attempts: u32) {
        let _ = (attempt, max_attempts);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ScanProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ScanConfig`].
pub type ProgressCallback = Arc<dyn ScanProgressCallback>;
