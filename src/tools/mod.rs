//! External programs behind narrow async interfaces.
//!
//! The pipeline delegates everything that is not coordination to mature
//! command-line tools: the scanner front-end, a JPEG/PDF compressor, a PDF
//! merger and a file-sync program. Each one sits behind a trait so the
//! coordinator can be driven by in-process fakes in tests, and so a station
//! can swap e.g. the merger without touching the pipeline.
//!
//! [`process`] holds the implementations that spawn the real programs;
//! [`options`] derives the scanner command line from its capability listing.

pub mod options;
pub mod process;

use crate::config::ScanConfig;
use crate::error::ScanError;
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};

pub use process::{GraphicsMagick, PdfUnite, Rsync, ScanImage};

/// A running scanning process and its three streams.
pub struct ScanProcess {
    /// Receives the acknowledgement token.
    pub stdin: Box<dyn AsyncWrite + Send + Unpin>,
    /// One page artifact path per line, in scan order.
    pub stdout: Box<dyn AsyncRead + Send + Unpin>,
    /// Human-readable status lines and prompts.
    pub stderr: Box<dyn AsyncRead + Send + Unpin>,
    /// Resolves with the exit code once the process terminated.
    pub exit: BoxFuture<'static, Result<Option<i32>, ScanError>>,
}

/// Starts the interactive scanning process.
#[async_trait]
pub trait Scanner: Send + Sync {
    async fn start(&self, args: &[String]) -> Result<ScanProcess, ScanError>;
}

/// Converts one kept raw page into its compressed output artifact.
#[async_trait]
pub trait Compressor: Send + Sync {
    async fn compress(&self, source: &Path, dest: &Path, dpi: u32) -> Result<(), ScanError>;
}

/// Joins the per-page artifacts, in the given order, into one document.
#[async_trait]
pub trait Merger: Send + Sync {
    async fn merge(&self, pages: &[PathBuf], dest: &Path) -> Result<(), ScanError>;
}

/// Transfers the finished document to its destination (one attempt).
#[async_trait]
pub trait Uploader: Send + Sync {
    async fn upload(&self, document: &Path) -> Result<(), ScanError>;
}

/// The set of external steps a session uses.
#[derive(Clone)]
pub struct Toolchain {
    pub scanner: Arc<dyn Scanner>,
    pub compressor: Arc<dyn Compressor>,
    pub merger: Arc<dyn Merger>,
    pub uploader: Arc<dyn Uploader>,
}

impl Toolchain {
    /// The real programs: `scanimage`, `gm`, `pdfunite`, `rsync`.
    pub fn system(config: &ScanConfig) -> Self {
        Self {
            scanner: Arc::new(ScanImage),
            compressor: Arc::new(GraphicsMagick::new(config.jpeg_quality)),
            merger: Arc::new(PdfUnite),
            uploader: Arc::new(Rsync::new(config.remote_dir())),
        }
    }
}
