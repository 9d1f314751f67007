//! Finalization gate: decide whether there is a document and assemble it.

use crate::error::ScanError;
use crate::pipeline::store::{PageStore, OUTPUT_EXTENSION};
use crate::tools::Merger;
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Timestamp layout of merged documents, microsecond resolution.
pub const DOCUMENT_TIMESTAMP: &str = "%Y-%m-%d-%H-%M-%S%.6f";

/// The merged document, ready for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledDocument {
    pub path: PathBuf,
    pub pages: usize,
}

/// File name of a document finished at `now`.
pub fn document_name(prefix: &str, now: DateTime<Local>) -> String {
    format!(
        "{}{}.{}",
        prefix,
        now.format(DOCUMENT_TIMESTAMP),
        OUTPUT_EXTENSION
    )
}

/// Merge the kept pages, in scan order, into one document under `dir`.
///
/// Must only run after every worker has returned. Fails with
/// [`ScanError::NoPages`] (without invoking the merger) when nothing was
/// kept. The per-page artifacts are removed after a successful merge.
pub async fn finalize(
    store: &PageStore,
    merger: &dyn Merger,
    dir: &Path,
    prefix: &str,
) -> Result<AssembledDocument, ScanError> {
    let pages = store.kept_outputs();
    if pages.is_empty() {
        return Err(ScanError::NoPages);
    }

    let path = dir.join(document_name(prefix, Local::now()));
    info!("Merging {} pages into {}", pages.len(), path.display());
    merger.merge(&pages, &path).await?;

    for page in &pages {
        if let Err(e) = tokio::fs::remove_file(page).await {
            warn!("Could not remove {}: {}", page.display(), e);
        }
    }

    Ok(AssembledDocument {
        path,
        pages: pages.len(),
    })
}
