//! Upload with a bounded number of attempts.

use crate::error::ScanError;
use crate::progress::ProgressCallback;
use crate::tools::Uploader;
use std::path::Path;
use tracing::{info, warn};

/// Try to upload `document` up to `attempts` times, stopping at the first
/// success. Returns the number of attempts used.
///
/// Attempts follow each other immediately. On exhaustion the error names the
/// document so the caller can keep it for a manual retry.
pub async fn upload_with_retry(
    uploader: &dyn Uploader,
    document: &Path,
    attempts: u32,
    progress: Option<&ProgressCallback>,
) -> Result<u32, ScanError> {
    let mut last_error = None;

    for attempt in 1..=attempts {
        if let Some(cb) = progress {
            cb.on_upload_attempt(attempt, attempts);
        }
        match uploader.upload(document).await {
            Ok(()) => {
                info!("Uploaded {} (attempt {})", document.display(), attempt);
                return Ok(attempt);
            }
            Err(e) => {
                warn!("Upload attempt {}/{} failed: {}", attempt, attempts, e);
                last_error = Some(e);
            }
        }
    }

    Err(ScanError::UploadFailed {
        attempts,
        detail: last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no attempt made".to_string()),
        document: document.to_path_buf(),
    })
}
