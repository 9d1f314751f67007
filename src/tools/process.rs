//! Process-backed implementations of the external steps.

use super::{Compressor, Merger, ScanProcess, Scanner, Uploader};
use crate::error::ScanError;
use async_trait::async_trait;
use futures::FutureExt;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

pub const SCANNER_PROGRAM: &str = "scanimage";
pub const COMPRESSOR_PROGRAM: &str = "gm";
pub const MERGER_PROGRAM: &str = "pdfunite";
pub const UPLOAD_PROGRAM: &str = "rsync";

/// SANE's `scanimage` in batch mode.
pub struct ScanImage;

#[async_trait]
impl Scanner for ScanImage {
    async fn start(&self, args: &[String]) -> Result<ScanProcess, ScanError> {
        debug!("{} {}", SCANNER_PROGRAM, args.join(" "));
        let mut child = Command::new(SCANNER_PROGRAM)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ScanError::Spawn {
                program: SCANNER_PROGRAM.to_string(),
                source,
            })?;

        let missing =
            |stream: &str| ScanError::Internal(format!("{SCANNER_PROGRAM} {stream} not captured"));
        let stdin = child.stdin.take().ok_or_else(|| missing("stdin"))?;
        let stdout = child.stdout.take().ok_or_else(|| missing("stdout"))?;
        let stderr = child.stderr.take().ok_or_else(|| missing("stderr"))?;

        let exit = async move {
            let status = child.wait().await?;
            Ok::<_, ScanError>(status.code())
        }
        .boxed();

        Ok(ScanProcess {
            stdin: Box::new(stdin),
            stdout: Box::new(stdout),
            stderr: Box::new(stderr),
            exit,
        })
    }
}

/// GraphicsMagick: raw page → single-page JPEG-compressed PDF.
pub struct GraphicsMagick {
    quality: u8,
}

impl GraphicsMagick {
    pub fn new(quality: u8) -> Self {
        Self { quality }
    }

    fn args(&self, source: &Path, dest: &Path, dpi: u32) -> Vec<OsString> {
        let mut args: Vec<OsString> = ["convert", "-set", "units", "PixelsPerInch", "-density"]
            .into_iter()
            .map(OsString::from)
            .collect();
        args.push(dpi.to_string().into());
        args.push(source.into());
        args.push("-compress".into());
        args.push("jpeg".into());
        args.push("-quality".into());
        args.push(self.quality.to_string().into());
        args.push(dest.into());
        args
    }
}

#[async_trait]
impl Compressor for GraphicsMagick {
    async fn compress(&self, source: &Path, dest: &Path, dpi: u32) -> Result<(), ScanError> {
        run_step(
            "gm convert",
            Command::new(COMPRESSOR_PROGRAM).args(self.args(source, dest, dpi)),
        )
        .await
    }
}

/// poppler's `pdfunite`.
pub struct PdfUnite;

#[async_trait]
impl Merger for PdfUnite {
    async fn merge(&self, pages: &[PathBuf], dest: &Path) -> Result<(), ScanError> {
        run_step(
            MERGER_PROGRAM,
            Command::new(MERGER_PROGRAM).args(pages).arg(dest),
        )
        .await
    }
}

/// `rsync` over ssh in batch mode (no password prompt).
pub struct Rsync {
    remote: String,
}

impl Rsync {
    /// `remote` is the `host-alias:directory/` destination.
    pub fn new(remote: impl Into<String>) -> Self {
        Self {
            remote: remote.into(),
        }
    }

    fn args(&self, document: &Path) -> Vec<OsString> {
        // No --append: it implies --inplace, which confuses watchers on the target.
        vec![
            "-e".into(),
            "ssh -o BatchMode=yes".into(),
            document.into(),
            self.remote.clone().into(),
        ]
    }
}

#[async_trait]
impl Uploader for Rsync {
    async fn upload(&self, document: &Path) -> Result<(), ScanError> {
        run_step(
            UPLOAD_PROGRAM,
            Command::new(UPLOAD_PROGRAM).args(self.args(document)),
        )
        .await
    }
}

/// Run a command to completion; any non-zero exit is a [`ScanError::StepFailed`].
///
/// Dropping the returned future kills the child.
pub async fn run_step(step: &str, cmd: &mut Command) -> Result<(), ScanError> {
    let output = cmd
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|source| ScanError::Spawn {
            program: step.to_string(),
            source,
        })?;

    if output.status.success() {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    Err(ScanError::StepFailed {
        step: step.to_string(),
        detail: format!("{}: {}", output.status, stderr.trim()),
    })
}
