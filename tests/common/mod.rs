//! In-process fakes for the external programs.

#![allow(dead_code)]

use async_trait::async_trait;
use futures::FutureExt;
use image::{Rgb, RgbImage};
use scanpipe::{Compressor, Merger, ScanError, ScanProcess, Scanner, Toolchain, Uploader};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt, DuplexStream};

// ── Pages ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sheet {
    /// White page with a black square in the middle.
    Content,
    /// Pure white page.
    Blank,
    /// Not an image at all.
    Corrupt,
}

pub fn write_sheet(path: &Path, sheet: Sheet) {
    match sheet {
        Sheet::Corrupt => std::fs::write(path, b"P6\nthis is not a picture").unwrap(),
        Sheet::Content | Sheet::Blank => {
            let mut img = RgbImage::from_pixel(80, 80, Rgb([255, 255, 255]));
            if sheet == Sheet::Content {
                for y in 30..50 {
                    for x in 30..50 {
                        img.put_pixel(x, y, Rgb([0, 0, 0]));
                    }
                }
            }
            img.save_with_format(path, image::ImageFormat::Pnm).unwrap();
        }
    }
}

/// Page number of a `.../outN.ext` path.
pub fn page_number(path: &Path) -> usize {
    path.file_stem()
        .and_then(|s| s.to_str())
        .and_then(|s| s.strip_prefix("out"))
        .and_then(|n| n.parse().ok())
        .unwrap_or(0)
}

// ── Scanner ──────────────────────────────────────────────────────────────────

/// Behaves like `scanimage --batch-prompt --batch-print`: prompt on stderr,
/// wait for the acknowledgement, write the page, print its path.
pub struct ScriptedScanner {
    dir: PathBuf,
    sheets: Vec<Sheet>,
    no_device: bool,
    /// Pages written so far; only grows after an acknowledgement.
    pub written: Arc<AtomicUsize>,
}

impl ScriptedScanner {
    pub fn new(dir: &Path, sheets: &[Sheet]) -> Self {
        Self {
            dir: dir.to_path_buf(),
            sheets: sheets.to_vec(),
            no_device: false,
            written: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn without_device(dir: &Path) -> Self {
        Self {
            no_device: true,
            ..Self::new(dir, &[])
        }
    }
}

async fn prompt(stderr: &mut DuplexStream, stdin: &mut DuplexStream, n: usize) -> bool {
    let text = format!("Place document no. {n} on the scanner.\nPress <RETURN> to continue.\n");
    if stderr.write_all(text.as_bytes()).await.is_err() {
        return false;
    }
    let mut ack = [0u8; 1];
    stdin.read_exact(&mut ack).await.is_ok()
}

#[async_trait]
impl Scanner for ScriptedScanner {
    async fn start(&self, _args: &[String]) -> Result<ScanProcess, ScanError> {
        let (stdin_ours, mut stdin) = duplex(64);
        let (stdout_ours, mut stdout) = duplex(4096);
        let (stderr_ours, mut stderr) = duplex(4096);

        let dir = self.dir.clone();
        let sheets = self.sheets.clone();
        let no_device = self.no_device;
        let written = Arc::clone(&self.written);

        let script = tokio::spawn(async move {
            if no_device {
                let _ = stderr.write_all(b"scanimage: no SANE devices found\n").await;
                return 1;
            }
            for (i, sheet) in sheets.iter().enumerate() {
                let n = i + 1;
                if !prompt(&mut stderr, &mut stdin, n).await {
                    return 1;
                }
                let path = dir.join(format!("out{n}.pnm"));
                write_sheet(&path, *sheet);
                written.fetch_add(1, Ordering::SeqCst);
                let line = format!("{}\n", path.display());
                if stdout.write_all(line.as_bytes()).await.is_err() {
                    return 1;
                }
            }
            prompt(&mut stderr, &mut stdin, sheets.len() + 1).await;
            let _ = stderr
                .write_all(b"scanimage: sane_start: Document feeder out of documents\n")
                .await;
            7
        });

        let exit = async move {
            let code = script
                .await
                .map_err(|e| ScanError::Internal(e.to_string()))?;
            Ok::<_, ScanError>(Some(code))
        }
        .boxed();

        Ok(ScanProcess {
            stdin: Box::new(stdin_ours),
            stdout: Box::new(stdout_ours),
            stderr: Box::new(stderr_ours),
            exit,
        })
    }
}

// ── Compressor ───────────────────────────────────────────────────────────────

/// Writes the source file name into the output; page N sleeps `delays[N-1]`.
#[derive(Default)]
pub struct FakeCompressor {
    pub delays: Vec<Duration>,
    pub fail: bool,
    pub calls: AtomicUsize,
}

#[async_trait]
impl Compressor for FakeCompressor {
    async fn compress(&self, source: &Path, dest: &Path, _dpi: u32) -> Result<(), ScanError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let n = page_number(source);
        if let Some(delay) = self.delays.get(n.saturating_sub(1)) {
            tokio::time::sleep(*delay).await;
        }
        if self.fail {
            return Err(ScanError::StepFailed {
                step: "gm convert".into(),
                detail: "exit status: 1: unable to open image".into(),
            });
        }
        let name = source.file_name().unwrap().to_string_lossy().into_owned();
        tokio::fs::write(dest, name).await?;
        Ok(())
    }
}

// ── Merger ───────────────────────────────────────────────────────────────────

/// Records, per call, the contents of every input in order.
#[derive(Default)]
pub struct FakeMerger {
    pub merged: Mutex<Vec<Vec<String>>>,
}

impl FakeMerger {
    pub fn calls(&self) -> usize {
        self.merged.lock().unwrap().len()
    }

    pub fn last(&self) -> Vec<String> {
        self.merged.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl Merger for FakeMerger {
    async fn merge(&self, pages: &[PathBuf], dest: &Path) -> Result<(), ScanError> {
        let mut contents = Vec::new();
        for page in pages {
            contents.push(tokio::fs::read_to_string(page).await?);
        }
        tokio::fs::write(dest, contents.join("\n")).await?;
        self.merged.lock().unwrap().push(contents);
        Ok(())
    }
}

// ── Uploader ─────────────────────────────────────────────────────────────────

/// Fails the first `failures` attempts.
pub struct FakeUploader {
    pub failures: u32,
    pub calls: AtomicU32,
}

impl FakeUploader {
    pub fn failing(failures: u32) -> Self {
        Self {
            failures,
            calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl Uploader for FakeUploader {
    async fn upload(&self, _document: &Path) -> Result<(), ScanError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if n <= self.failures {
            Err(ScanError::StepFailed {
                step: "rsync".into(),
                detail: "connection refused".into(),
            })
        } else {
            Ok(())
        }
    }
}

// ── Toolchain ────────────────────────────────────────────────────────────────

pub struct Fakes {
    pub scanner: Arc<ScriptedScanner>,
    pub compressor: Arc<FakeCompressor>,
    pub merger: Arc<FakeMerger>,
    pub uploader: Arc<FakeUploader>,
}

impl Fakes {
    pub fn new(scanner: ScriptedScanner) -> Self {
        Self {
            scanner: Arc::new(scanner),
            compressor: Arc::new(FakeCompressor::default()),
            merger: Arc::new(FakeMerger::default()),
            uploader: Arc::new(FakeUploader::failing(0)),
        }
    }

    pub fn with_compressor(mut self, compressor: FakeCompressor) -> Self {
        self.compressor = Arc::new(compressor);
        self
    }

    pub fn with_uploader(mut self, uploader: FakeUploader) -> Self {
        self.uploader = Arc::new(uploader);
        self
    }

    pub fn toolchain(&self) -> Toolchain {
        Toolchain {
            scanner: self.scanner.clone(),
            compressor: self.compressor.clone(),
            merger: self.merger.clone(),
            uploader: self.uploader.clone(),
        }
    }
}
