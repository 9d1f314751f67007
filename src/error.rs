//! Error types for the scanpipe library.
//!
//! Every failure in a scan session is fatal: there is no partial document and
//! no resumable state. [`ScanError`] therefore carries everything the cleanup
//! routine needs to finish the run: a human-readable message (its `Display`)
//! and the process [`ExitCode`] that also drives the status indicator.
//!
//! "No pages" is modelled as an error variant too, although it is an expected
//! outcome (the operator fed only separator sheets). It has its own exit code
//! so callers can tell it apart from a fault.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Process exit status of a scan session.
///
/// The numeric value doubles as the number of pulses on the status LED, so
/// the discriminants are part of the external contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[repr(u8)]
pub enum ExitCode {
    Success = 0,
    SystemError = 1,
    NetworkError = 2,
    NoScanner = 3,
    ZeroPages = 4,
}

impl ExitCode {
    /// Numeric process status.
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Number of on/off pulses emitted on the status indicator.
    pub fn pulses(self) -> u8 {
        self as u8
    }
}

/// All fatal conditions of a scan session.
#[derive(Debug, Error)]
pub enum ScanError {
    // ── Preflight ─────────────────────────────────────────────────────────
    /// The temp root is not a mounted file system (usually the ramdisk).
    #[error("{path:?} is not mounted")]
    StorageNotMounted { path: PathBuf },

    /// The per-session temp directory could not be created.
    #[error("Error creating temporary folder under {root:?}: {source}")]
    TempDir {
        root: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A required external program is not on `PATH`.
    #[error("Can't find {program}\n{hint}")]
    MissingProgram { program: String, hint: String },

    /// `ssh -G <alias>` failed, so the upload destination is unknown.
    #[error("ssh -G {alias} failed: {detail}")]
    UploadTargetUnresolved { alias: String, detail: String },

    /// The ssh configuration for the alias lacks a hostname or port.
    #[error("ssh -G {alias}: hostname or port missing")]
    UploadTargetIncomplete { alias: String },

    /// The upload destination did not accept a TCP connection in time.
    #[error("upload destination {host}:{port} not available: {detail}")]
    UploadTargetUnreachable {
        host: String,
        port: u16,
        detail: String,
    },

    /// The capability probe failed; usually no scanner is attached.
    #[error("Error getting available options. Is the scanner attached? {detail}")]
    ScannerUnavailable { detail: String },

    /// The capability probe succeeded but printed nothing usable.
    #[error("Scanner capability listing is malformed: {detail}")]
    CapabilitiesMalformed { detail: String },

    // ── Scan ──────────────────────────────────────────────────────────────
    /// The scanning process reported that it found no device.
    #[error("No SANE devices found")]
    NoDevice,

    /// An external program could not be started at all.
    #[error("Error starting {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The status reader saw an event its handshake state does not allow.
    #[error("Scanner handshake violated: {0}")]
    Handshake(String),

    /// The worker pool stopped accepting jobs before the scan finished.
    #[error("Worker queue closed while page {sequence} was waiting")]
    QueueClosed { sequence: usize },

    // ── Page processing ───────────────────────────────────────────────────
    /// A raw page could not be opened.
    #[error("Error opening page {path:?}: {source}")]
    PageRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A raw page could not be decoded as an image.
    #[error("Error reading page {path:?}: {detail}")]
    PageDecode { path: PathBuf, detail: String },

    /// The compressor or the merger exited unsuccessfully.
    #[error("{step} failed: {detail}")]
    StepFailed { step: String, detail: String },

    // ── Outcome ───────────────────────────────────────────────────────────
    /// Every scanned page was blank, or nothing was scanned at all.
    #[error("Zero pages scanned, cancelling")]
    NoPages,

    /// Every upload attempt failed. The merged document is kept on disk.
    #[error("Error uploading after {attempts} attempts: {detail}")]
    UploadFailed {
        attempts: u32,
        detail: String,
        document: PathBuf,
    },

    /// A termination signal arrived mid-run.
    #[error("Caught exit signal ({signal}), cleaning up")]
    Interrupted { signal: String },

    // ── I/O and catch-all ─────────────────────────────────────────────────
    /// Unexpected I/O failure on the session's own files or pipes.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration passed to the builder.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Unexpected internal error (a task panicked, a verdict was set twice).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ScanError {
    /// Status the process terminates with for this error.
    pub fn exit_code(&self) -> ExitCode {
        match self {
            ScanError::UploadTargetUnresolved { .. }
            | ScanError::UploadTargetUnreachable { .. }
            | ScanError::UploadFailed { .. } => ExitCode::NetworkError,
            ScanError::ScannerUnavailable { .. } | ScanError::NoDevice => ExitCode::NoScanner,
            ScanError::NoPages => ExitCode::ZeroPages,
            _ => ExitCode::SystemError,
        }
    }

    /// The document the cleanup routine must not delete, if any.
    pub fn preserved_document(&self) -> Option<&Path> {
        match self {
            ScanError::UploadFailed { document, .. } => Some(document),
            _ => None,
        }
    }
}
