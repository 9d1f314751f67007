//! # scanpipe
//!
//! Unattended document digitization: drive a batch scanner, drop blank
//! pages, convert the rest to PDF, merge them in scan order and upload the
//! result.
//!
//! ## Why this crate?
//!
//! A sheet-fed scanner station has no screen and no operator watching it.
//! The scanner must stay fed while pages are converted in parallel, a stack
//! of separator sheets must not produce an empty document, and every failure
//! has to end in a clean temp area and a status the operator can see on an
//! LED. The heavy lifting (scanning, JPEG/PDF compression, merging, file
//! transfer) is done by mature command-line tools; this crate is the
//! coordinator between them.
//!
//! ## Pipeline Overview
//!
//! ```text
//! preflight
//!  │  mount, temp dir, programs, upload target, scanner capabilities
//!  ▼
//! scanner ──stdout──▶ results reader ──▶ page store ──▶ worker pool (N)
//!    ▲ │                                                  │ blank score
//!    │ └──stderr──▶ status reader ◀──── advance ──────────┘ gm convert
//!    └──── "\n" ──────────┘
//!  ▼
//! finalize: kept pages, in scan order ──▶ pdfunite ──▶ rsync (3 attempts)
//!  ▼
//! session cleanup: temp dir, socket message, LED pulses, exit status
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use scanpipe::{run, ScanConfig, Session};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ScanConfig::builder().dpi(300).prefix("invoices").build().unwrap();
//!     let mut session = Session::new(&config);
//!     let result = run(&config, &mut session).await;
//!     if let Ok(ref summary) = result {
//!         eprintln!("{} of {} pages kept", summary.pages_kept, summary.pages_scanned);
//!     }
//!     session.terminate(result.map(|_| ())).await
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `scanpipe` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! ## Exit Status
//!
//! | Code | Meaning |
//! |------|---------|
//! | 0 | success |
//! | 1 | system error (storage, programs, conversion, signal) |
//! | 2 | network error (upload target unresolved or unreachable, upload failed) |
//! | 3 | no scanner |
//! | 4 | zero pages (everything was blank) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod coordinator;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod preflight;
pub mod progress;
pub mod session;
pub mod status;
pub mod tools;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ScanConfig, ScanConfigBuilder};
pub use coordinator::{run, run_session, scan, ScanOutcome};
pub use error::{ExitCode, ScanError};
pub use output::{PageSummary, ScanSummary};
pub use progress::{NoopProgressCallback, ProgressCallback, ScanProgressCallback};
pub use session::{shutdown_signal, Session};
pub use tools::{Compressor, Merger, ScanProcess, Scanner, Toolchain, Uploader};
