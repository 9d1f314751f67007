//! Pipeline stages of a scan session.
//!
//! ## Data Flow
//!
//! ```text
//!  scanner stdout ──▶ driver::read_results ──▶ store (append) ──▶ worker queue
//!                                                                   │
//!  scanner stderr ──▶ driver::read_status ◀── advance ──────────────┘
//!        ▲                  │
//!        └──── "\n" ────────┘
//!
//!  workers: blank ──▶ compressor ──▶ verdict        finalize ──▶ upload
//! ```
//!
//! 1. [`store`]    : ordered page descriptors with write-once verdicts
//! 2. [`handshake`]: prompt/acknowledge/advance state machine and the
//!    rendezvous advance channel
//! 3. [`driver`]   : the stdout and stderr readers of the scanner
//! 4. [`blank`]    : the blank-page score (CPU-bound, `spawn_blocking`)
//! 5. [`worker`]   : rendezvous job queue and the worker loops
//! 6. [`finalize`] : no-pages gate and in-order merge
//! 7. [`upload`]   : bounded upload attempts

pub mod blank;
pub mod driver;
pub mod finalize;
pub mod handshake;
pub mod store;
pub mod upload;
pub mod worker;
