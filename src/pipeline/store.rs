//! Page Record Store: the ordered list of scanned pages.
//!
//! The store is append-only and owned by the results reader while the
//! scanner runs. It is handed to the finalization gate by value once the
//! reader has finished, so the append path needs no lock.
//!
//! Workers never touch the store. Each [`PageJob`] carries a clone of its
//! page's write-once [`VerdictSlot`]; the worker records the keep/discard
//! decision there and the descriptor observes it later. Document order is
//! therefore the append order, whatever order the workers finish in.

use crate::error::ScanError;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

/// Extension of the per-page output artifact.
pub const OUTPUT_EXTENSION: &str = "pdf";

/// Outcome of the blank-page evaluation for one page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Verdict {
    pub keep: bool,
    pub dark_ratio: f64,
}

/// Shared write-once cell holding a page's [`Verdict`].
#[derive(Debug, Clone, Default)]
pub struct VerdictSlot(Arc<OnceLock<Verdict>>);

impl VerdictSlot {
    /// Record the verdict. Fails if one was already recorded.
    pub fn record(&self, verdict: Verdict) -> Result<(), Verdict> {
        self.0.set(verdict)
    }

    pub fn get(&self) -> Option<Verdict> {
        self.0.get().copied()
    }
}

/// One scanned page.
#[derive(Debug, Clone)]
pub struct PageDescriptor {
    sequence: usize,
    source_path: PathBuf,
    verdict: VerdictSlot,
}

impl PageDescriptor {
    pub fn new(sequence: usize, source_path: impl Into<PathBuf>) -> Self {
        Self {
            sequence,
            source_path: source_path.into(),
            verdict: VerdictSlot::default(),
        }
    }

    /// 1-based scan position.
    pub fn sequence(&self) -> usize {
        self.sequence
    }

    /// Raw artifact written by the scanner.
    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    /// Converted artifact: same base name, `.pdf` extension.
    pub fn output_path(&self) -> PathBuf {
        output_path_for(&self.source_path)
    }

    /// Whether the page belongs in the document. `true` until a worker says otherwise.
    pub fn keep(&self) -> bool {
        self.verdict.get().map_or(true, |v| v.keep)
    }

    pub fn verdict(&self) -> Option<Verdict> {
        self.verdict.get()
    }

    /// Build the job a worker processes for this page.
    pub fn job(&self) -> PageJob {
        PageJob {
            sequence: self.sequence,
            source_path: self.source_path.clone(),
            output_path: self.output_path(),
            verdict: self.verdict.clone(),
        }
    }
}

/// Derive the output artifact path of a raw page.
pub fn output_path_for(source: &Path) -> PathBuf {
    source.with_extension(OUTPUT_EXTENSION)
}

/// Unit of work handed to exactly one worker.
#[derive(Debug)]
pub struct PageJob {
    pub sequence: usize,
    pub source_path: PathBuf,
    pub output_path: PathBuf,
    verdict: VerdictSlot,
}

impl PageJob {
    /// Record this page's verdict; a second call is an internal error.
    pub fn record(&self, keep: bool, dark_ratio: f64) -> Result<(), ScanError> {
        self.verdict
            .record(Verdict { keep, dark_ratio })
            .map_err(|_| {
                ScanError::Internal(format!("verdict for page {} set twice", self.sequence))
            })
    }
}

/// Append-only sequence of pages in scan order.
#[derive(Debug, Default)]
pub struct PageStore {
    pages: Vec<PageDescriptor>,
}

impl PageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the next scanned page and return its descriptor.
    pub fn append(&mut self, source_path: impl Into<PathBuf>) -> &PageDescriptor {
        let sequence = self.pages.len() + 1;
        self.pages.push(PageDescriptor::new(sequence, source_path));
        &self.pages[sequence - 1]
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PageDescriptor> {
        self.pages.iter()
    }

    /// Output paths of all kept pages, in scan order.
    pub fn kept_outputs(&self) -> Vec<PathBuf> {
        self.pages
            .iter()
            .filter(|p| p.keep())
            .map(PageDescriptor::output_path)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_path_swaps_extension() {
        let d = PageDescriptor::new(1, "/dev/shm/tmp.x/out7.pnm");
        assert_eq!(d.output_path(), PathBuf::from("/dev/shm/tmp.x/out7.pdf"));
    }

    #[test]
    fn keep_defaults_to_true() {
        let d = PageDescriptor::new(1, "a.pnm");
        assert!(d.keep());
        assert!(d.verdict().is_none());
    }

    #[test]
    fn verdict_recorded_once() {
        let d = PageDescriptor::new(4, "a.pnm");
        let job = d.job();
        job.record(false, 0.0001).unwrap();
        assert!(!d.keep());
        assert_eq!(d.verdict().unwrap().dark_ratio, 0.0001);

        let err = job.record(true, 0.5).unwrap_err();
        assert!(err.to_string().contains("page 4"));
        assert!(!d.keep(), "second write must not change the verdict");
    }

    #[test]
    fn append_assigns_sequence_in_order() {
        let mut store = PageStore::new();
        assert_eq!(store.append("out1.pnm").sequence(), 1);
        assert_eq!(store.append("out2.pnm").sequence(), 2);
        assert_eq!(store.append("out3.pnm").sequence(), 3);
        let seqs: Vec<usize> = store.iter().map(|p| p.sequence()).collect();
        assert_eq!(seqs, vec![1, 2, 3]);
    }

    #[test]
    fn kept_outputs_follow_store_order_not_verdict_order() {
        let mut store = PageStore::new();
        let jobs: Vec<PageJob> = ["p1.pnm", "p2.pnm", "p3.pnm", "p4.pnm"]
            .iter()
            .map(|p| store.append(*p).job())
            .collect();

        // Verdicts arrive out of order.
        jobs[3].record(true, 0.2).unwrap();
        jobs[0].record(false, 0.0).unwrap();
        jobs[2].record(true, 0.1).unwrap();
        jobs[1].record(true, 0.3).unwrap();

        assert_eq!(
            store.kept_outputs(),
            vec![
                PathBuf::from("p2.pdf"),
                PathBuf::from("p3.pdf"),
                PathBuf::from("p4.pdf")
            ]
        );
    }
}
