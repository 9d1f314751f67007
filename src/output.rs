//! Result types of a completed scan session.

use crate::pipeline::store::PageStore;
use serde::Serialize;
use std::path::PathBuf;

/// Summary of one successful session, printed by `scanpipe --json`.
#[derive(Debug, Clone, Serialize)]
pub struct ScanSummary {
    /// Raw pages reported by the scanner.
    pub pages_scanned: usize,
    /// Pages merged into the document.
    pub pages_kept: usize,
    /// Pages dropped as blank.
    pub pages_discarded: usize,
    /// Local path of the merged document (removed again on cleanup).
    pub document: PathBuf,
    /// Upload attempts used, 1-based.
    pub upload_attempts: u32,
    /// Wall-clock time from scanner start to finished upload.
    pub duration_ms: u64,
    /// Per-page verdicts in scan order.
    pub pages: Vec<PageSummary>,
}

/// Verdict of a single page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageSummary {
    pub sequence: usize,
    /// `None` if the page was never evaluated.
    pub dark_ratio: Option<f64>,
    pub kept: bool,
}

impl PageSummary {
    /// One entry per descriptor, in store order.
    pub fn from_store(store: &PageStore) -> Vec<PageSummary> {
        store
            .iter()
            .map(|page| PageSummary {
                sequence: page.sequence(),
                dark_ratio: page.verdict().map(|v| v.dark_ratio),
                kept: page.keep(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_summaries_follow_store_order() {
        let mut store = PageStore::new();
        store.append("/t/out1.pnm").job().record(false, 0.0001).unwrap();
        store.append("/t/out2.pnm").job().record(true, 0.12).unwrap();
        store.append("/t/out3.pnm");

        let pages = PageSummary::from_store(&store);
        assert_eq!(pages.len(), 3);
        assert_eq!(pages[0].kept, false);
        assert_eq!(pages[1].dark_ratio, Some(0.12));
        assert_eq!(
            pages[2],
            PageSummary {
                sequence: 3,
                dark_ratio: None,
                kept: true
            }
        );
    }

    #[test]
    fn summary_serialises_to_json() {
        let summary = ScanSummary {
            pages_scanned: 2,
            pages_kept: 1,
            pages_discarded: 1,
            document: PathBuf::from("/dev/shm/scanpipe.a/2024.pdf"),
            upload_attempts: 1,
            duration_ms: 1500,
            pages: vec![],
        };
        let json: serde_json::Value = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["pages_kept"], 1);
        assert_eq!(json["document"], "/dev/shm/scanpipe.a/2024.pdf");
    }
}
