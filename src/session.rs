//! Session lifecycle: the temp directory and the one way out of a run.
//!
//! Every exit path, successful or not, goes through [`Session::finish`]:
//! remove the session directory, log the message, tell a display daemon,
//! pulse the LED. [`Session::terminate`] does the same and ends the process.

use crate::config::ScanConfig;
use crate::error::{ExitCode, ScanError};
use crate::status::{notify, StatusIndicator};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Message logged when a session completed.
pub const DONE_MESSAGE: &str = "Done";

/// Prefix of session directories under the temp root.
pub const TEMP_DIR_PREFIX: &str = "scanpipe.";

pub struct Session {
    temp_root: PathBuf,
    temp_dir: Option<PathBuf>,
    indicator: StatusIndicator,
    notify_socket: PathBuf,
}

impl Session {
    pub fn new(config: &ScanConfig) -> Self {
        Self {
            temp_root: config.temp_root.clone(),
            temp_dir: None,
            indicator: StatusIndicator::new(&config.indicator_dir),
            notify_socket: config.notify_socket.clone(),
        }
    }

    /// Replace the status LED (tests use a short pulse and a temp dir).
    pub fn with_indicator(mut self, indicator: StatusIndicator) -> Self {
        self.indicator = indicator;
        self
    }

    pub fn temp_root(&self) -> &Path {
        &self.temp_root
    }

    /// The session directory, once created.
    pub fn temp_dir(&self) -> Option<&Path> {
        self.temp_dir.as_deref()
    }

    /// Create a fresh, uniquely named directory under the temp root.
    ///
    /// The directory outlives the handle; [`Session::cleanup`] removes it.
    pub fn create_temp_dir(&mut self) -> Result<PathBuf, ScanError> {
        let dir = tempfile::Builder::new()
            .prefix(TEMP_DIR_PREFIX)
            .tempdir_in(&self.temp_root)
            .map_err(|source| ScanError::TempDir {
                root: self.temp_root.clone(),
                source,
            })?
            .keep();
        info!("Using temporary folder {}", dir.display());
        self.temp_dir = Some(dir.clone());
        Ok(dir)
    }

    /// Remove the session directory.
    ///
    /// Nothing is removed unless the directory lies strictly below the temp
    /// root. With `preserve` set to a file inside the directory, only the
    /// other entries are removed.
    pub async fn cleanup(&self, preserve: Option<&Path>) {
        let Some(dir) = self.temp_dir.as_deref() else {
            return;
        };
        if !is_within(dir, &self.temp_root) {
            warn!(
                "Not removing {}: outside of {}",
                dir.display(),
                self.temp_root.display()
            );
            return;
        }

        match preserve.filter(|doc| doc.parent() == Some(dir)) {
            Some(doc) => {
                remove_entries_except(dir, doc).await;
                info!("Kept {} for a manual upload", doc.display());
            }
            None => {
                if let Err(e) = tokio::fs::remove_dir_all(dir).await {
                    warn!("Could not remove {}: {}", dir.display(), e);
                }
            }
        }
    }

    /// Clean up and signal the outcome; returns the process status to use.
    pub async fn finish(&self, message: &str, code: ExitCode, preserve: Option<&Path>) -> i32 {
        self.cleanup(preserve).await;

        if code == ExitCode::Success {
            info!("{}", message);
        } else {
            error!("{}", message);
        }

        notify(&self.notify_socket, message).await;
        self.indicator.flash(code).await;
        code.code()
    }

    /// [`Session::finish`] for a session result.
    pub async fn conclude(&self, result: Result<(), ScanError>) -> i32 {
        match result {
            Ok(()) => self.finish(DONE_MESSAGE, ExitCode::Success, None).await,
            Err(e) => {
                self.finish(&e.to_string(), e.exit_code(), e.preserved_document())
                    .await
            }
        }
    }

    /// [`Session::conclude`], then exit the process.
    pub async fn terminate(&self, result: Result<(), ScanError>) -> ! {
        let status = self.conclude(result).await;
        std::process::exit(status)
    }
}

/// `path` lies strictly below `root`.
pub fn is_within(path: &Path, root: &Path) -> bool {
    path != root
        && path.starts_with(root)
        && !path
            .components()
            .any(|c| matches!(c, std::path::Component::ParentDir))
}

async fn remove_entries_except(dir: &Path, keep: &Path) {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Could not list {}: {}", dir.display(), e);
            return;
        }
    };
    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        if path == keep {
            continue;
        }
        let removed = match entry.file_type().await {
            Ok(t) if t.is_dir() => tokio::fs::remove_dir_all(&path).await,
            _ => tokio::fs::remove_file(&path).await,
        };
        if let Err(e) = removed {
            debug!("Could not remove {}: {}", path.display(), e);
        }
    }
}

/// Resolves with the name of the first SIGHUP, SIGINT or SIGTERM.
///
/// Never resolves if the handlers cannot be installed.
pub async fn shutdown_signal() -> &'static str {
    use tokio::signal::unix::{signal, SignalKind};

    let handlers = (
        signal(SignalKind::hangup()),
        signal(SignalKind::interrupt()),
        signal(SignalKind::terminate()),
    );
    let (mut hup, mut int, mut term) = match handlers {
        (Ok(hup), Ok(int), Ok(term)) => (hup, int, term),
        _ => {
            warn!("Could not install signal handlers");
            return std::future::pending().await;
        }
    };

    tokio::select! {
        _ = hup.recv() => "SIGHUP",
        _ = int.recv() => "SIGINT",
        _ = term.recv() => "SIGTERM",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn session(root: &Path) -> Session {
        let config = ScanConfig::builder()
            .temp_root(root)
            .notify_socket(root.join("none.sock"))
            .build()
            .unwrap();
        Session::new(&config)
            .with_indicator(StatusIndicator::new(root.join("led")).with_pulse(Duration::ZERO))
    }

    #[test]
    fn within_requires_strict_descendant() {
        let root = Path::new("/dev/shm");
        assert!(is_within(Path::new("/dev/shm/scanpipe.abc"), root));
        assert!(!is_within(Path::new("/dev/shm"), root));
        assert!(!is_within(Path::new("/dev/shmother"), root));
        assert!(!is_within(Path::new("/dev/shm/../etc"), root));
        assert!(!is_within(Path::new("/tmp/x"), root));
    }

    #[tokio::test]
    async fn cleanup_removes_session_dir() {
        let root = tempfile::tempdir().unwrap();
        let mut s = session(root.path());
        let dir = s.create_temp_dir().unwrap();
        assert!(dir.starts_with(root.path()));
        std::fs::write(dir.join("out1.pnm"), b"x").unwrap();

        s.cleanup(None).await;
        assert!(!dir.exists());
        assert!(root.path().exists());
    }

    #[tokio::test]
    async fn cleanup_preserves_document() {
        let root = tempfile::tempdir().unwrap();
        let mut s = session(root.path());
        let dir = s.create_temp_dir().unwrap();
        let doc = dir.join("2024-01-01-00-00-00.000000.pdf");
        std::fs::write(&doc, b"%PDF").unwrap();
        std::fs::write(dir.join("out1.pdf"), b"x").unwrap();

        s.cleanup(Some(&doc)).await;
        assert!(doc.exists());
        assert!(!dir.join("out1.pdf").exists());
    }

    #[tokio::test]
    async fn missing_root_is_temp_dir_error() {
        let root = tempfile::tempdir().unwrap();
        let mut s = session(&root.path().join("absent"));
        let err = s.create_temp_dir().unwrap_err();
        assert!(matches!(err, ScanError::TempDir { .. }));
        assert_eq!(err.exit_code(), ExitCode::SystemError);
    }

    #[tokio::test]
    async fn finish_returns_exit_status() {
        let root = tempfile::tempdir().unwrap();
        let mut s = session(root.path());
        s.create_temp_dir().unwrap();
        assert_eq!(s.finish("Zero pages", ExitCode::ZeroPages, None).await, 4);
        assert!(s.temp_dir().is_some_and(|d| !d.exists()));
    }

    #[tokio::test]
    async fn interrupt_removes_everything_and_exits_one() {
        let root = tempfile::tempdir().unwrap();
        let mut s = session(root.path());
        let dir = s.create_temp_dir().unwrap();
        std::fs::write(dir.join("out1.pnm"), b"x").unwrap();
        std::fs::write(dir.join("out1.pdf"), b"x").unwrap();

        let interrupted = Err(ScanError::Interrupted {
            signal: "SIGTERM".into(),
        });
        assert_eq!(s.conclude(interrupted).await, 1);
        assert!(!dir.exists());
        assert!(root.path().exists());
    }
}
