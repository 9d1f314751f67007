//! Configuration for a scan session.
//!
//! All session behaviour is controlled through [`ScanConfig`], built via its
//! [`ScanConfigBuilder`]. The builder clamps numeric knobs into their sane
//! ranges instead of rejecting them: an unattended scanner station should
//! start with a usable setting rather than refuse to feed paper because of a
//! typo in a systemd unit.

use crate::error::ScanError;
use crate::progress::ProgressCallback;
use std::fmt;
use std::path::PathBuf;

/// Lowest accepted scan resolution.
pub const MIN_DPI: u32 = 72;
/// Highest accepted scan resolution.
pub const MAX_DPI: u32 = 600;
/// Upper bound on concurrent page workers.
pub const MAX_WORKERS: usize = 32;

/// Configuration for one scan session.
///
/// # Example
/// ```rust
/// use scanpipe::ScanConfig;
///
/// let config = ScanConfig::builder()
///     .dpi(300)
///     .workers(4)
///     .prefix("invoices/")
///     .build()
///     .unwrap();
/// assert_eq!(config.prefix, "invoices");
/// ```
#[derive(Clone)]
pub struct ScanConfig {
    /// Scan resolution in dots per inch. Range: 72–600. Default: 200.
    ///
    /// Passed to the scanner (when it supports `--resolution`) and to the
    /// compressor as the page density, so the PDF page size matches paper.
    pub dpi: u32,

    /// Number of concurrent convert workers. Range: 1–32. Default: 3.
    ///
    /// Each worker is effectively single-core. Leave one core for the scanner
    /// process, which cannot be parallelised.
    pub workers: usize,

    /// String prepended to the output file name and to the remote directory.
    /// Slashes are removed. Default: empty.
    pub prefix: String,

    /// Root under which the session temp directory is created. Default: `/dev/shm`.
    ///
    /// Raw pages are large; a ramdisk keeps SD-card based stations alive.
    /// Cleanup only ever removes a directory below this root.
    pub temp_root: PathBuf,

    /// ssh host alias of the upload destination. Default: `scanpipe-target`.
    pub upload_target: String,

    /// Total upload attempts before giving up. Default: 3.
    pub upload_attempts: u32,

    /// Pause before answering a scanner prompt, in milliseconds. Default: 100.
    pub ack_delay_ms: u64,

    /// Timeout of the upload reachability probe, in milliseconds. Default: 1000.
    pub probe_timeout_ms: u64,

    /// JPEG quality used by the compressor. Range: 1–100. Default: 70.
    pub jpeg_quality: u8,

    /// Sysfs directory of the status LED. Default: `/sys/class/leds/led0`.
    pub indicator_dir: PathBuf,

    /// Unix socket a display daemon may listen on. Default: `/tmp/scanpipe.sock`.
    pub notify_socket: PathBuf,

    /// Optional page-level event sink.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            dpi: 200,
            workers: 3,
            prefix: String::new(),
            temp_root: PathBuf::from("/dev/shm"),
            upload_target: "scanpipe-target".to_string(),
            upload_attempts: 3,
            ack_delay_ms: 100,
            probe_timeout_ms: 1000,
            jpeg_quality: 70,
            indicator_dir: PathBuf::from("/sys/class/leds/led0"),
            notify_socket: PathBuf::from("/tmp/scanpipe.sock"),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ScanConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanConfig")
            .field("dpi", &self.dpi)
            .field("workers", &self.workers)
            .field("prefix", &self.prefix)
            .field("temp_root", &self.temp_root)
            .field("upload_target", &self.upload_target)
            .field("upload_attempts", &self.upload_attempts)
            .field("ack_delay_ms", &self.ack_delay_ms)
            .field("probe_timeout_ms", &self.probe_timeout_ms)
            .field("jpeg_quality", &self.jpeg_quality)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ScanProgressCallback>"),
            )
            .finish()
    }
}

impl ScanConfig {
    /// Create a new builder for `ScanConfig`.
    pub fn builder() -> ScanConfigBuilder {
        ScanConfigBuilder {
            config: Self::default(),
        }
    }

    /// Remote directory the document is synced into, relative to the login.
    pub fn remote_dir(&self) -> String {
        format!("{}:{}scaninput/", self.upload_target, self.prefix)
    }
}

/// Remove path separators so the prefix can never escape its directory.
pub fn sanitize_prefix(prefix: &str) -> String {
    prefix.replace('/', "")
}

/// Builder for [`ScanConfig`].
#[derive(Debug)]
pub struct ScanConfigBuilder {
    config: ScanConfig,
}

impl ScanConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(MIN_DPI, MAX_DPI);
        self
    }

    pub fn workers(mut self, n: usize) -> Self {
        self.config.workers = n.clamp(1, MAX_WORKERS);
        self
    }

    pub fn prefix(mut self, prefix: impl AsRef<str>) -> Self {
        self.config.prefix = sanitize_prefix(prefix.as_ref());
        self
    }

    pub fn temp_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.temp_root = root.into();
        self
    }

    pub fn upload_target(mut self, alias: impl Into<String>) -> Self {
        self.config.upload_target = alias.into();
        self
    }

    pub fn upload_attempts(mut self, n: u32) -> Self {
        self.config.upload_attempts = n;
        self
    }

    pub fn ack_delay_ms(mut self, ms: u64) -> Self {
        self.config.ack_delay_ms = ms;
        self
    }

    pub fn probe_timeout_ms(mut self, ms: u64) -> Self {
        self.config.probe_timeout_ms = ms;
        self
    }

    pub fn jpeg_quality(mut self, q: u8) -> Self {
        self.config.jpeg_quality = q;
        self
    }

    pub fn indicator_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.indicator_dir = dir.into();
        self
    }

    pub fn notify_socket(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.notify_socket = path.into();
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ScanConfig, ScanError> {
        let c = &self.config;
        if c.upload_attempts == 0 {
            return Err(ScanError::InvalidConfig(
                "upload attempts must be ≥ 1".into(),
            ));
        }
        if c.jpeg_quality == 0 || c.jpeg_quality > 100 {
            return Err(ScanError::InvalidConfig(format!(
                "JPEG quality must be 1–100, got {}",
                c.jpeg_quality
            )));
        }
        if c.upload_target.trim().is_empty() {
            return Err(ScanError::InvalidConfig(
                "upload target alias must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}
