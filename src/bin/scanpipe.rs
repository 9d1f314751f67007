//! CLI binary for scanpipe.
//!
//! A thin shim over the library crate that maps CLI flags to `ScanConfig`,
//! runs one session and exits through the session's cleanup routine.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use scanpipe::{
    run, shutdown_signal, ProgressCallback, ScanConfig, ScanError, ScanProgressCallback,
    ScanSummary, Session,
};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner plus one log line per evaluated page. Pages may finish out of
/// scan order when several workers run.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  ⏱ {elapsed}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Preparing");
        bar.set_message("Checking scanner and upload target…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self { bar })
    }
}

impl ScanProgressCallback for CliProgressCallback {
    fn on_scan_start(&self, workers: usize) {
        self.bar.set_prefix("Scanning");
        self.bar.set_message("waiting for paper");
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Scanner started, {workers} convert workers"))
        ));
    }

    fn on_page_scanned(&self, sequence: usize) {
        self.bar.set_message(format!("page {sequence}"));
    }

    fn on_page_evaluated(&self, sequence: usize, dark_ratio: f64, kept: bool) {
        let mark = if kept { green("✓") } else { dim("·") };
        let verdict = if kept { "kept" } else { "blank" };
        self.bar.println(format!(
            "  {} Page {:>3}  {:<6}  {}",
            mark,
            sequence,
            verdict,
            dim(&format!("{dark_ratio:.5}"))
        ));
    }

    fn on_scan_complete(&self, scanned: usize, kept: usize) {
        self.bar.set_prefix("Merging");
        self.bar.set_message(format!("{kept} of {scanned} pages"));
    }

    fn on_document_assembled(&self, pages: usize, path: &Path) {
        self.bar.println(format!(
            "{} {} pages → {}",
            cyan("◆"),
            pages,
            dim(&path.display().to_string())
        ));
    }

    fn on_upload_attempt(&self, attempt: u32, max_attempts: u32) {
        self.bar.set_prefix("Uploading");
        self.bar
            .set_message(format!("attempt {attempt}/{max_attempts}"));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Scan with defaults (200 dpi, 3 workers)
  scanpipe

  # High resolution, documents go to <target>:invoices/scaninput/
  scanpipe --dpi 300 --prefix invoices

  # Machine-readable summary
  scanpipe --json > summary.json

EXIT STATUS (also pulsed on the status LED):
  0  success
  1  system error
  2  network error
  3  no scanner
  4  zero pages

SETUP:
  The upload target is an ssh host alias (default scanpipe-target) with
  key-based authentication. Raw pages are kept under /dev/shm, which must
  be a mounted ramdisk. Required programs: scanimage, gm, pdfunite, rsync, ssh.
"#;

/// Scan from an ADF, drop blank pages, merge to PDF and upload.
#[derive(Parser, Debug)]
#[command(
    name = "scanpipe",
    version,
    about = "Unattended scan-to-PDF pipeline with blank-page removal and upload",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Scan resolution in dots per inch (clamped to 72–600).
    #[arg(long, env = "SCANPIPE_DPI", default_value_t = 200)]
    dpi: u32,

    /// Maximum number of simultaneous single-core convert workers (1–32).
    #[arg(long, visible_alias = "cores", env = "SCANPIPE_WORKERS", default_value_t = 3)]
    workers: usize,

    /// String prepended to the PDF file name and the remote directory.
    #[arg(long, env = "SCANPIPE_PREFIX", default_value = "")]
    prefix: String,

    /// Mounted file system for raw pages.
    #[arg(long, env = "SCANPIPE_TEMP_ROOT", default_value = "/dev/shm")]
    temp_root: PathBuf,

    /// ssh host alias of the upload destination.
    #[arg(long, env = "SCANPIPE_TARGET", default_value = "scanpipe-target")]
    target: String,

    /// Upload attempts before giving up.
    #[arg(long, env = "SCANPIPE_UPLOAD_ATTEMPTS", default_value_t = 3)]
    attempts: u32,

    /// JPEG quality of the PDF pages (1–100).
    #[arg(long, env = "SCANPIPE_QUALITY", default_value_t = 70)]
    quality: u8,

    /// Sysfs directory of the status LED.
    #[arg(long, env = "SCANPIPE_LED", default_value = "/sys/class/leds/led0")]
    led: PathBuf,

    /// Unix socket a display daemon may listen on.
    #[arg(long, env = "SCANPIPE_SOCKET", default_value = "/tmp/scanpipe.sock")]
    socket: PathBuf,

    /// Print the run summary as JSON on stdout.
    #[arg(long, env = "SCANPIPE_JSON")]
    json: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "SCANPIPE_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "SCANPIPE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "SCANPIPE_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config ─────────────────────────────────────────────────────
    let progress = show_progress.then(CliProgressCallback::new);
    let progress_cb: Option<ProgressCallback> = progress
        .clone()
        .map(|cb| cb as Arc<dyn ScanProgressCallback>);
    let config = build_config(&cli, progress_cb)?;

    // ── Run session ──────────────────────────────────────────────────────
    let mut session = Session::new(&config);
    let result = tokio::select! {
        res = run(&config, &mut session) => res,
        signal = shutdown_signal() => Err(ScanError::Interrupted { signal: signal.to_string() }),
    };

    if let Some(ref p) = progress {
        p.bar.finish_and_clear();
    }
    if let Ok(ref summary) = result {
        print_summary(&cli, summary)?;
    }

    session.terminate(result.map(|_| ())).await
}

/// Map CLI args to `ScanConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ScanConfig> {
    let mut builder = ScanConfig::builder()
        .dpi(cli.dpi)
        .workers(cli.workers)
        .prefix(&cli.prefix)
        .temp_root(&cli.temp_root)
        .upload_target(&cli.target)
        .upload_attempts(cli.attempts)
        .jpeg_quality(cli.quality)
        .indicator_dir(&cli.led)
        .notify_socket(&cli.socket);

    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn print_summary(cli: &Cli, summary: &ScanSummary) -> Result<()> {
    if cli.json {
        let json =
            serde_json::to_string_pretty(summary).context("Failed to serialise summary")?;
        println!("{json}");
    } else if !cli.quiet {
        eprintln!(
            "{}  {}/{} pages kept  {} upload attempt(s)  {}ms",
            green("✔"),
            bold(&summary.pages_kept.to_string()),
            summary.pages_scanned,
            summary.upload_attempts,
            summary.duration_ms,
        );
    }
    Ok(())
}
