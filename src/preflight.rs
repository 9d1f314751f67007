//! Fail-fast checks before any paper is fed.
//!
//! An unattended station must not pull sheets through the feeder when the
//! result cannot be stored or delivered. Everything that can be verified
//! up front is verified here, in this order:
//!
//! 1. the temp root is a mounted file system
//! 2. the session directory can be created
//! 3. the required programs are on `PATH`
//! 4. the upload alias resolves to a host and port (`ssh -G`)
//! 5. that host accepts TCP connections
//! 6. the scanner answers the capability probe (`scanimage -A`)

use crate::config::ScanConfig;
use crate::error::ScanError;
use crate::session::Session;
use crate::tools::options::scanner_options;
use crate::tools::process::{COMPRESSOR_PROGRAM, MERGER_PROGRAM, SCANNER_PROGRAM, UPLOAD_PROGRAM};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::process::Command;
use tracing::{debug, info};

/// Programs a session needs, with the package that usually provides them.
pub const REQUIRED_PROGRAMS: &[(&str, &str)] = &[
    (COMPRESSOR_PROGRAM, "install graphicsmagick"),
    (MERGER_PROGRAM, "install poppler-utils"),
    (SCANNER_PROGRAM, "install sane-utils"),
    (UPLOAD_PROGRAM, "install rsync"),
    ("ssh", "install openssh-client"),
];

static HOSTNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*hostname\s+(\S+)").expect("valid regex"));
static PORT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*port\s+(\d+)").expect("valid regex"));

/// Host and port the upload alias points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTarget {
    pub host: String,
    pub port: u16,
}

/// Run every check and return the scanner arguments for this session.
///
/// Creates the session directory as a side effect.
pub async fn run(config: &ScanConfig, session: &mut Session) -> Result<Vec<String>, ScanError> {
    check_mount(&config.temp_root).await?;
    let temp_dir = session.create_temp_dir()?;
    check_programs(REQUIRED_PROGRAMS)?;

    let target = resolve_upload_target(&config.upload_target).await?;
    probe_reachable(&target, Duration::from_millis(config.probe_timeout_ms)).await?;

    let capabilities = probe_capabilities().await?;
    let args = scanner_options(&capabilities, &temp_dir, config.dpi);
    debug!("scanner arguments: {}", args.join(" "));
    Ok(args)
}

/// `mountpoint -q <root>`.
pub async fn check_mount(root: &Path) -> Result<(), ScanError> {
    let mounted = Command::new("mountpoint")
        .arg("-q")
        .arg(root)
        .status()
        .await
        .map(|s| s.success())
        .unwrap_or(false);
    if mounted {
        Ok(())
    } else {
        Err(ScanError::StorageNotMounted {
            path: root.to_path_buf(),
        })
    }
}

/// Every program must resolve on `PATH`.
pub fn check_programs(programs: &[(&str, &str)]) -> Result<(), ScanError> {
    for (program, hint) in programs {
        let path = which::which(program).map_err(|_| missing_program(program, hint))?;
        debug!("{} → {}", program, path.display());
    }
    Ok(())
}

/// A missing scanner front end means no scanner, like a failed probe.
fn missing_program(program: &str, hint: &str) -> ScanError {
    if program == SCANNER_PROGRAM {
        ScanError::ScannerUnavailable {
            detail: format!("{program} not found on PATH ({hint})"),
        }
    } else {
        ScanError::MissingProgram {
            program: program.to_string(),
            hint: hint.to_string(),
        }
    }
}

/// Extract host and port from `ssh -G` output.
pub fn parse_ssh_config(alias: &str, config: &str) -> Result<UploadTarget, ScanError> {
    let incomplete = || ScanError::UploadTargetIncomplete {
        alias: alias.to_string(),
    };
    let host = HOSTNAME_RE
        .captures(config)
        .and_then(|c| c.get(1))
        .ok_or_else(incomplete)?
        .as_str()
        .to_string();
    let port = PORT_RE
        .captures(config)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<u16>().ok())
        .ok_or_else(incomplete)?;
    Ok(UploadTarget { host, port })
}

/// Ask ssh where `alias` points.
pub async fn resolve_upload_target(alias: &str) -> Result<UploadTarget, ScanError> {
    let unresolved = |detail: String| ScanError::UploadTargetUnresolved {
        alias: alias.to_string(),
        detail,
    };
    let output = Command::new("ssh")
        .arg("-G")
        .arg(alias)
        .output()
        .await
        .map_err(|e| unresolved(e.to_string()))?;
    if !output.status.success() {
        return Err(unresolved(format!(
            "{}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    let target = parse_ssh_config(alias, &String::from_utf8_lossy(&output.stdout))?;
    debug!("{} resolves to {}:{}", alias, target.host, target.port);
    Ok(target)
}

/// A plain TCP connect within `timeout`.
pub async fn probe_reachable(target: &UploadTarget, timeout: Duration) -> Result<(), ScanError> {
    let unreachable = |detail: String| ScanError::UploadTargetUnreachable {
        host: target.host.clone(),
        port: target.port,
        detail,
    };
    tokio::time::timeout(
        timeout,
        TcpStream::connect((target.host.as_str(), target.port)),
    )
    .await
    .map_err(|_| unreachable(format!("no answer within {}ms", timeout.as_millis())))?
    .map_err(|e| unreachable(e.to_string()))?;

    info!("Upload destination {}:{} reachable", target.host, target.port);
    Ok(())
}

/// `scanimage -A`: the device's option listing.
pub async fn probe_capabilities() -> Result<String, ScanError> {
    let output = Command::new(SCANNER_PROGRAM)
        .arg("-A")
        .stdin(std::process::Stdio::null())
        .output()
        .await
        .map_err(|e| ScanError::ScannerUnavailable {
            detail: e.to_string(),
        })?;
    if !output.status.success() {
        return Err(ScanError::ScannerUnavailable {
            detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    let listing = String::from_utf8_lossy(&output.stdout).into_owned();
    if listing.trim().is_empty() {
        return Err(ScanError::CapabilitiesMalformed {
            detail: "empty option listing".into(),
        });
    }
    Ok(listing)
}
