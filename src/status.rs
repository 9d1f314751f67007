//! Status signalling for headless stations: LED pulses and a notification socket.
//!
//! Both channels are best-effort. A station without the LED or without a
//! listening display daemon must still exit with the right status, so every
//! failure here is logged at debug level and otherwise ignored.

use crate::error::ExitCode;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::UnixStream;
use tracing::debug;

/// On and off time of one pulse.
pub const PULSE: Duration = Duration::from_millis(300);

const LED_OFF: &str = "0";
const LED_ON: &str = "255";

/// A sysfs LED (`trigger` and `brightness` files under one directory).
#[derive(Debug, Clone)]
pub struct StatusIndicator {
    dir: PathBuf,
    pulse: Duration,
}

impl StatusIndicator {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            pulse: PULSE,
        }
    }

    /// Override the pulse length (tests).
    pub fn with_pulse(mut self, pulse: Duration) -> Self {
        self.pulse = pulse;
        self
    }

    /// Pulse the LED once per unit of the exit code.
    ///
    /// The LED is detached from its kernel trigger first. Returns the number
    /// of pulses emitted; zero if the LED is not writable.
    pub async fn flash(&self, code: ExitCode) -> u8 {
        let _ = self.write("trigger", "none").await;
        if self.write("brightness", LED_OFF).await.is_err() {
            return 0;
        }

        let mut emitted = 0;
        for _ in 0..code.pulses() {
            tokio::time::sleep(self.pulse).await;
            let _ = self.write("brightness", LED_ON).await;
            tokio::time::sleep(self.pulse).await;
            let _ = self.write("brightness", LED_OFF).await;
            emitted += 1;
        }
        emitted
    }

    async fn write(&self, file: &str, value: &str) -> std::io::Result<()> {
        let path = self.dir.join(file);
        tokio::fs::write(&path, value).await.inspect_err(|e| {
            debug!("status LED {}: {}", path.display(), e);
        })
    }
}

/// Send `message` to a display daemon listening on `socket`, if any.
///
/// Returns whether the message was delivered.
pub async fn notify(socket: &Path, message: &str) -> bool {
    let mut stream = match UnixStream::connect(socket).await {
        Ok(stream) => stream,
        Err(e) => {
            debug!("no listener on {}: {}", socket.display(), e);
            return false;
        }
    };
    let sent = async {
        stream.write_all(message.as_bytes()).await?;
        stream.shutdown().await
    }
    .await;
    match sent {
        Ok(()) => true,
        Err(e) => {
            debug!("notification to {} failed: {}", socket.display(), e);
            false
        }
    }
}
