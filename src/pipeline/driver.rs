//! The two readers attached to the running scanner.
//!
//! - [`read_results`] consumes stdout: one raw page path per line. It owns
//!   the [`PageStore`] and hands it back when stdout closes.
//! - [`read_status`] consumes stderr: it logs every line, answers each
//!   `<RETURN>` prompt on stdin and then waits for the results reader to
//!   dispatch the page before reading on.
//!
//! Both read raw newline-separated bytes: backends and localized builds of
//! the scanner print status text and file names that are not UTF-8.

use crate::error::ScanError;
use crate::pipeline::handshake::{AdvanceReceiver, AdvanceSender, Handshake, HandshakeEvent};
use crate::pipeline::store::PageStore;
use crate::pipeline::worker::JobSender;
use crate::progress::ProgressCallback;
use futures::StreamExt;
use std::ffi::OsStr;
use std::os::unix::ffi::OsStrExt;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio_stream::wrappers::SplitStream;
use tracing::{debug, info, warn};

/// Printed by the scanner when no backend found a device.
pub const NO_DEVICE_PHRASE: &str = "no SANE devices found";
/// Printed by the scanner before every sheet in prompt mode.
pub const PROMPT_PHRASE: &str = "Press <RETURN> to continue";
/// Written to the scanner's stdin to answer a prompt.
pub const ACK_TOKEN: &[u8] = b"\n";

/// What a status line means to the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLine {
    NoDevice,
    Prompt,
    Other,
}

impl StatusLine {
    pub fn classify(line: &str) -> Self {
        if line.contains(NO_DEVICE_PHRASE) {
            StatusLine::NoDevice
        } else if line.contains(PROMPT_PHRASE) {
            StatusLine::Prompt
        } else {
            StatusLine::Other
        }
    }
}

/// Read page paths from the scanner's stdout until it closes.
///
/// Each path becomes a descriptor, is submitted to the worker pool (waiting
/// for a free worker) and is then announced on the advance channel. The
/// queue and advance handles are dropped on return, which lets the workers
/// and the status reader wind down.
pub async fn read_results<R>(
    stdout: R,
    queue: JobSender,
    advance: AdvanceSender,
    progress: Option<ProgressCallback>,
) -> Result<PageStore, ScanError>
where
    R: AsyncRead + Unpin,
{
    let mut lines = SplitStream::new(BufReader::new(stdout).split(b'\n'));
    let mut store = PageStore::new();

    while let Some(line) = lines.next().await {
        let line = line?;
        let path = line.trim_ascii();
        if path.is_empty() {
            continue;
        }

        let path = PathBuf::from(OsStr::from_bytes(path));
        debug!("Page {} scanned: {}", store.len() + 1, path.display());
        let job = store.append(path).job();
        if let Some(ref cb) = progress {
            cb.on_page_scanned(job.sequence);
        }

        let sequence = job.sequence;
        queue.submit(job).await?;
        if !advance.signal().await {
            debug!("status reader gone before page {} was announced", sequence);
        }
    }

    debug!("scanner output closed after {} pages", store.len());
    Ok(store)
}

/// Read status lines from the scanner's stderr until it closes.
///
/// Returns the number of prompts answered. A "no device" line ends the run
/// with [`ScanError::NoDevice`].
pub async fn read_status<R, W>(
    stderr: R,
    stdin: W,
    mut advance: AdvanceReceiver,
    ack_delay: Duration,
) -> Result<usize, ScanError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = SplitStream::new(BufReader::new(stderr).split(b'\n'));
    let mut stdin = Some(stdin);
    let mut handshake = Handshake::new();
    let mut results_open = true;

    while let Some(line) = lines.next().await {
        let line = line?;
        let line = String::from_utf8_lossy(line.trim_ascii_end());
        info!("{}", line);

        match StatusLine::classify(&line) {
            StatusLine::NoDevice => return Err(ScanError::NoDevice),
            StatusLine::Prompt if results_open => {
                handshake.apply(HandshakeEvent::Prompt)?;
                tokio::time::sleep(ack_delay).await;
                acknowledge(&mut stdin).await;
                handshake.apply(HandshakeEvent::AckWritten)?;

                if advance.wait().await {
                    handshake.apply(HandshakeEvent::Advanced)?;
                } else {
                    debug!("results reader finished; draining scanner status");
                    results_open = false;
                    stdin = None;
                }
            }
            StatusLine::Prompt => debug!("prompt after end of scan ignored"),
            StatusLine::Other => {}
        }
    }

    Ok(handshake.acknowledged())
}

async fn acknowledge<W: AsyncWrite + Unpin>(stdin: &mut Option<W>) {
    let Some(writer) = stdin.as_mut() else {
        return;
    };
    let written = async {
        writer.write_all(ACK_TOKEN).await?;
        writer.flush().await
    }
    .await;
    if let Err(e) = written {
        warn!("Could not acknowledge scanner prompt: {}", e);
        *stdin = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::handshake::advance_channel;
    use crate::pipeline::worker::job_queue;
    use tokio::io::{duplex, AsyncReadExt};
    use tokio::time::timeout;

    const SHORT: Duration = Duration::from_millis(50);

    #[test]
    fn classify_status_lines() {
        assert_eq!(
            StatusLine::classify("scanimage: no SANE devices found"),
            StatusLine::NoDevice
        );
        assert_eq!(
            StatusLine::classify("Press <RETURN> to continue."),
            StatusLine::Prompt
        );
        assert_eq!(
            StatusLine::classify("Scanning page 1"),
            StatusLine::Other
        );
    }

    #[tokio::test]
    async fn at_most_one_page_in_flight() {
        let (mut out_w, out_r) = duplex(1024);
        let (queue, jobs) = job_queue();
        let (adv_tx, mut adv_rx) = advance_channel();

        let reader = tokio::spawn(read_results(out_r, queue, adv_tx, None));
        out_w
            .write_all(b"/t/out1.pnm\n/t/out2.pnm\n")
            .await
            .unwrap();

        let first = jobs.next().await.unwrap();
        assert_eq!(first.sequence, 1);

        // Page 2 is already on stdout but must wait for the first advance.
        assert!(timeout(SHORT, jobs.next()).await.is_err());

        assert!(adv_rx.wait().await);
        let second = jobs.next().await.unwrap();
        assert_eq!(second.sequence, 2);
        assert!(adv_rx.wait().await);

        drop(out_w);
        let store = reader.await.unwrap().unwrap();
        assert_eq!(store.len(), 2);
        assert!(!adv_rx.wait().await, "advance closes with the reader");
        assert!(jobs.next().await.is_none(), "queue closes with the reader");
    }

    #[tokio::test]
    async fn blank_lines_are_skipped() {
        let (mut out_w, out_r) = duplex(1024);
        let (queue, jobs) = job_queue();
        let (adv_tx, mut adv_rx) = advance_channel();
        let reader = tokio::spawn(read_results(out_r, queue, adv_tx, None));

        out_w.write_all(b"\n  \n/t/out1.pnm\n").await.unwrap();
        drop(out_w);
        let job = jobs.next().await.unwrap();
        assert_eq!(job.source_path, PathBuf::from("/t/out1.pnm"));
        assert!(adv_rx.wait().await);

        let store = reader.await.unwrap().unwrap();
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn prompt_is_acknowledged_then_waits_for_advance() {
        let (mut err_w, err_r) = duplex(1024);
        let (in_w, mut in_r) = duplex(64);
        let (adv_tx, adv_rx) = advance_channel();

        let status = tokio::spawn(read_status(err_r, in_w, adv_rx, Duration::ZERO));
        err_w
            .write_all(b"Place document no. 1 on the scanner.\nPress <RETURN> to continue.\n")
            .await
            .unwrap();

        let mut ack = [0u8; 1];
        in_r.read_exact(&mut ack).await.unwrap();
        assert_eq!(&ack, ACK_TOKEN);

        // A second prompt is not answered before the page is announced.
        err_w
            .write_all(b"Press <RETURN> to continue.\n")
            .await
            .unwrap();
        assert!(timeout(SHORT, in_r.read_exact(&mut ack)).await.is_err());

        assert!(adv_tx.signal().await);
        in_r.read_exact(&mut ack).await.unwrap();

        drop(adv_tx);
        err_w.write_all(b"Batch terminated\n").await.unwrap();
        drop(err_w);
        assert_eq!(status.await.unwrap().unwrap(), 2);
    }

    #[tokio::test]
    async fn non_utf8_status_line_is_logged_not_fatal() {
        let (mut err_w, err_r) = duplex(1024);
        let (in_w, mut in_r) = duplex(64);
        let (adv_tx, adv_rx) = advance_channel();

        let status = tokio::spawn(read_status(err_r, in_w, adv_rx, Duration::ZERO));
        err_w
            .write_all(b"scanimage: device \xe9tat ok\r\nPress <RETURN> to continue.\n")
            .await
            .unwrap();

        let mut ack = [0u8; 1];
        in_r.read_exact(&mut ack).await.unwrap();
        assert_eq!(&ack, ACK_TOKEN);

        assert!(adv_tx.signal().await);
        drop(adv_tx);
        drop(err_w);
        assert_eq!(status.await.unwrap().unwrap(), 1);
    }

    #[tokio::test]
    async fn non_utf8_page_path_is_kept_verbatim() {
        let (mut out_w, out_r) = duplex(1024);
        let (queue, jobs) = job_queue();
        let (adv_tx, mut adv_rx) = advance_channel();
        let reader = tokio::spawn(read_results(out_r, queue, adv_tx, None));

        out_w.write_all(b"/t/d\xe9p\xf4t/out1.pnm\n").await.unwrap();
        drop(out_w);
        let job = jobs.next().await.unwrap();
        assert_eq!(
            job.source_path.as_os_str().as_bytes(),
            b"/t/d\xe9p\xf4t/out1.pnm"
        );
        assert!(adv_rx.wait().await);
        assert_eq!(reader.await.unwrap().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn no_device_aborts() {
        let (mut err_w, err_r) = duplex(1024);
        let (in_w, _in_r) = duplex(64);
        let (_adv_tx, adv_rx) = advance_channel();

        err_w
            .write_all(b"scanimage: no SANE devices found\n")
            .await
            .unwrap();
        let err = read_status(err_r, in_w, adv_rx, Duration::ZERO)
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::NoDevice));
    }

    #[tokio::test]
    async fn closed_stdin_does_not_fail_the_reader() {
        let (mut err_w, err_r) = duplex(1024);
        let (in_w, in_r) = duplex(64);
        drop(in_r);
        let (adv_tx, adv_rx) = advance_channel();
        drop(adv_tx);

        err_w
            .write_all(b"Press <RETURN> to continue.\nscanimage: sane_start: Document feeder out of documents\n")
            .await
            .unwrap();
        drop(err_w);
        assert_eq!(
            read_status(err_r, in_w, adv_rx, Duration::ZERO).await.unwrap(),
            1
        );
    }
}
