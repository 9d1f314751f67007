//! Scanner pacing: the acknowledgement handshake between the two readers.
//!
//! The scanner stops before every sheet and waits for `<RETURN>` on stdin.
//! The status reader answers that prompt, but only resumes reading after the
//! results reader has recorded the page just produced and handed it to a
//! worker. The coupling is made explicit here:
//!
//! ```text
//!            prompt seen          ack written          advance received
//!   Idle ───────────────▶ AwaitingAck ──────────▶ AwaitingAdvance ──────────▶ Idle
//! ```
//!
//! [`AdvanceSender::signal`] is a rendezvous: it returns only after the
//! status reader has taken the signal. The results reader therefore never
//! gets a second page into the worker queue while the first one is still
//! unacknowledged, and the scanner is never more than one sheet ahead of
//! the worker pool.

use crate::error::ScanError;
use tokio::sync::{mpsc, oneshot};

/// Where the status reader is in the acknowledgement cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HandshakeState {
    /// Reading status lines, no prompt pending.
    #[default]
    Idle,
    /// A prompt was seen; the acknowledgement is about to be written.
    AwaitingAck,
    /// The acknowledgement was written; waiting for the page to be dispatched.
    AwaitingAdvance,
}

/// Inputs to the handshake state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeEvent {
    Prompt,
    AckWritten,
    Advanced,
}

/// Explicit state machine owned by the status reader.
#[derive(Debug, Default)]
pub struct Handshake {
    state: HandshakeState,
    acknowledged: usize,
}

impl Handshake {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// Number of prompts answered so far.
    pub fn acknowledged(&self) -> usize {
        self.acknowledged
    }

    /// Apply an event, returning the new state or a handshake violation.
    pub fn apply(&mut self, event: HandshakeEvent) -> Result<HandshakeState, ScanError> {
        let next = match (self.state, event) {
            (HandshakeState::Idle, HandshakeEvent::Prompt) => HandshakeState::AwaitingAck,
            (HandshakeState::AwaitingAck, HandshakeEvent::AckWritten) => {
                self.acknowledged += 1;
                HandshakeState::AwaitingAdvance
            }
            (HandshakeState::AwaitingAdvance, HandshakeEvent::Advanced) => HandshakeState::Idle,
            (state, event) => {
                return Err(ScanError::Handshake(format!(
                    "{event:?} is not allowed in state {state:?}"
                )))
            }
        };
        self.state = next;
        Ok(next)
    }
}

/// Create the single-slot advance channel between the two readers.
pub fn advance_channel() -> (AdvanceSender, AdvanceReceiver) {
    let (tx, rx) = mpsc::channel(1);
    (AdvanceSender { tx }, AdvanceReceiver { rx })
}

/// Results-reader side of the advance channel.
#[derive(Debug)]
pub struct AdvanceSender {
    tx: mpsc::Sender<oneshot::Sender<()>>,
}

impl AdvanceSender {
    /// Tell the status reader the current page is dispatched.
    ///
    /// Returns once the status reader has taken the signal, or `false` if the
    /// status reader is gone.
    pub async fn signal(&self) -> bool {
        let (taken_tx, taken_rx) = oneshot::channel();
        if self.tx.send(taken_tx).await.is_err() {
            return false;
        }
        taken_rx.await.is_ok()
    }
}

/// Status-reader side of the advance channel.
#[derive(Debug)]
pub struct AdvanceReceiver {
    rx: mpsc::Receiver<oneshot::Sender<()>>,
}

impl AdvanceReceiver {
    /// Wait for the next advance. `false` means the results reader finished.
    pub async fn wait(&mut self) -> bool {
        match self.rx.recv().await {
            Some(taken) => {
                let _ = taken.send(());
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn full_cycle_returns_to_idle() {
        let mut hs = Handshake::new();
        assert_eq!(hs.state(), HandshakeState::Idle);
        assert_eq!(
            hs.apply(HandshakeEvent::Prompt).unwrap(),
            HandshakeState::AwaitingAck
        );
        assert_eq!(
            hs.apply(HandshakeEvent::AckWritten).unwrap(),
            HandshakeState::AwaitingAdvance
        );
        assert_eq!(
            hs.apply(HandshakeEvent::Advanced).unwrap(),
            HandshakeState::Idle
        );
        assert_eq!(hs.acknowledged(), 1);
    }

    #[test]
    fn second_prompt_before_advance_is_rejected() {
        let mut hs = Handshake::new();
        hs.apply(HandshakeEvent::Prompt).unwrap();
        hs.apply(HandshakeEvent::AckWritten).unwrap();
        let err = hs.apply(HandshakeEvent::Prompt).unwrap_err();
        assert!(matches!(err, ScanError::Handshake(_)));
        assert_eq!(hs.state(), HandshakeState::AwaitingAdvance);
    }

    #[test]
    fn advance_while_idle_is_rejected() {
        let mut hs = Handshake::new();
        assert!(hs.apply(HandshakeEvent::Advanced).is_err());
        assert!(hs.apply(HandshakeEvent::AckWritten).is_err());
    }

    #[tokio::test]
    async fn signal_blocks_until_taken() {
        let (tx, mut rx) = advance_channel();
        let sender = tokio::spawn(async move { tx.signal().await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!sender.is_finished(), "signal must wait for the receiver");

        assert!(rx.wait().await);
        assert!(sender.await.unwrap());
    }

    #[tokio::test]
    async fn closed_channels_unblock_both_sides() {
        let (tx, rx) = advance_channel();
        drop(rx);
        assert!(!tx.signal().await);

        let (tx, mut rx) = advance_channel();
        drop(tx);
        assert!(!rx.wait().await);
    }
}
