//! Frontend channel
//!
//! Single outbound path to the IDE. Responses, events and verbatim
//! debuggee traffic all funnel through one mutex-guarded writer, so
//! concurrent senders (dispatch task, debuggee read loop, exit
//! watcher) are totally ordered on the wire and frames never
//! interleave.

use crate::error::{Error, Result};
use crate::protocol::{Event, ProtocolMessage};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{watch, Mutex};
use tracing::{debug, trace};

pub struct FrontendChannel {
    /// Outbound writer (stdout in production, duplex in tests)
    writer: Mutex<Box<dyn AsyncWrite + Send + Unpin>>,

    /// Next sequence number for outgoing messages
    next_seq: AtomicI64,

    /// Set once by `stop()`; later sends become no-ops
    stopped: AtomicBool,

    /// Broadcast side of the stop signal, observed by the wire loop
    stop_tx: watch::Sender<bool>,
}

impl FrontendChannel {
    pub fn new<W>(writer: W) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let (stop_tx, _) = watch::channel(false);
        Self {
            writer: Mutex::new(Box::new(writer)),
            next_seq: AtomicI64::new(1),
            stopped: AtomicBool::new(false),
            stop_tx,
        }
    }

    /// Allocate the next outgoing sequence number
    pub fn next_seq(&self) -> i64 {
        self.next_seq.fetch_add(1, Ordering::SeqCst)
    }

    /// Send a structured response or event
    pub async fn send_message(&self, message: ProtocolMessage) -> Result<()> {
        let json = serde_json::to_string(&message)?;
        self.write_frame(&json).await
    }

    /// Forward a pre-encoded debuggee message verbatim.
    ///
    /// The text is framed but never parsed; the player's payloads are
    /// opaque to the bridge.
    pub async fn send_raw(&self, text: &str) -> Result<()> {
        self.write_frame(text).await
    }

    /// Emit an `output` event with the given category and text
    pub async fn send_output(&self, category: &str, text: impl Into<String>) -> Result<()> {
        let event = Event::new(self.next_seq(), crate::constants::events::OUTPUT)
            .with_body(serde_json::json!({
                "category": category,
                "output": text.into(),
            }));
        self.send_message(ProtocolMessage::Event(event)).await
    }

    /// Stop the channel. Idempotent; subsequent sends are dropped and
    /// the wire loop observes the stop signal and exits.
    pub fn stop(&self) {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            debug!("Frontend channel stopped");
            let _ = self.stop_tx.send(true);
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Subscribe to the stop signal
    pub fn stop_signal(&self) -> watch::Receiver<bool> {
        self.stop_tx.subscribe()
    }

    /// Frame and write one message while holding the writer lock
    async fn write_frame(&self, json: &str) -> Result<()> {
        if self.is_stopped() {
            trace!("Dropping frame after stop: {}", json);
            return Ok(());
        }
        let frame = format!("Content-Length: {}\r\n\r\n{}", json.len(), json);

        let mut writer = self.writer.lock().await;
        writer
            .write_all(frame.as_bytes())
            .await
            .map_err(|e| Error::Communication(format!("frontend write failed: {}", e)))?;
        writer
            .flush()
            .await
            .map_err(|e| Error::Communication(format!("frontend flush failed: {}", e)))?;

        trace!("Sent frame: {}", json);
        Ok(())
    }
}
