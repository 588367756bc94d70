//! Debuggee channel
//!
//! Owns the one TCP connection to the Gideros player: a mutex-guarded
//! outbound path for the handshake and all forwarded commands, and a
//! background read loop that relays every inbound line to the frontend
//! verbatim. The player's framing is newline-delimited JSON; its
//! payloads are opaque to the bridge.

use crate::constants;
use crate::error::{Error, Result};
use crate::frontend::FrontendChannel;
use crate::session::TerminationSignal;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, info, trace};

pub struct DebuggeeChannel {
    writer: Mutex<OwnedWriteHalf>,
    reader_task: Option<tokio::task::JoinHandle<()>>,
}

impl DebuggeeChannel {
    /// Take ownership of an accepted player socket.
    ///
    /// The welcome handshake is written and flushed before the read
    /// loop is spawned, so an eager player message can never overtake
    /// it.
    pub async fn start(
        stream: TcpStream,
        source_base_path: &str,
        frontend: Arc<FrontendChannel>,
        termination: TerminationSignal,
    ) -> Result<Self> {
        let (read_half, write_half) = stream.into_split();
        let mut writer = write_half;

        let welcome = serde_json::json!({
            "command": constants::WELCOME_COMMAND,
            "sourceBasePath": source_base_path,
        })
        .to_string();
        debug!(welcome = %welcome, "Sending handshake");
        write_line(&mut writer, &welcome).await?;

        let reader_task = tokio::spawn(read_loop(read_half, frontend, termination));

        Ok(Self {
            writer: Mutex::new(writer),
            reader_task: Some(reader_task),
        })
    }

    /// Write one protocol line to the player.
    ///
    /// Used for every forwarded command; sends preserve the order the
    /// dispatcher issued them because the dispatcher is serialized.
    pub async fn send(&self, text: &str) -> Result<()> {
        let mut writer = self.writer.lock().await;
        write_line(&mut writer, text).await
    }
}

impl Drop for DebuggeeChannel {
    fn drop(&mut self) {
        if let Some(task) = self.reader_task.take() {
            task.abort();
        }
    }
}

async fn write_line(writer: &mut OwnedWriteHalf, text: &str) -> Result<()> {
    writer
        .write_all(text.as_bytes())
        .await
        .map_err(|e| Error::Communication(format!("player write failed: {}", e)))?;
    writer
        .write_all(b"\n")
        .await
        .map_err(|e| Error::Communication(format!("player write failed: {}", e)))?;
    writer
        .flush()
        .await
        .map_err(|e| Error::Communication(format!("player flush failed: {}", e)))?;
    trace!("Sent to player: {}", text);
    Ok(())
}

/// Forward inbound player messages until the connection ends.
///
/// Messages are relayed one at a time in arrival order; no batching,
/// no parsing. The termination signal is idempotent, so racing the
/// session's own teardown is harmless.
async fn read_loop(
    read_half: OwnedReadHalf,
    frontend: Arc<FrontendChannel>,
    termination: TerminationSignal,
) {
    debug!("Player read loop started");
    let mut lines = BufReader::new(read_half).lines();

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if line.is_empty() {
                    continue;
                }
                trace!("Relaying player message: {}", line);
                if let Err(e) = frontend.send_raw(&line).await {
                    info!("Frontend relay failed, ending read loop: {}", e);
                    break;
                }
            }
            Ok(None) => {
                info!("Player connection closed (EOF)");
                break;
            }
            Err(e) => {
                info!("Player connection error: {}", e);
                break;
            }
        }
    }

    termination.fire().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionState;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;
    use tokio::sync::Mutex as TokioMutex;

    async fn tcp_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let connect = tokio::spawn(async move { TcpStream::connect(addr).await.unwrap() });
        let (accepted, _) = listener.accept().await.unwrap();
        (accepted, connect.await.unwrap())
    }

    fn test_signal(frontend: &Arc<FrontendChannel>) -> TerminationSignal {
        TerminationSignal::new(
            frontend.clone(),
            Arc::new(TokioMutex::new(SessionState::Connected)),
        )
    }

    async fn frontend_output(stream: tokio::io::DuplexStream, frontend: Arc<FrontendChannel>) -> String {
        drop(frontend);
        let mut reader = stream;
        let mut out = String::new();
        reader.read_to_string(&mut out).await.unwrap();
        out
    }

    #[tokio::test]
    async fn test_welcome_is_sent_before_any_relay() {
        let (adapter_side, mut player_side) = tcp_pair().await;
        let (near, _far) = tokio::io::duplex(4096);
        let frontend = Arc::new(FrontendChannel::new(near));
        let termination = test_signal(&frontend);

        // Player speaks first, on the same tick as the accept
        player_side.write_all(b"{\"eager\":true}\n").await.unwrap();

        let _channel = DebuggeeChannel::start(adapter_side, "/proj", frontend, termination)
            .await
            .unwrap();

        let mut reader = BufReader::new(player_side).lines();
        let first = reader.next_line().await.unwrap().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&first).unwrap();
        assert_eq!(parsed["command"], "welcome");
        assert_eq!(parsed["sourceBasePath"], "/proj");
    }

    #[tokio::test]
    async fn test_inbound_messages_relayed_verbatim_in_order() {
        let (adapter_side, mut player_side) = tcp_pair().await;
        let (near, far) = tokio::io::duplex(64 * 1024);
        let frontend = Arc::new(FrontendChannel::new(near));
        let termination = test_signal(&frontend);

        let channel = DebuggeeChannel::start(adapter_side, "/proj", frontend.clone(), termination)
            .await
            .unwrap();

        let first = r#"{"type":"event","event":"stopped","body":{"reason":"breakpoint"}}"#;
        let second = r#"{"type":"response","request_seq":4,"command":"next","success":true}"#;
        player_side
            .write_all(format!("{}\n{}\n", first, second).as_bytes())
            .await
            .unwrap();
        player_side.shutdown().await.unwrap();

        // Wait until the read loop drains the connection
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        drop(channel);

        let out = frontend_output(far, frontend).await;
        let first_pos = out.find(first).expect("first message relayed");
        let second_pos = out.find(second).expect("second message relayed");
        assert!(first_pos < second_pos, "relay must preserve arrival order");
    }

    #[tokio::test]
    async fn test_connection_loss_fires_termination_once() {
        let (adapter_side, player_side) = tcp_pair().await;
        let (near, far) = tokio::io::duplex(4096);
        let frontend = Arc::new(FrontendChannel::new(near));
        let state = Arc::new(TokioMutex::new(SessionState::Connected));
        let termination = TerminationSignal::new(frontend.clone(), state.clone());

        let channel = DebuggeeChannel::start(
            adapter_side,
            "/proj",
            frontend.clone(),
            termination.clone(),
        )
        .await
        .unwrap();

        drop(player_side);
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        // A second fire is ignored
        termination.fire().await;

        assert_eq!(*state.lock().await, SessionState::Terminated);
        drop(channel);
        // The signal holds a frontend handle; release it so the
        // frontend stream can reach EOF
        drop(termination);

        let out = frontend_output(far, frontend).await;
        assert_eq!(out.matches(r#""event":"terminated"#).count(), 1);
    }

    #[tokio::test]
    async fn test_send_writes_newline_terminated_text() {
        let (adapter_side, player_side) = tcp_pair().await;
        let (near, _far) = tokio::io::duplex(4096);
        let frontend = Arc::new(FrontendChannel::new(near));
        let termination = test_signal(&frontend);

        let channel = DebuggeeChannel::start(adapter_side, "/proj", frontend, termination)
            .await
            .unwrap();

        let raw = r#"{"seq":9,"type":"request","command":"next"}"#;
        channel.send(raw).await.unwrap();

        let mut reader = BufReader::new(player_side).lines();
        let welcome = reader.next_line().await.unwrap().unwrap();
        assert!(welcome.contains("welcome"));
        let forwarded = reader.next_line().await.unwrap().unwrap();
        assert_eq!(forwarded, raw);
    }
}
