//! Content-Length framed request reader for the stdio frontend wire.
//!
//! Keeps the original body text alongside the decoded request so
//! pass-through commands can be forwarded byte for byte.

use anyhow::{bail, Context};
use gdap::{ProtocolMessage, RawRequest};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

/// Read one framed request. `Ok(None)` means the frontend closed the
/// stream cleanly between messages.
pub async fn read_request<R: AsyncBufRead + Unpin>(
    reader: &mut R,
) -> anyhow::Result<Option<RawRequest>> {
    let mut content_length: Option<usize> = None;

    loop {
        let mut line = String::new();
        let n = reader
            .read_line(&mut line)
            .await
            .context("failed to read message header")?;
        if n == 0 {
            if content_length.is_some() {
                bail!("stream ended inside a message header");
            }
            return Ok(None);
        }

        let line = line.trim_end();
        if line.is_empty() {
            if content_length.is_none() {
                bail!("message without Content-Length header");
            }
            break;
        }
        if let Some(value) = line.strip_prefix("Content-Length:") {
            content_length = Some(
                value
                    .trim()
                    .parse()
                    .with_context(|| format!("invalid Content-Length header: '{}'", line))?,
            );
        }
        // Other headers (Content-Type etc.) are ignored
    }

    let Some(length) = content_length else {
        bail!("message without Content-Length header");
    };
    let mut body = vec![0u8; length];
    reader
        .read_exact(&mut body)
        .await
        .context("failed to read message body")?;
    let raw = String::from_utf8(body).context("message body is not valid UTF-8")?;

    let message: ProtocolMessage =
        serde_json::from_str(&raw).with_context(|| format!("invalid protocol message: {}", raw))?;
    match message {
        ProtocolMessage::Request(request) => Ok(Some(RawRequest::new(request, raw))),
        ProtocolMessage::Response(_) => bail!("unexpected response message from frontend"),
        ProtocolMessage::Event(_) => bail!("unexpected event message from frontend"),
    }
}
