//! Stdio transport: reads JSON-RPC from stdin, writes to stdout.

use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::protocol::ProtocolHandler;
use crate::types::{HostResult, RequestId};

use super::framing;

pub struct StdioTransport {
    handler: ProtocolHandler,
}

impl StdioTransport {
    pub fn new(handler: ProtocolHandler) -> Self {
        Self { handler }
    }

    pub fn handler(&self) -> &ProtocolHandler {
        &self.handler
    }

    /// Run until stdin closes. Notifications raised while handling a message
    /// are written before its response.
    pub async fn run(&self) -> HostResult<()> {
        let stdin = tokio::io::stdin();
        let mut stdout = tokio::io::stdout();
        let mut reader = BufReader::new(stdin);
        let mut line = String::new();

        tracing::info!("Stdio transport started");

        loop {
            line.clear();
            let bytes_read = reader.read_line(&mut line).await?;

            if bytes_read == 0 {
                tracing::info!("EOF on stdin, shutting down");
                break;
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let reply = match framing::parse_message(trimmed) {
                Ok(msg) => self.handler.handle_message(msg).await,
                Err(e) => {
                    tracing::warn!("Parse error: {e}");
                    Some(e.to_reply(RequestId::Null).to_value())
                }
            };

            self.flush_notifications(&mut stdout).await?;
            if let Some(reply) = reply {
                write_frame(&mut stdout, &reply).await?;
            }
        }

        self.flush_notifications(&mut stdout).await
    }

    async fn flush_notifications<W: AsyncWrite + Unpin>(&self, out: &mut W) -> HostResult<()> {
        for notification in self.handler.drain_notifications() {
            write_frame(out, &notification).await?;
        }
        Ok(())
    }
}

async fn write_frame<W: AsyncWrite + Unpin>(
    out: &mut W,
    value: &impl serde::Serialize,
) -> HostResult<()> {
    let framed = framing::frame_message(value)?;
    out.write_all(framed.as_bytes()).await?;
    out.flush().await?;
    Ok(())
}
