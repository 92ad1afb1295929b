//! Stdio MCP session
//!
//! Newline-delimited JSON-RPC on stdin/stdout. Requests run concurrently so
//! a slow host call does not block `ping` or local tools; responses are
//! written by a single task, one line each.

use canvas_relay_core::McpServer;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

/// Serve the MCP session on the process's stdin/stdout
pub async fn run_stdio(mcp: Arc<McpServer>) -> Result<(), String> {
    info!("Starting MCP stdio session");
    let reader = BufReader::new(tokio::io::stdin());
    serve_lines(mcp, reader, tokio::io::stdout()).await?;
    info!("Stdin closed, MCP session ended");
    Ok(())
}

/// Serve newline-delimited JSON-RPC until `reader` hits EOF. Waits for
/// in-flight requests and returns the writer.
pub async fn serve_lines<R, W>(mcp: Arc<McpServer>, reader: R, writer: W) -> Result<W, String>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let writer_task = tokio::spawn(async move {
        let mut writer = writer;
        while let Some(line) = rx.recv().await {
            debug!(response = %line, "Sending response");
            writer.write_all(line.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await?;
        }
        Ok::<W, std::io::Error>(writer)
    });

    let mut lines = reader.lines();
    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| format!("Error reading stdin: {e}"))?
    {
        let line = line.trim().to_string();
        if line.is_empty() {
            continue;
        }
        debug!(request = %line, "Received request");

        let mcp = mcp.clone();
        let tx = tx.clone();
        tokio::spawn(async move {
            let Some(response) = mcp.handle_line(&line).await else {
                return;
            };
            match serde_json::to_string(&response) {
                Ok(json) => {
                    let _ = tx.send(json);
                }
                Err(e) => error!(error = %e, "Failed to encode response"),
            }
        });
    }

    // Writer ends once every in-flight request has dropped its sender
    drop(tx);
    writer_task
        .await
        .map_err(|e| format!("Writer task failed: {e}"))?
        .map_err(|e| format!("Error writing stdout: {e}"))
}
