//! Line output for the console.
//!
//! - **stdout**: results, one per line (text or JSON)
//! - **stderr**: logs from `tracing`, never parsed
//!
//! Lines end with an explicit `\n` and are flushed immediately so a pipe on
//! the other end sees each result as soon as it is decoded.

use serde::Serialize;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::error::Result;

/// How results are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// Write a line followed by `\n` and flush.
pub async fn write_line<W>(out: &mut W, line: &str) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    out.write_all(line.as_bytes()).await?;
    out.write_all(b"\n").await?;
    out.flush().await
}

/// Write text without a newline (the prompt) and flush.
pub async fn write_prompt<W>(out: &mut W, prompt: &str) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    out.write_all(prompt.as_bytes()).await?;
    out.flush().await
}

/// Serialize a value to JSON and write it as a single line.
pub async fn write_json<W, T>(out: &mut W, value: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let json = serde_json::to_string(value)?;
    write_line(out, &json).await?;
    Ok(())
}
