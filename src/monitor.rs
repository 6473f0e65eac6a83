//! Raw traffic monitor: the alternative to request/response.
//!
//! The monitor consumes the stream, splits it, and runs two tasks:
//! - a reader task, the only consumer of inbound bytes, forwarding every
//!   chunk over a channel as it arrives
//! - a writer task fed by [`WriterHandle`] for fire-and-forget frames
//!
//! Nothing pairs a transmitted frame with a received byte. Because
//! [`Monitor::start`] takes the stream by value, it cannot share a stream
//! with a [`Session`](crate::Session).

use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::TransportError;
use crate::session::SessionConfig;
use crate::writer::{spawn_writer_task, WriterConfig, WriterHandle, DEFAULT_CHANNEL_CAPACITY};

/// Size of each read on the monitored stream.
const READ_CHUNK: usize = 256;

/// How long `shutdown` waits for queued frames to drain.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

type TaskResult = std::result::Result<(), TransportError>;

/// A running traffic monitor.
pub struct Monitor {
    writer: WriterHandle,
    inbound: mpsc::Receiver<Bytes>,
    reader_task: JoinHandle<TaskResult>,
    writer_task: JoinHandle<TaskResult>,
}

impl Monitor {
    /// Take over the stream and start both tasks.
    ///
    /// Uses the frame layout and pacing from `config`; the response timeout
    /// has no meaning here.
    pub fn start<S>(stream: S, config: &SessionConfig) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read_half, write_half) = tokio::io::split(stream);
        let (tx, inbound) = mpsc::channel(DEFAULT_CHANNEL_CAPACITY);

        let reader_task = tokio::spawn(read_loop(read_half, tx));
        let (writer, writer_task) = spawn_writer_task(
            write_half,
            WriterConfig {
                variant: config.variant,
                pacing: config.pacing,
                channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            },
        );

        Self {
            writer,
            inbound,
            reader_task,
            writer_task,
        }
    }

    /// Handle for transmitting frames. Cheap to clone.
    pub fn writer(&self) -> WriterHandle {
        self.writer.clone()
    }

    /// Next inbound chunk, or `None` once the stream has closed.
    pub async fn next_chunk(&mut self) -> Option<Bytes> {
        self.inbound.recv().await
    }

    /// Stop reading, let queued frames drain, release the stream.
    pub async fn shutdown(self) -> TaskResult {
        let Monitor {
            writer,
            inbound,
            reader_task,
            writer_task,
        } = self;

        drop(writer);
        drop(inbound);
        reader_task.abort();

        let abort = writer_task.abort_handle();
        match tokio::time::timeout(SHUTDOWN_GRACE, writer_task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => {
                tracing::error!("Monitor writer task panicked: {}", join_error);
                Ok(())
            }
            Err(_) => {
                // Another WriterHandle clone is still alive.
                abort.abort();
                Ok(())
            }
        }
    }
}

/// Forward inbound bytes until the stream closes or nobody listens.
async fn read_loop<R>(mut reader: R, tx: mpsc::Sender<Bytes>) -> TaskResult
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; READ_CHUNK];

    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => {
                tracing::debug!("Monitor: stream closed");
                return Ok(());
            }
            Ok(n) => n,
            Err(e) => {
                tracing::error!("Monitor read loop error: {}", e);
                return Err(TransportError::ReadFailed(e));
            }
        };

        if tx.send(Bytes::copy_from_slice(&buf[..n])).await.is_err() {
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{parse_line, FrameVariant};
    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_inbound_bytes_are_forwarded() {
        let (host, mut device) = duplex(64);
        let mut monitor = Monitor::start(host, &SessionConfig::default());

        device.write_all(&[0x19, 0xFF]).await.unwrap();

        let mut seen = Vec::new();
        while seen.len() < 2 {
            let chunk = monitor.next_chunk().await.unwrap();
            seen.extend_from_slice(&chunk);
        }
        assert_eq!(seen, vec![0x19, 0xFF]);
    }

    #[tokio::test]
    async fn test_frames_are_sent_with_configured_variant() {
        let (host, mut device) = duplex(64);
        let config = SessionConfig {
            variant: FrameVariant::HeaderDelimited,
            ..SessionConfig::default()
        };
        let monitor = Monitor::start(host, &config);

        let cmd = parse_line("add 10 15").unwrap();
        monitor.writer().send_command(&cmd).await.unwrap();

        let mut buf = [0u8; 4];
        device.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, [0xFF, 0x0A, 0x0F, 0x20]);
    }

    #[tokio::test]
    async fn test_next_chunk_none_after_close() {
        let (host, device) = duplex(64);
        let mut monitor = Monitor::start(host, &SessionConfig::default());

        drop(device);
        assert!(monitor.next_chunk().await.is_none());
    }

    #[tokio::test]
    async fn test_shutdown_flushes_queued_frames() {
        let (host, mut device) = duplex(64);
        let monitor = Monitor::start(host, &SessionConfig::default());

        let writer = monitor.writer();
        writer
            .send_command(&parse_line("nor 0 255").unwrap())
            .await
            .unwrap();
        drop(writer);

        monitor.shutdown().await.unwrap();

        let mut buf = [0u8; 3];
        device.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, [0x27, 0x00, 0xFF]);
    }
}
