//! Frame writing: the paced write primitive and a dedicated writer task.
//!
//! [`write_frame`] is the single place bytes leave the host. The synchronous
//! session calls it directly; the traffic monitor runs it inside a writer task
//! fed by an mpsc channel so the console never blocks on a slow UART.
//!
//! ```text
//! Console ─► WriterHandle ─► mpsc::Sender<Frame> ─► Writer Task ─► UART
//! ```

use std::time::Duration;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::TransportError;
use crate::protocol::{encode, Command, Frame, FrameVariant};

/// Default channel capacity for queued frames.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// A frame together with how many of its bytes are already on the wire.
///
/// A write future dropped between bytes leaves the progress behind, so the
/// owner can finish the frame later instead of leaving the receiver out of
/// sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameProgress {
    frame: Frame,
    written: usize,
}

impl FrameProgress {
    pub fn new(frame: Frame) -> Self {
        Self { frame, written: 0 }
    }

    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    /// Bytes accepted by the stream so far.
    pub fn written(&self) -> usize {
        self.written
    }

    pub fn remaining(&self) -> &[u8] {
        &self.frame.as_bytes()[self.written..]
    }

    pub fn is_complete(&self) -> bool {
        self.written == self.frame.len()
    }
}

/// Write one frame, optionally one byte at a time.
///
/// With `pacing`, every byte is written and flushed on its own and the task
/// sleeps for `pacing` between bytes (not after the last one). Without it the
/// frame goes out in as few writes as the stream allows. Errors are never
/// retried: a frame cut short leaves the receiver out of sync.
pub async fn write_frame<W>(
    writer: &mut W,
    frame: &Frame,
    pacing: Option<Duration>,
) -> std::result::Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
{
    let mut progress = FrameProgress::new(*frame);
    write_frame_resumable(writer, &mut progress, pacing).await
}

/// Write the unsent part of a frame, recording progress after every write.
///
/// Dropping the future never loses track of which bytes went out; calling
/// again with the same `progress` continues where it stopped.
pub async fn write_frame_resumable<W>(
    writer: &mut W,
    progress: &mut FrameProgress,
    pacing: Option<Duration>,
) -> std::result::Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
{
    while !progress.is_complete() {
        let chunk = match pacing {
            Some(delay) => {
                if progress.written > 0 {
                    tokio::time::sleep(delay).await;
                }
                &progress.remaining()[..1]
            }
            None => progress.remaining(),
        };

        let n = writer.write(chunk).await.map_err(TransportError::WriteFailed)?;
        if n == 0 {
            return Err(TransportError::WriteFailed(
                std::io::ErrorKind::WriteZero.into(),
            ));
        }
        progress.written += n;

        if pacing.is_some() {
            writer.flush().await.map_err(TransportError::WriteFailed)?;
        }
    }

    if pacing.is_none() {
        writer.flush().await.map_err(TransportError::WriteFailed)?;
    }
    Ok(())
}

/// Configuration for the writer task.
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Frame layout used to encode commands.
    pub variant: FrameVariant,
    /// Inter-byte delay, if any.
    pub pacing: Option<Duration>,
    /// Channel capacity for the frame queue.
    pub channel_capacity: usize,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            variant: FrameVariant::default(),
            pacing: None,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

/// Handle for queueing frames on the writer task.
///
/// Cheaply cloneable. Sends are fire-and-forget: nothing correlates a queued
/// frame with whatever the device sends back.
#[derive(Clone)]
pub struct WriterHandle {
    tx: mpsc::Sender<Frame>,
    variant: FrameVariant,
}

impl WriterHandle {
    /// Encode a command with the configured layout and queue it.
    pub async fn send_command(&self, cmd: &Command) -> std::result::Result<Frame, TransportError> {
        let frame = encode(cmd, self.variant);
        self.send(frame).await?;
        Ok(frame)
    }

    /// Queue a pre-encoded frame.
    ///
    /// Fails with `SessionBroken` once the writer task has stopped.
    pub async fn send(&self, frame: Frame) -> std::result::Result<(), TransportError> {
        self.tx
            .send(frame)
            .await
            .map_err(|_| TransportError::SessionBroken)
    }

    pub fn variant(&self) -> FrameVariant {
        self.variant
    }

    /// Whether the writer task is gone.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Spawn the writer task and return a handle for sending frames.
///
/// The task ends cleanly when every handle is dropped, or with
/// `WriteFailed` on the first write error.
pub fn spawn_writer_task<W>(
    writer: W,
    config: WriterConfig,
) -> (WriterHandle, JoinHandle<std::result::Result<(), TransportError>>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(config.channel_capacity);
    let handle = WriterHandle {
        tx,
        variant: config.variant,
    };
    let task = tokio::spawn(writer_loop(rx, writer, config.pacing));
    (handle, task)
}

async fn writer_loop<W>(
    mut rx: mpsc::Receiver<Frame>,
    mut writer: W,
    pacing: Option<Duration>,
) -> std::result::Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
{
    while let Some(frame) = rx.recv().await {
        tracing::debug!("TX: {}", frame);
        if let Err(e) = write_frame(&mut writer, &frame, pacing).await {
            tracing::error!("Writer task stopped: {}", e);
            return Err(e);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::parse_line;
    use tokio::io::{duplex, AsyncReadExt};
    use tokio::time::Instant;

    fn add_frame() -> Frame {
        Frame::OpcodeFirst([0x20, 0x0A, 0x0F])
    }

    #[tokio::test]
    async fn test_write_frame_unpaced() {
        let mut buf = std::io::Cursor::new(Vec::new());
        write_frame(&mut buf, &add_frame(), None).await.unwrap();
        assert_eq!(buf.into_inner(), vec![0x20, 0x0A, 0x0F]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_frame_paced_sleeps_between_bytes() {
        let mut buf = std::io::Cursor::new(Vec::new());
        let start = Instant::now();

        write_frame(&mut buf, &add_frame(), Some(Duration::from_millis(10)))
            .await
            .unwrap();

        // Three bytes, two gaps.
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(20), "elapsed {:?}", elapsed);
        assert!(elapsed < Duration::from_millis(30), "elapsed {:?}", elapsed);
        assert_eq!(buf.into_inner(), vec![0x20, 0x0A, 0x0F]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_paced_write_resumes_where_it_stopped() {
        let (mut host, mut device) = duplex(64);
        let mut progress = FrameProgress::new(add_frame());
        let pacing = Some(Duration::from_millis(10));

        let cut = tokio::time::timeout(
            Duration::from_millis(15),
            write_frame_resumable(&mut host, &mut progress, pacing),
        )
        .await;
        assert!(cut.is_err());
        assert_eq!(progress.written(), 2);
        assert_eq!(progress.remaining(), &[0x0F]);

        write_frame_resumable(&mut host, &mut progress, None)
            .await
            .unwrap();
        assert!(progress.is_complete());

        drop(host);
        let mut seen = Vec::new();
        device.read_to_end(&mut seen).await.unwrap();
        assert_eq!(seen, vec![0x20, 0x0A, 0x0F]);
    }

    #[tokio::test]
    async fn test_write_frame_to_closed_peer_fails() {
        let (mut host, device) = duplex(64);
        drop(device);

        let result = write_frame(&mut host, &add_frame(), None).await;
        assert!(matches!(result, Err(TransportError::WriteFailed(_))));
    }

    #[tokio::test]
    async fn test_writer_handle_send_command() {
        let (host, mut device) = duplex(64);
        let config = WriterConfig {
            variant: FrameVariant::HeaderDelimited,
            ..WriterConfig::default()
        };
        let (handle, _task) = spawn_writer_task(host, config);

        let cmd = parse_line("xor 170 85").unwrap();
        let frame = handle.send_command(&cmd).await.unwrap();
        assert_eq!(frame.as_bytes(), &[0xFF, 0xAA, 0x55, 0x26]);

        let mut buf = [0u8; 4];
        device.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, [0xFF, 0xAA, 0x55, 0x26]);
    }

    #[tokio::test]
    async fn test_writer_preserves_frame_order() {
        let (host, mut device) = duplex(256);
        let (handle, _task) = spawn_writer_task(host, WriterConfig::default());

        for line in ["add 1 2", "sub 3 4", "or 5 6"] {
            handle.send_command(&parse_line(line).unwrap()).await.unwrap();
        }

        let mut buf = [0u8; 9];
        device.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, [0x20, 1, 2, 0x22, 3, 4, 0x25, 5, 6]);
    }

    #[tokio::test]
    async fn test_writer_shutdown_on_channel_close() {
        let (host, _device) = duplex(64);
        let (handle, task) = spawn_writer_task(host, WriterConfig::default());

        drop(handle);

        let result = task.await.unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_send_after_write_failure_reports_broken() {
        let (host, device) = duplex(64);
        drop(device);
        let (handle, task) = spawn_writer_task(host, WriterConfig::default());

        handle.send(add_frame()).await.unwrap();
        let result = task.await.unwrap();
        assert!(matches!(result, Err(TransportError::WriteFailed(_))));

        assert!(handle.is_closed());
        assert!(matches!(
            handle.send(add_frame()).await,
            Err(TransportError::SessionBroken)
        ));
    }
}
