//! Request/response session over an open byte stream.
//!
//! The [`SessionBuilder`] provides a fluent API for the protocol settings.
//! A [`Session`] then owns the stream for as long as the port is open and
//! runs one strict cycle per command:
//! 1. Discard stale bytes left over from a timed-out request
//! 2. Encode the command into the configured frame layout
//! 3. Write the frame, paced if configured
//! 4. Wait for one reply byte, bounded by the response timeout
//! 5. Decode it against the command that was sent
//!
//! Only one command is ever outstanding: `execute` takes `&mut self`.
//!
//! Dropping an `execute` future mid-frame does not leave a partial frame
//! behind: the next `send` or `close` writes the missing bytes first.
//!
//! # Example
//!
//! ```ignore
//! use alu_uart::{SessionBuilder, protocol::{parse_line, FrameVariant}};
//!
//! let mut session = SessionBuilder::new()
//!     .variant(FrameVariant::HeaderDelimited)
//!     .pacing(std::time::Duration::from_millis(5))
//!     .open(stream);
//!
//! let result = session.execute(&parse_line("add 10 15")?).await?;
//! println!("{}", result);
//! session.close().await?;
//! ```

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Result, TransportError};
use crate::protocol::{
    decode, encode, hex_list, Command, DecodedResult, Frame, FrameVariant, RESPONSE_SIZE,
};
use crate::writer::{write_frame_resumable, FrameProgress};

/// Default time to wait for the reply byte.
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Read chunk used while draining stale bytes.
const DRAIN_CHUNK: usize = 64;

/// Which session strategy a run uses. Exactly one reads the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionMode {
    /// Send a frame, wait for its reply, repeat.
    #[default]
    RequestResponse,
    /// Print inbound bytes as they arrive; sends are fire-and-forget.
    Monitor,
}

impl FromStr for SessionMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sync" | "request-response" => Ok(SessionMode::RequestResponse),
            "monitor" => Ok(SessionMode::Monitor),
            other => Err(format!("unknown mode '{}' (expected sync or monitor)", other)),
        }
    }
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionMode::RequestResponse => f.write_str("sync"),
            SessionMode::Monitor => f.write_str("monitor"),
        }
    }
}

/// Protocol settings shared by both session strategies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Frame layout for this deployment.
    pub variant: FrameVariant,
    /// Inter-byte delay for slow receivers.
    pub pacing: Option<Duration>,
    /// How long to wait for the reply byte.
    pub response_timeout: Duration,
    /// Drop bytes already waiting before each request.
    pub discard_stale: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            variant: FrameVariant::default(),
            pacing: None,
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
            discard_stale: true,
        }
    }
}

/// Builder for configuring and opening a [`Session`].
#[derive(Debug, Clone, Default)]
pub struct SessionBuilder {
    config: SessionConfig,
}

impl SessionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the frame layout.
    ///
    /// Default: Variant A (opcode first)
    pub fn variant(mut self, variant: FrameVariant) -> Self {
        self.config.variant = variant;
        self
    }

    /// Write frames one byte at a time with `delay` between bytes.
    pub fn pacing(mut self, delay: Duration) -> Self {
        self.config.pacing = Some(delay);
        self
    }

    /// Set the reply deadline.
    ///
    /// Default: 2 seconds
    pub fn response_timeout(mut self, timeout: Duration) -> Self {
        self.config.response_timeout = timeout;
        self
    }

    /// Enable or disable draining of stale bytes before each request.
    ///
    /// Default: enabled
    pub fn discard_stale(mut self, enabled: bool) -> Self {
        self.config.discard_stale = enabled;
        self
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn into_config(self) -> SessionConfig {
        self.config
    }

    /// Take ownership of an open stream.
    pub fn open<S>(self, stream: S) -> Session<S>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        Session::new(stream, self.config)
    }
}

/// Counters kept for the lifetime of a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Commands answered by the device.
    pub completed: u64,
    /// Commands that hit the response deadline.
    pub timeouts: u64,
    /// Unsolicited bytes dropped before a request.
    pub stale_bytes: u64,
}

/// A synchronous request/response session owning the byte stream.
pub struct Session<S> {
    stream: S,
    config: SessionConfig,
    broken: bool,
    /// Frame whose write was interrupted.
    in_flight: Option<FrameProgress>,
    stats: SessionStats,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, config: SessionConfig) -> Self {
        Self {
            stream,
            config,
            broken: false,
            in_flight: None,
            stats: SessionStats::default(),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// True after a failed write; the session then refuses new frames.
    pub fn is_broken(&self) -> bool {
        self.broken
    }

    /// Put a frame on the wire.
    ///
    /// A failure marks the session broken. Later calls fail fast with
    /// `SessionBroken` instead of writing the tail of some other frame.
    pub async fn send(
        &mut self,
        frame: &Frame,
        pacing: Option<Duration>,
    ) -> std::result::Result<(), TransportError> {
        if self.broken {
            return Err(TransportError::SessionBroken);
        }
        self.finish_in_flight().await?;

        tracing::debug!("TX: {}", frame);
        let progress = self.in_flight.insert(FrameProgress::new(*frame));
        let result = write_frame_resumable(&mut self.stream, progress, pacing).await;
        self.in_flight = None;
        if result.is_err() {
            self.broken = true;
        }
        result
    }

    /// Write the rest of a frame whose `send` was dropped part-way.
    async fn finish_in_flight(&mut self) -> std::result::Result<(), TransportError> {
        let Some(progress) = self.in_flight.as_mut() else {
            return Ok(());
        };

        tracing::warn!(
            "Completing interrupted frame {} ({} of {} bytes sent)",
            progress.frame(),
            progress.written(),
            progress.frame().len()
        );
        let result = write_frame_resumable(&mut self.stream, progress, None).await;
        self.in_flight = None;
        if result.is_err() {
            self.broken = true;
        }
        result
    }

    /// Wait for a single reply byte.
    ///
    /// The read future is dropped at the deadline, so nothing is consumed
    /// after `Timeout` is returned and the session stays usable.
    pub async fn receive_one_byte(
        &mut self,
        deadline: Duration,
    ) -> std::result::Result<u8, TransportError> {
        let mut reply = [0u8; RESPONSE_SIZE];
        match tokio::time::timeout(deadline, self.stream.read_exact(&mut reply)).await {
            Ok(Ok(_)) => {
                tracing::debug!("RX: 0x{:02X}", reply[0]);
                Ok(reply[0])
            }
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                Err(TransportError::ConnectionClosed)
            }
            Ok(Err(e)) => Err(TransportError::ReadFailed(e)),
            Err(_) => Err(TransportError::Timeout(deadline)),
        }
    }

    /// Drain whatever is already waiting on the stream without blocking.
    ///
    /// Returns the number of bytes dropped. These are late replies to
    /// earlier, timed-out commands.
    pub async fn discard_stale(&mut self) -> std::result::Result<usize, TransportError> {
        let mut total = 0;
        let mut buf = [0u8; DRAIN_CHUNK];

        loop {
            match tokio::time::timeout(Duration::ZERO, self.stream.read(&mut buf)).await {
                Ok(Ok(0)) | Err(_) => break,
                Ok(Ok(n)) => {
                    tracing::warn!("Discarding {} stale byte(s): {}", n, hex_list(&buf[..n]));
                    total += n;
                }
                Ok(Err(e)) => return Err(TransportError::ReadFailed(e)),
            }
        }

        self.stats.stale_bytes += total as u64;
        Ok(total)
    }

    /// Run one full request/response cycle.
    pub async fn execute(&mut self, cmd: &Command) -> Result<DecodedResult> {
        if self.config.discard_stale {
            self.discard_stale().await?;
        }

        let frame = encode(cmd, self.config.variant);
        self.send(&frame, self.config.pacing).await?;

        let raw = match self.receive_one_byte(self.config.response_timeout).await {
            Ok(raw) => raw,
            Err(e) => {
                if let TransportError::Timeout(_) = e {
                    self.stats.timeouts += 1;
                    // The device may or may not have executed the frame.
                    tracing::warn!("No reply to {} {}", cmd.operation(), frame);
                }
                return Err(e.into());
            }
        };

        self.stats.completed += 1;
        Ok(decode(cmd, raw))
    }

    /// Shut the stream down and release it.
    ///
    /// Bytes that arrive afterwards are never seen by another session.
    pub async fn close(mut self) -> Result<()> {
        if !self.broken {
            if let Err(e) = self.finish_in_flight().await {
                tracing::warn!("Could not complete interrupted frame: {}", e);
            }
        }
        tracing::debug!(
            "Closing session: {} completed, {} timed out",
            self.stats.completed,
            self.stats.timeouts
        );
        self.stream.shutdown().await?;
        Ok(())
    }
}
