//! Transport module - the byte stream under a session.
//!
//! Provides:
//! - Serial port enumeration and opening (9600 8N1, settle delay)
//! - [`ByteStream`], the duplex stream bound every session strategy accepts

mod serial;

use tokio::io::{AsyncRead, AsyncWrite};

pub use serial::{
    first_port, list_ports, open, PortSummary, SerialSettings, DEFAULT_BAUD_RATE,
    DEFAULT_SETTLE_DELAY,
};

/// An open duplex byte stream: a serial port, or an in-memory link to the
/// emulated device.
pub trait ByteStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T> ByteStream for T where T: AsyncRead + AsyncWrite + Unpin + Send {}

/// Type-erased stream so one binary can drive either backend.
pub type BoxedStream = Box<dyn ByteStream>;
