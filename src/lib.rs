//! # alu-uart
//!
//! Host-side controller for an 8-bit ALU on an FPGA, reached over a UART.
//!
//! Each command is encoded into a fixed-size frame, written to the serial
//! link, and answered by exactly one result byte.
//!
//! ## Architecture
//!
//! - **Protocol**: opcode table, command parsing, frame layouts A and B,
//!   reply decoding
//! - **Session**: one request/response cycle at a time with a deadline
//! - **Monitor**: fire-and-forget writes with a background reader
//! - **Transport**: serial port discovery and opening; any duplex stream works
//!
//! ## Example
//!
//! ```ignore
//! use alu_uart::{parse_line, transport, SessionBuilder};
//!
//! #[tokio::main]
//! async fn main() -> alu_uart::Result<()> {
//!     let port = transport::first_port()?;
//!     let stream = transport::open(&transport::SerialSettings::new(port)).await?;
//!     let mut session = SessionBuilder::new().open(stream);
//!
//!     let result = session.execute(&parse_line("add 10 15")?).await?;
//!     println!("{}", result);
//!
//!     session.close().await
//! }
//! ```

pub mod console;
pub mod emulator;
pub mod error;
pub mod monitor;
pub mod protocol;
pub mod session;
pub mod transport;
pub mod writer;

pub use emulator::EmulatedAlu;
pub use error::{AluError, ParseError, Result, TransportError};
pub use monitor::Monitor;
pub use protocol::{decode, encode, parse_line, Command, DecodedResult, Frame, FrameVariant, Operation};
pub use session::{Session, SessionBuilder, SessionConfig, SessionMode, SessionStats};
pub use writer::WriterHandle;
