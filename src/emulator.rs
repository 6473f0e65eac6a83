//! Software stand-in for the FPGA ALU.
//!
//! Speaks the same wire protocol as the hardware over any async byte stream:
//! it reassembles frames with a [`FrameBuffer`], evaluates them and writes one
//! result byte back. Frames with an opcode outside the table get no reply,
//! which is what the host sees as a timeout.
//!
//! # Example
//!
//! ```
//! use alu_uart::emulator::EmulatedAlu;
//! use alu_uart::protocol::{parse_line, FrameVariant};
//! use alu_uart::SessionBuilder;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let (host, _device) = EmulatedAlu::new(FrameVariant::OpcodeFirst).spawn();
//! let mut session = SessionBuilder::new().open(host);
//!
//! let result = session.execute(&parse_line("xor 170 85").unwrap()).await.unwrap();
//! assert_eq!(result.result, 0xFF);
//! # }
//! ```

use std::time::Duration;

use tokio::io::{duplex, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, DuplexStream};
use tokio::task::JoinHandle;

use crate::protocol::{Frame, FrameBuffer, FrameVariant, Operation, ShiftAmount};

/// In-memory link buffer between host and emulated device.
const LINK_BUFFER_SIZE: usize = 1024;

/// Evaluate an operation the way the ALU does.
///
/// `operand_b` is the wire byte, so shifts read their count from bits `[7:6]`.
/// `sra` treats operand A as a signed byte.
pub fn evaluate(op: Operation, operand_a: u8, operand_b: u8) -> u8 {
    match op {
        Operation::Add => operand_a.wrapping_add(operand_b),
        Operation::Sub => operand_a.wrapping_sub(operand_b),
        Operation::And => operand_a & operand_b,
        Operation::Or => operand_a | operand_b,
        Operation::Xor => operand_a ^ operand_b,
        Operation::Nor => !(operand_a | operand_b),
        Operation::ShrLogical => operand_a >> ShiftAmount::from_packed(operand_b).get(),
        Operation::ShrArithmetic => {
            ((operand_a as i8) >> ShiftAmount::from_packed(operand_b).get()) as u8
        }
    }
}

/// An emulated ALU device.
#[derive(Debug, Clone)]
pub struct EmulatedAlu {
    variant: FrameVariant,
    reply_delay: Option<Duration>,
}

impl EmulatedAlu {
    pub fn new(variant: FrameVariant) -> Self {
        Self {
            variant,
            reply_delay: None,
        }
    }

    /// Wait this long before answering each frame.
    pub fn with_reply_delay(mut self, delay: Duration) -> Self {
        self.reply_delay = Some(delay);
        self
    }

    pub fn variant(&self) -> FrameVariant {
        self.variant
    }

    /// Reply byte for a frame, or `None` for an unknown opcode.
    pub fn respond(&self, frame: &Frame) -> Option<u8> {
        let op = frame.operation()?;
        Some(evaluate(op, frame.operand_a(), frame.operand_b()))
    }

    /// Serve frames until the host closes the stream.
    ///
    /// Returns the number of frames answered.
    pub async fn serve<S>(self, mut stream: S) -> std::io::Result<u64>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut frames = FrameBuffer::new(self.variant);
        let mut buf = [0u8; 64];
        let mut answered = 0u64;

        loop {
            let n = stream.read(&mut buf).await?;
            if n == 0 {
                tracing::debug!("Emulated ALU: host closed link after {} frame(s)", answered);
                return Ok(answered);
            }

            for frame in frames.push(&buf[..n]) {
                let Some(reply) = self.respond(&frame) else {
                    tracing::warn!("Emulated ALU: ignoring frame with unknown opcode {}", frame);
                    continue;
                };

                if let Some(delay) = self.reply_delay {
                    tokio::time::sleep(delay).await;
                }
                stream.write_all(&[reply]).await?;
                stream.flush().await?;
                answered += 1;
            }
        }
    }

    /// Spawn the device on an in-memory link and return the host end.
    pub fn spawn(self) -> (DuplexStream, JoinHandle<std::io::Result<u64>>) {
        let (host, device) = duplex(LINK_BUFFER_SIZE);
        let task = tokio::spawn(self.serve(device));
        (host, task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{encode, parse_line};

    #[test]
    fn test_evaluate_arithmetic_wraps() {
        assert_eq!(evaluate(Operation::Add, 100, 155), 255);
        assert_eq!(evaluate(Operation::Add, 200, 100), 44);
        assert_eq!(evaluate(Operation::Sub, 50, 20), 30);
        assert_eq!(evaluate(Operation::Sub, 20, 50), 226);
    }

    #[test]
    fn test_evaluate_logical() {
        assert_eq!(evaluate(Operation::And, 0xFF, 0x0F), 0x0F);
        assert_eq!(evaluate(Operation::Or, 0xF0, 0x0F), 0xFF);
        assert_eq!(evaluate(Operation::Xor, 170, 85), 255);
        assert_eq!(evaluate(Operation::Nor, 0, 255), 0);
        assert_eq!(evaluate(Operation::Nor, 15, 240), 0);
    }

    #[test]
    fn test_evaluate_shifts_use_packed_amount() {
        assert_eq!(evaluate(Operation::ShrLogical, 128, 1 << 6), 64);
        assert_eq!(evaluate(Operation::ShrLogical, 15, 2 << 6), 3);
        assert_eq!(evaluate(Operation::ShrArithmetic, 128, 3 << 6), 0xF0);
        assert_eq!(evaluate(Operation::ShrArithmetic, 0x40, 3 << 6), 0x08);
    }

    #[test]
    fn test_respond_unknown_opcode() {
        let alu = EmulatedAlu::new(FrameVariant::OpcodeFirst);
        assert_eq!(alu.respond(&Frame::OpcodeFirst([0x3F, 1, 1])), None);
    }

    #[test]
    fn test_respond_known_frame() {
        let alu = EmulatedAlu::new(FrameVariant::HeaderDelimited);
        let cmd = parse_line("srl 128 2").unwrap();
        let frame = encode(&cmd, FrameVariant::HeaderDelimited);
        assert_eq!(alu.respond(&frame), Some(32));
    }

    #[tokio::test]
    async fn test_serve_answers_and_stops_on_close() {
        let (mut host, task) = EmulatedAlu::new(FrameVariant::OpcodeFirst).spawn();

        host.write_all(&[0x20, 2, 3, 0x22, 9, 4]).await.unwrap();
        let mut reply = [0u8; 2];
        host.read_exact(&mut reply).await.unwrap();
        assert_eq!(reply, [5, 5]);

        drop(host);
        assert_eq!(task.await.unwrap().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_serve_resyncs_on_header() {
        let (mut host, _task) = EmulatedAlu::new(FrameVariant::HeaderDelimited).spawn();

        // Leading noise is skipped until the 0xFF header.
        host.write_all(&[0x00, 0x13, 0xFF, 6, 7, 0x24]).await.unwrap();
        assert_eq!(host.read_u8().await.unwrap(), 6 & 7);
    }
}
