//! Frame buffer for accumulating partial reads on the receiving side.
//!
//! A UART delivers frames in arbitrary chunks, often one byte at a time.
//! The buffer is a small state machine:
//! - `SeekingHeader`: Variant B only, drop bytes until `0xFF`
//! - `Collecting`: gather bytes until the frame is complete
//!
//! Variant A has no delimiter, so it stays in `Collecting` and cuts every
//! three bytes.
//!
//! # Example
//!
//! ```
//! use alu_uart::protocol::{FrameBuffer, FrameVariant};
//!
//! let mut buffer = FrameBuffer::new(FrameVariant::HeaderDelimited);
//! assert!(buffer.push(&[0x00, 0xFF, 10]).is_empty());
//! let frames = buffer.push(&[15, 0x20]);
//! assert_eq!(frames.len(), 1);
//! assert_eq!(buffer.discarded(), 1);
//! ```

use bytes::BytesMut;

use super::frame::Frame;
use super::wire_format::{FrameVariant, FRAME_HEADER};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Waiting for the `0xFF` header byte.
    SeekingHeader,
    /// Inside a frame, waiting for the rest of its bytes.
    Collecting,
}

/// Buffer for accumulating incoming bytes and extracting complete frames.
pub struct FrameBuffer {
    variant: FrameVariant,
    buffer: BytesMut,
    state: State,
    /// Bytes dropped while looking for a header.
    discarded: u64,
}

impl FrameBuffer {
    pub fn new(variant: FrameVariant) -> Self {
        Self {
            variant,
            buffer: BytesMut::with_capacity(variant.frame_size() * 4),
            state: Self::initial_state(variant),
            discarded: 0,
        }
    }

    fn initial_state(variant: FrameVariant) -> State {
        match variant {
            FrameVariant::OpcodeFirst => State::Collecting,
            FrameVariant::HeaderDelimited => State::SeekingHeader,
        }
    }

    /// Push data into the buffer and extract all complete frames.
    ///
    /// Partial frames stay buffered for the next push.
    pub fn push(&mut self, data: &[u8]) -> Vec<Frame> {
        let mut frames = Vec::new();

        for &byte in data {
            if let Some(frame) = self.push_byte(byte) {
                frames.push(frame);
            }
        }

        frames
    }

    fn push_byte(&mut self, byte: u8) -> Option<Frame> {
        if self.state == State::SeekingHeader {
            if byte == FRAME_HEADER {
                self.buffer.extend_from_slice(&[byte]);
                self.state = State::Collecting;
            } else {
                self.discarded += 1;
            }
            return None;
        }

        self.buffer.extend_from_slice(&[byte]);
        if self.buffer.len() < self.variant.frame_size() {
            return None;
        }

        let raw = self.buffer.split_to(self.variant.frame_size());
        self.state = Self::initial_state(self.variant);
        // Length is exact and the header was checked on entry.
        Frame::from_bytes(self.variant, &raw)
    }

    pub fn variant(&self) -> FrameVariant {
        self.variant
    }

    /// Number of buffered bytes belonging to an incomplete frame.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Total bytes dropped while seeking a header.
    pub fn discarded(&self) -> u64 {
        self.discarded
    }

    /// Drop any partial frame and resynchronise.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.state = Self::initial_state(self.variant);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_complete_frame() {
        let mut buffer = FrameBuffer::new(FrameVariant::OpcodeFirst);
        let frames = buffer.push(&[0x20, 10, 15]);

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].as_bytes(), &[0x20, 10, 15]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_multiple_frames_in_one_push() {
        let mut buffer = FrameBuffer::new(FrameVariant::HeaderDelimited);
        let frames = buffer.push(&[0xFF, 1, 2, 0x20, 0xFF, 3, 4, 0x22]);

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].opcode(), 0x20);
        assert_eq!(frames[1].opcode(), 0x22);
        assert_eq!(frames[1].operand_a(), 3);
    }

    #[test]
    fn test_byte_at_a_time() {
        let mut buffer = FrameBuffer::new(FrameVariant::HeaderDelimited);
        let mut all_frames = Vec::new();

        for byte in [0xFF, 0x80, 0x40, 0x02] {
            all_frames.extend(buffer.push(&[byte]));
        }

        assert_eq!(all_frames.len(), 1);
        assert_eq!(all_frames[0].operand_b(), 0x40);
    }

    #[test]
    fn test_garbage_before_header_is_discarded() {
        let mut buffer = FrameBuffer::new(FrameVariant::HeaderDelimited);
        let frames = buffer.push(&[0x01, 0x02, 0x03, 0xFF, 9, 9, 0x26]);

        assert_eq!(frames.len(), 1);
        assert_eq!(buffer.discarded(), 3);
    }

    #[test]
    fn test_header_value_inside_payload() {
        // Operands may legitimately be 0xFF once the header has been seen.
        let mut buffer = FrameBuffer::new(FrameVariant::HeaderDelimited);
        let frames = buffer.push(&[0xFF, 0xFF, 0xFF, 0x24]);

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].operand_a(), 0xFF);
        assert_eq!(frames[0].operand_b(), 0xFF);
    }

    #[test]
    fn test_partial_frame_is_kept() {
        let mut buffer = FrameBuffer::new(FrameVariant::OpcodeFirst);
        assert!(buffer.push(&[0x24, 0xFF]).is_empty());
        assert_eq!(buffer.len(), 2);

        let frames = buffer.push(&[0x0F, 0x25]);
        assert_eq!(frames.len(), 1);
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn test_clear_resets_state() {
        let mut buffer = FrameBuffer::new(FrameVariant::HeaderDelimited);
        buffer.push(&[0xFF, 1]);
        assert!(!buffer.is_empty());

        buffer.clear();
        assert!(buffer.is_empty());

        // Needs a fresh header after clear.
        assert!(buffer.push(&[2, 0x20]).is_empty());
        assert_eq!(buffer.discarded(), 2);
    }
}
