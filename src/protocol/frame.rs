//! Frame type with typed accessors.
//!
//! A frame is a fixed-size array per variant, so a frame of the wrong length
//! cannot be built.
//!
//! # Example
//!
//! ```
//! use alu_uart::protocol::{Frame, FrameVariant};
//!
//! let frame = Frame::from_bytes(FrameVariant::HeaderDelimited, &[0xFF, 1, 2, 0x20]).unwrap();
//! assert_eq!(frame.opcode(), 0x20);
//! assert_eq!(frame.operand_a(), 1);
//! assert_eq!(frame.operand_b(), 2);
//! ```

use std::fmt;

use super::opcode::Operation;
use super::wire_format::{
    FrameVariant, FRAME_HEADER, HEADER_DELIMITED_FRAME_SIZE, OPCODE_FIRST_FRAME_SIZE,
};

/// The exact bytes transmitted for one command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Frame {
    /// `[opcode, a, b]`
    OpcodeFirst([u8; OPCODE_FIRST_FRAME_SIZE]),
    /// `[0xFF, a, b, opcode]`
    HeaderDelimited([u8; HEADER_DELIMITED_FRAME_SIZE]),
}

impl Frame {
    /// Rebuild a frame from received bytes.
    ///
    /// Returns `None` when the length does not match the variant or a
    /// Variant B frame does not start with the header byte.
    pub fn from_bytes(variant: FrameVariant, bytes: &[u8]) -> Option<Self> {
        match variant {
            FrameVariant::OpcodeFirst => bytes.try_into().ok().map(Frame::OpcodeFirst),
            FrameVariant::HeaderDelimited => {
                let raw: [u8; HEADER_DELIMITED_FRAME_SIZE] = bytes.try_into().ok()?;
                (raw[0] == FRAME_HEADER).then_some(Frame::HeaderDelimited(raw))
            }
        }
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Frame::OpcodeFirst(b) => b,
            Frame::HeaderDelimited(b) => b,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    /// Always false; present for API symmetry with `len`.
    #[inline]
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn variant(&self) -> FrameVariant {
        match self {
            Frame::OpcodeFirst(_) => FrameVariant::OpcodeFirst,
            Frame::HeaderDelimited(_) => FrameVariant::HeaderDelimited,
        }
    }

    /// Raw opcode byte.
    pub fn opcode(&self) -> u8 {
        match self {
            Frame::OpcodeFirst(b) => b[0],
            Frame::HeaderDelimited(b) => b[3],
        }
    }

    pub fn operand_a(&self) -> u8 {
        match self {
            Frame::OpcodeFirst(b) => b[1],
            Frame::HeaderDelimited(b) => b[1],
        }
    }

    /// Operand B as transmitted (packed for shifts).
    pub fn operand_b(&self) -> u8 {
        match self {
            Frame::OpcodeFirst(b) => b[2],
            Frame::HeaderDelimited(b) => b[2],
        }
    }

    /// The operation named by the opcode, if it is in the table.
    pub fn operation(&self) -> Option<Operation> {
        Operation::from_opcode(self.opcode())
    }
}

impl AsRef<[u8]> for Frame {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

/// Hex dump in the form `[0x20, 0x0A, 0x0F]`.
impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_hex_list(f, self.as_bytes())
    }
}

/// Format bytes as `[0x.., 0x..]`.
pub fn write_hex_list(f: &mut impl fmt::Write, bytes: &[u8]) -> fmt::Result {
    f.write_char('[')?;
    for (i, b) in bytes.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "0x{:02X}", b)?;
    }
    f.write_char(']')
}

/// Convenience wrapper over [`write_hex_list`].
pub fn hex_list(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 6 + 2);
    let _ = write_hex_list(&mut out, bytes);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessors_variant_a() {
        let frame = Frame::OpcodeFirst([0x26, 0xAA, 0x55]);
        assert_eq!(frame.opcode(), 0x26);
        assert_eq!(frame.operand_a(), 0xAA);
        assert_eq!(frame.operand_b(), 0x55);
        assert_eq!(frame.operation(), Some(Operation::Xor));
        assert_eq!(frame.variant(), FrameVariant::OpcodeFirst);
    }

    #[test]
    fn test_accessors_variant_b() {
        let frame = Frame::HeaderDelimited([0xFF, 0x80, 0x40, 0x02]);
        assert_eq!(frame.opcode(), 0x02);
        assert_eq!(frame.operand_a(), 0x80);
        assert_eq!(frame.operand_b(), 0x40);
        assert_eq!(frame.operation(), Some(Operation::ShrLogical));
    }

    #[test]
    fn test_from_bytes_rejects_wrong_length() {
        assert!(Frame::from_bytes(FrameVariant::OpcodeFirst, &[1, 2]).is_none());
        assert!(Frame::from_bytes(FrameVariant::OpcodeFirst, &[1, 2, 3, 4]).is_none());
        assert!(Frame::from_bytes(FrameVariant::HeaderDelimited, &[0xFF, 1, 2]).is_none());
    }

    #[test]
    fn test_from_bytes_requires_header() {
        assert!(Frame::from_bytes(FrameVariant::HeaderDelimited, &[0x00, 1, 2, 0x20]).is_none());
        assert!(Frame::from_bytes(FrameVariant::HeaderDelimited, &[0xFF, 1, 2, 0x20]).is_some());
    }

    #[test]
    fn test_unknown_opcode_has_no_operation() {
        let frame = Frame::OpcodeFirst([0x3F, 0, 0]);
        assert_eq!(frame.operation(), None);
    }

    #[test]
    fn test_display_hex() {
        let frame = Frame::OpcodeFirst([0x20, 0x0A, 0x0F]);
        assert_eq!(frame.to_string(), "[0x20, 0x0A, 0x0F]");
        assert_eq!(hex_list(&[]), "[]");
    }
}
