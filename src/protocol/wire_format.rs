//! Wire format encoding.
//!
//! Two frame layouts exist; a deployment picks exactly one.
//!
//! Variant A, opcode first (3 bytes):
//! ```text
//! ┌────────┬───────────┬───────────┐
//! │ Opcode │ Operand A │ Operand B │
//! │ 1 byte │ 1 byte    │ 1 byte    │
//! └────────┴───────────┴───────────┘
//! ```
//!
//! Variant B, header delimited (4 bytes):
//! ```text
//! ┌────────┬───────────┬───────────┬────────┐
//! │ 0xFF   │ Operand A │ Operand B │ Opcode │
//! │ 1 byte │ 1 byte    │ 1 byte    │ 1 byte │
//! └────────┴───────────┴───────────┴────────┘
//! ```
//!
//! The reply is always a single result byte.

use std::fmt;
use std::str::FromStr;

use super::command::Command;
use super::frame::Frame;

/// Header byte that opens every Variant B frame.
pub const FRAME_HEADER: u8 = 0xFF;

/// Variant A frame size in bytes.
pub const OPCODE_FIRST_FRAME_SIZE: usize = 3;

/// Variant B frame size in bytes.
pub const HEADER_DELIMITED_FRAME_SIZE: usize = 4;

/// Reply size in bytes.
pub const RESPONSE_SIZE: usize = 1;

/// Frame layout selected at configuration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FrameVariant {
    /// Variant A: `[opcode, a, b]`.
    #[default]
    OpcodeFirst,
    /// Variant B: `[0xFF, a, b, opcode]`.
    HeaderDelimited,
}

impl FrameVariant {
    /// Fixed frame length for this variant.
    #[inline]
    pub const fn frame_size(self) -> usize {
        match self {
            FrameVariant::OpcodeFirst => OPCODE_FIRST_FRAME_SIZE,
            FrameVariant::HeaderDelimited => HEADER_DELIMITED_FRAME_SIZE,
        }
    }
}

impl fmt::Display for FrameVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameVariant::OpcodeFirst => f.write_str("a"),
            FrameVariant::HeaderDelimited => f.write_str("b"),
        }
    }
}

impl FromStr for FrameVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "a" | "opcode-first" => Ok(FrameVariant::OpcodeFirst),
            "b" | "header" | "header-delimited" => Ok(FrameVariant::HeaderDelimited),
            other => Err(format!("unknown frame variant '{}' (expected a or b)", other)),
        }
    }
}

/// Encode a command into the active frame layout.
///
/// # Example
///
/// ```
/// use alu_uart::protocol::{encode, parse_line, FrameVariant};
///
/// let cmd = parse_line("add 10 15").unwrap();
/// let frame = encode(&cmd, FrameVariant::OpcodeFirst);
/// assert_eq!(frame.as_bytes(), &[0x20, 0x0A, 0x0F]);
/// ```
pub fn encode(cmd: &Command, variant: FrameVariant) -> Frame {
    let opcode = cmd.operation().opcode();
    match variant {
        FrameVariant::OpcodeFirst => {
            Frame::OpcodeFirst([opcode, cmd.operand_a(), cmd.operand_b()])
        }
        FrameVariant::HeaderDelimited => Frame::HeaderDelimited([
            FRAME_HEADER,
            cmd.operand_a(),
            cmd.operand_b(),
            opcode,
        ]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::command::parse_line;
    use crate::protocol::opcode::Operation;
    use std::collections::HashSet;

    #[test]
    fn test_encode_add_variant_a() {
        let cmd = parse_line("add 10 15").unwrap();
        let frame = encode(&cmd, FrameVariant::OpcodeFirst);
        assert_eq!(frame.as_bytes(), &[0x20, 0x0A, 0x0F]);
    }

    #[test]
    fn test_encode_xor_variant_a() {
        let cmd = parse_line("xor 170 85").unwrap();
        let frame = encode(&cmd, FrameVariant::OpcodeFirst);
        assert_eq!(frame.as_bytes(), &[0x26, 0xAA, 0x55]);
    }

    #[test]
    fn test_encode_srl_packs_shift() {
        let cmd = parse_line("srl 128 1").unwrap();
        let frame = encode(&cmd, FrameVariant::OpcodeFirst);
        assert_eq!(frame.as_bytes(), &[0x02, 0x80, 0x40]);
    }

    #[test]
    fn test_encode_variant_b() {
        let cmd = parse_line("add 10 15").unwrap();
        let frame = encode(&cmd, FrameVariant::HeaderDelimited);
        assert_eq!(frame.as_bytes(), &[0xFF, 0x0A, 0x0F, 0x20]);
    }

    #[test]
    fn test_frame_size_matches_variant() {
        let cmd = parse_line("nor 0 255").unwrap();
        for variant in [FrameVariant::OpcodeFirst, FrameVariant::HeaderDelimited] {
            assert_eq!(encode(&cmd, variant).len(), variant.frame_size());
        }
    }

    #[test]
    fn test_encode_is_deterministic() {
        let cmd = parse_line("sra 200 3").unwrap();
        let first = encode(&cmd, FrameVariant::HeaderDelimited);
        let second = encode(&cmd, FrameVariant::HeaderDelimited);
        assert_eq!(first, second);
    }

    #[test]
    fn test_encode_is_injective() {
        for variant in [FrameVariant::OpcodeFirst, FrameVariant::HeaderDelimited] {
            let mut seen = HashSet::new();
            let mut count = 0usize;
            for op in Operation::ALL {
                let b_max = if op.is_shift() { 3 } else { 255 };
                for a in 0u64..=255 {
                    for b in 0..=b_max {
                        let cmd = Command::new(op, a, b).unwrap();
                        seen.insert(encode(&cmd, variant).as_bytes().to_vec());
                        count += 1;
                    }
                }
            }
            assert_eq!(count, 6 * 256 * 256 + 2 * 256 * 4);
            assert_eq!(seen.len(), count, "collision in variant {}", variant);
        }
    }

    #[test]
    fn test_variant_from_str() {
        assert_eq!("a".parse::<FrameVariant>(), Ok(FrameVariant::OpcodeFirst));
        assert_eq!("B".parse::<FrameVariant>(), Ok(FrameVariant::HeaderDelimited));
        assert!("c".parse::<FrameVariant>().is_err());
    }
}
