//! Response decoding and presentation.
//!
//! The device answers every frame with one byte. How that byte is shown
//! depends on the operation class:
//!
//! - arithmetic: `55 (0x37)`
//! - logical: `255 (0b11111111) (0xFF)`
//! - shift: `64 (0b01000000) (128 shifted right by 1)`
//!
//! The shift amount comes from the [`Command`] that produced the frame. The
//! result byte says nothing about it.

use std::fmt;

use serde::Serialize;

use super::command::Command;
use super::opcode::{Operation, OperationClass};

/// A result byte paired with the request context needed to present it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DecodedResult {
    pub operation: Operation,
    pub operand_a: u8,
    /// Raw byte returned by the device.
    pub result: u8,
    /// Requested shift count for shift operations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shift_amount: Option<u8>,
}

/// Decode a reply byte for the command that was sent.
pub fn decode(cmd: &Command, raw: u8) -> DecodedResult {
    DecodedResult {
        operation: cmd.operation(),
        operand_a: cmd.operand_a(),
        result: raw,
        shift_amount: cmd.shift_amount().map(|s| s.get()),
    }
}

impl DecodedResult {
    pub fn class(&self) -> OperationClass {
        self.operation.class()
    }
}

impl fmt::Display for DecodedResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = self.result;
        match self.class() {
            OperationClass::Arithmetic => write!(f, "{} (0x{:02X})", r, r),
            OperationClass::Logical => write!(f, "{} (0b{:08b}) (0x{:02X})", r, r, r),
            OperationClass::Shift => {
                write!(f, "{} (0b{:08b})", r, r)?;
                if let Some(n) = self.shift_amount {
                    write!(f, " ({} shifted right by {})", self.operand_a, n)?;
                }
                Ok(())
            }
        }
    }
}
