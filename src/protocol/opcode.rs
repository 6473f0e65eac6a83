//! ALU operations and their fixed opcode table.
//!
//! ```text
//! ┌──────┬────────┬──────────┐
//! │ name │ opcode │ class    │
//! ├──────┼────────┼──────────┤
//! │ add  │ 0x20   │ arith    │
//! │ sub  │ 0x22   │ arith    │
//! │ and  │ 0x24   │ logical  │
//! │ or   │ 0x25   │ logical  │
//! │ xor  │ 0x26   │ logical  │
//! │ nor  │ 0x27   │ logical  │
//! │ srl  │ 0x02   │ shift    │
//! │ sra  │ 0x03   │ shift    │
//! └──────┴────────┴──────────┘
//! ```

use std::fmt;

use serde::Serialize;

/// Opcode constants as the FPGA expects them.
pub mod opcodes {
    pub const ADD: u8 = 0x20;
    pub const SUB: u8 = 0x22;
    pub const AND: u8 = 0x24;
    pub const OR: u8 = 0x25;
    pub const XOR: u8 = 0x26;
    pub const NOR: u8 = 0x27;
    /// Shift right logical.
    pub const SRL: u8 = 0x02;
    /// Shift right arithmetic.
    pub const SRA: u8 = 0x03;
}

/// An operation the ALU can execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Add,
    Sub,
    And,
    Or,
    Xor,
    Nor,
    #[serde(rename = "srl")]
    ShrLogical,
    #[serde(rename = "sra")]
    ShrArithmetic,
}

/// How a result byte is presented for an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationClass {
    /// Decimal and hex.
    Arithmetic,
    /// Decimal, binary and hex.
    Logical,
    /// Decimal and binary, plus the shift amount.
    Shift,
}

impl Operation {
    /// Every operation, in opcode-table order.
    pub const ALL: [Operation; 8] = [
        Operation::Add,
        Operation::Sub,
        Operation::And,
        Operation::Or,
        Operation::Xor,
        Operation::Nor,
        Operation::ShrLogical,
        Operation::ShrArithmetic,
    ];

    /// Wire opcode for this operation.
    #[inline]
    pub const fn opcode(self) -> u8 {
        match self {
            Operation::Add => opcodes::ADD,
            Operation::Sub => opcodes::SUB,
            Operation::And => opcodes::AND,
            Operation::Or => opcodes::OR,
            Operation::Xor => opcodes::XOR,
            Operation::Nor => opcodes::NOR,
            Operation::ShrLogical => opcodes::SRL,
            Operation::ShrArithmetic => opcodes::SRA,
        }
    }

    /// Command-line name (lowercase).
    pub const fn name(self) -> &'static str {
        match self {
            Operation::Add => "add",
            Operation::Sub => "sub",
            Operation::And => "and",
            Operation::Or => "or",
            Operation::Xor => "xor",
            Operation::Nor => "nor",
            Operation::ShrLogical => "srl",
            Operation::ShrArithmetic => "sra",
        }
    }

    /// Look up an operation by name, ignoring ASCII case.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|op| op.name().eq_ignore_ascii_case(name))
    }

    /// Reverse lookup used on the device side of the link.
    pub fn from_opcode(opcode: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.opcode() == opcode)
    }

    #[inline]
    pub fn is_shift(self) -> bool {
        matches!(self, Operation::ShrLogical | Operation::ShrArithmetic)
    }

    pub fn class(self) -> OperationClass {
        match self {
            Operation::Add | Operation::Sub => OperationClass::Arithmetic,
            Operation::And | Operation::Or | Operation::Xor | Operation::Nor => {
                OperationClass::Logical
            }
            Operation::ShrLogical | Operation::ShrArithmetic => OperationClass::Shift,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
