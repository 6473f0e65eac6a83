//! Command parsing and validation.
//!
//! Turns `["srl", "128", "2"]` into a [`Command`] whose `operand_b` is already
//! packed for the wire (`2 << 6 = 0x80`). The user-facing shift amount is kept
//! next to it so nothing downstream has to undo the packing.

use std::fmt;
use std::num::IntErrorKind;
use std::str::FromStr;

use super::opcode::Operation;
use crate::error::ParseError;

/// Largest value an 8-bit operand can hold.
pub const MAX_OPERAND: u64 = 0xFF;

/// Largest shift count the two packed bits can hold.
pub const MAX_SHIFT_AMOUNT: u8 = 3;

/// Bit position of the packed shift count inside operand B.
pub const SHIFT_AMOUNT_OFFSET: u32 = 6;

/// A shift count in `0..=3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShiftAmount(u8);

impl ShiftAmount {
    /// Returns `None` when `amount` does not fit in two bits.
    pub fn new(amount: u8) -> Option<Self> {
        (amount <= MAX_SHIFT_AMOUNT).then_some(Self(amount))
    }

    #[inline]
    pub fn get(self) -> u8 {
        self.0
    }

    /// Wire form: the count in bits `[7:6]`.
    #[inline]
    pub fn packed(self) -> u8 {
        self.0 << SHIFT_AMOUNT_OFFSET
    }

    /// Extract the count from a packed operand byte.
    #[inline]
    pub fn from_packed(byte: u8) -> Self {
        Self(byte >> SHIFT_AMOUNT_OFFSET)
    }
}

/// A validated ALU request, ready for encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Command {
    operation: Operation,
    operand_a: u8,
    /// Wire-ready operand B (packed for shifts).
    operand_b: u8,
    shift: Option<ShiftAmount>,
}

impl Command {
    /// Build a command from logical operand values.
    ///
    /// For shift operations `operand_b` is the shift count (0-3), not the
    /// packed byte.
    pub fn new(operation: Operation, operand_a: u64, operand_b: u64) -> Result<Self, ParseError> {
        let a = check_operand(operand_a)?;

        if operation.is_shift() {
            let shift = u8::try_from(operand_b)
                .ok()
                .and_then(ShiftAmount::new)
                .ok_or(ParseError::ShiftAmountOutOfRange(operand_b))?;
            return Ok(Self {
                operation,
                operand_a: a,
                operand_b: shift.packed(),
                shift: Some(shift),
            });
        }

        let b = check_operand(operand_b)?;
        Ok(Self {
            operation,
            operand_a: a,
            operand_b: b,
            shift: None,
        })
    }

    #[inline]
    pub fn operation(&self) -> Operation {
        self.operation
    }

    #[inline]
    pub fn operand_a(&self) -> u8 {
        self.operand_a
    }

    /// Operand B as it goes on the wire.
    #[inline]
    pub fn operand_b(&self) -> u8 {
        self.operand_b
    }

    /// The shift count the user asked for; `None` for non-shift operations.
    #[inline]
    pub fn shift_amount(&self) -> Option<ShiftAmount> {
        self.shift
    }
}

/// Prints the command as the user typed it, with the unpacked shift amount.
impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = match self.shift {
            Some(shift) => shift.get(),
            None => self.operand_b,
        };
        write!(f, "{} {} {}", self.operation, self.operand_a, b)
    }
}

impl FromStr for Command {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_line(s)
    }
}

fn check_operand(value: u64) -> Result<u8, ParseError> {
    if value > MAX_OPERAND {
        return Err(ParseError::OutOfRange(value));
    }
    Ok(value as u8)
}

/// Parse the three tokens `<operation> <operand_a> <operand_b>`.
///
/// The operation is resolved first, then both literals, then ranges, so
/// `"foo x y"` reports the unknown operation rather than the bad operands.
pub fn parse(tokens: [&str; 3]) -> Result<Command, ParseError> {
    let [name, a, b] = tokens;
    let operation =
        Operation::from_name(name).ok_or_else(|| ParseError::UnknownOperation(name.to_string()))?;
    let a = parse_operand(a)?;
    let b = parse_operand(b)?;
    Command::new(operation, a, b)
}

/// Parse a whitespace-separated command line.
pub fn parse_line(line: &str) -> Result<Command, ParseError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    match *tokens.as_slice() {
        [name, a, b] => parse([name, a, b]),
        _ => Err(ParseError::WrongArity(tokens.len())),
    }
}

/// Parse a numeric literal.
///
/// The prefix alone picks the base: `0x` hex, `0b` binary, `0o` octal,
/// otherwise decimal. Literals too large for `u64` saturate so the range
/// check reports them as out of range.
pub fn parse_operand(token: &str) -> Result<u64, ParseError> {
    let invalid = || ParseError::InvalidOperand(token.to_string());

    let (digits, radix) = match token.get(..2) {
        Some("0x" | "0X") => (&token[2..], 16),
        Some("0b" | "0B") => (&token[2..], 2),
        Some("0o" | "0O") => (&token[2..], 8),
        _ => (token, 10),
    };

    if digits.is_empty() || !digits.bytes().all(|c| c.is_ascii_alphanumeric()) {
        return Err(invalid());
    }

    match u64::from_str_radix(digits, radix) {
        Ok(v) => Ok(v),
        Err(e) if *e.kind() == IntErrorKind::PosOverflow => Ok(u64::MAX),
        Err(_) => Err(invalid()),
    }
}
