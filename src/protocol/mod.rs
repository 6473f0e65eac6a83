//! Protocol module - commands, wire frames and reply decoding.
//!
//! This module implements everything that decides which bytes go on the wire:
//! - Opcode table and operation classes
//! - Command parsing with shift-count packing
//! - Fixed-size frame encoding for both layouts
//! - Frame buffer for reassembling frames on the receiving side
//! - Reply decoding and presentation

mod command;
mod frame;
mod frame_buffer;
mod opcode;
mod response;
mod wire_format;

pub use command::{
    parse, parse_line, parse_operand, Command, ShiftAmount, MAX_OPERAND, MAX_SHIFT_AMOUNT,
    SHIFT_AMOUNT_OFFSET,
};
pub use frame::{hex_list, write_hex_list, Frame};
pub use frame_buffer::FrameBuffer;
pub use opcode::{opcodes, Operation, OperationClass};
pub use response::{decode, DecodedResult};
pub use wire_format::{
    encode, FrameVariant, FRAME_HEADER, HEADER_DELIMITED_FRAME_SIZE, OPCODE_FIRST_FRAME_SIZE,
    RESPONSE_SIZE,
};
