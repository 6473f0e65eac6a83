//! Console module - the line-oriented front end.
//!
//! - [`input`]: the console line language and the self-test battery
//! - [`stdio`]: flushed line output in text or JSON
//! - [`runner`]: loops driving a [`Session`](crate::Session) or a
//!   [`Monitor`](crate::Monitor) from lines of input

mod input;
mod runner;
mod stdio;

pub use input::{help_text, parse_input, ConsoleInput, PROMPT, SELF_TEST_BATTERY, SELF_TEST_GAP};
pub use runner::{
    run_interactive, run_monitor, run_self_test, ConsoleExit, SelfTestSummary, SRA_EXPECTATION_NOTE,
};
pub use stdio::{write_json, write_line, write_prompt, OutputFormat};
