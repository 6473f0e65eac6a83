//! Console line language.
//!
//! ```text
//! ALU> add 25 30
//! ALU> and 0xFF 0x0F
//! ALU> help
//! ALU> quit
//! ```

use std::time::Duration;

use crate::error::ParseError;
use crate::protocol::{parse_line, Command};

/// Prompt shown before each line.
pub const PROMPT: &str = "ALU> ";

/// Gap between commands in the self-test battery.
pub const SELF_TEST_GAP: Duration = Duration::from_millis(500);

/// The fixed self-test battery.
pub const SELF_TEST_BATTERY: [&str; 11] = [
    "add 10 15",
    "add 100 155",
    "sub 50 20",
    "sub 200 150",
    "and 0xFF 0x0F",
    "or 0xF0 0x0F",
    "xor 170 85",
    "nor 0 255",
    "srl 128 1",
    "srl 15 2",
    "sra 128 3",
];

/// One parsed console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleInput {
    /// Blank line.
    Empty,
    Help,
    Quit,
    Execute(Command),
}

/// Interpret a console line. Keywords are case-insensitive.
pub fn parse_input(line: &str) -> Result<ConsoleInput, ParseError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(ConsoleInput::Empty);
    }
    if line.eq_ignore_ascii_case("help") {
        return Ok(ConsoleInput::Help);
    }
    if line.eq_ignore_ascii_case("quit") || line.eq_ignore_ascii_case("exit") {
        return Ok(ConsoleInput::Quit);
    }
    parse_line(line).map(ConsoleInput::Execute)
}

/// Operation reference printed by `help`.
pub fn help_text() -> String {
    let rows = [
        ("ADD", "Add", "add 10 20"),
        ("SUB", "Subtract", "sub 50 30"),
        ("AND", "Bitwise AND", "and 255 15"),
        ("OR", "Bitwise OR", "or 128 64"),
        ("XOR", "Bitwise XOR", "xor 170 85"),
        ("NOR", "Bitwise NOR", "nor 15 240"),
        ("SRL", "Shift right logical", "srl 128 2"),
        ("SRA", "Shift right arithmetic", "sra 128 3"),
    ];

    let mut out = String::from("Operations:\n");
    for (name, desc, example) in rows {
        out.push_str(&format!("  {:<4} {:<24} {}\n", name, desc, example));
    }
    out.push_str("\nOperands are 0-255, decimal or 0x-prefixed hex.\n");
    out.push_str("For srl/sra the second operand is the shift amount (0-3).\n");
    out.push_str("Type 'quit' or 'exit' to leave.");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Operation;

    #[test]
    fn test_keywords() {
        assert_eq!(parse_input("   "), Ok(ConsoleInput::Empty));
        assert_eq!(parse_input("HELP"), Ok(ConsoleInput::Help));
        assert_eq!(parse_input("quit"), Ok(ConsoleInput::Quit));
        assert_eq!(parse_input(" Exit "), Ok(ConsoleInput::Quit));
    }

    #[test]
    fn test_command_line() {
        let Ok(ConsoleInput::Execute(cmd)) = parse_input("xor 170 85") else {
            panic!("expected a command");
        };
        assert_eq!(cmd.operation(), Operation::Xor);
    }

    #[test]
    fn test_parse_errors_surface() {
        assert_eq!(
            parse_input("foo 1 2"),
            Err(ParseError::UnknownOperation("foo".into()))
        );
        assert_eq!(parse_input("add 1"), Err(ParseError::WrongArity(2)));
    }

    #[test]
    fn test_self_test_battery_parses() {
        for line in SELF_TEST_BATTERY {
            assert!(parse_line(line).is_ok(), "battery line '{}' rejected", line);
        }
    }

    #[test]
    fn test_help_mentions_every_operation() {
        let help = help_text().to_lowercase();
        for op in Operation::ALL {
            assert!(help.contains(op.name()), "help is missing {}", op);
        }
    }
}
