//! Console loops for both session strategies and the self-test battery.
//!
//! Every loop reads lines from any `AsyncBufRead` and writes to any
//! `AsyncWrite`, so the binary hands them stdin/stdout and tests hand them
//! byte slices and vectors.

use std::time::Duration;

use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite};

use super::input::{help_text, parse_input, ConsoleInput, PROMPT, SELF_TEST_BATTERY};
use super::stdio::{write_json, write_line, write_prompt, OutputFormat};
use crate::emulator::evaluate;
use crate::error::{AluError, Result, TransportError};
use crate::monitor::Monitor;
use crate::protocol::{hex_list, parse_line, Command, DecodedResult, Operation};
use crate::session::Session;

/// Why a console loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleExit {
    /// The user typed `quit` or `exit`.
    Quit,
    /// Input reached end of file.
    EndOfInput,
    /// The device side closed the stream (monitor only).
    StreamClosed,
}

/// Printed with every self-test: the `sra` rows expect the sign bit to be
/// copied in, which a device with a logical `sra` will fail.
pub const SRA_EXPECTATION_NOTE: &str =
    "sra expectations assume sign extension (sra 128 3 -> 0xF0, not 0x10)";

/// Outcome of the self-test battery.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SelfTestSummary {
    pub passed: usize,
    /// Answered, but not with the expected value.
    pub mismatched: usize,
    /// No answer before the deadline.
    pub unanswered: usize,
}

impl SelfTestSummary {
    pub fn all_passed(&self) -> bool {
        self.mismatched == 0 && self.unanswered == 0
    }
}

#[derive(Serialize)]
struct ResultRecord<'a> {
    command: String,
    #[serde(flatten)]
    result: &'a DecodedResult,
}

#[derive(Serialize)]
struct ErrorRecord<'a> {
    input: &'a str,
    kind: &'static str,
    error: String,
}

#[derive(Serialize)]
struct TrafficRecord<'a> {
    direction: &'static str,
    bytes: &'a [u8],
}

fn error_kind(err: &AluError) -> &'static str {
    match err {
        AluError::Parse(_) => "parse",
        AluError::Transport(TransportError::Timeout(_)) => "timeout",
        _ => "transport",
    }
}

async fn report_result<W>(
    out: &mut W,
    cmd: &Command,
    result: &DecodedResult,
    format: OutputFormat,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    match format {
        OutputFormat::Text => {
            write_line(out, &format!("{} -> {}", cmd, result)).await?;
        }
        OutputFormat::Json => {
            let record = ResultRecord {
                command: cmd.to_string(),
                result,
            };
            write_json(out, &record).await?;
        }
    }
    Ok(())
}

async fn report_error<W>(out: &mut W, input: &str, err: &AluError, format: OutputFormat) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    match format {
        OutputFormat::Text => write_line(out, &format!("error: {}", err)).await?,
        OutputFormat::Json => {
            let record = ErrorRecord {
                input: input.trim(),
                kind: error_kind(err),
                error: err.to_string(),
            };
            write_json(out, &record).await?;
        }
    }
    Ok(())
}

async fn report_traffic<W>(
    out: &mut W,
    direction: &'static str,
    bytes: &[u8],
    format: OutputFormat,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    match format {
        OutputFormat::Text => {
            write_line(out, &format!("{}: {}", direction, hex_list(bytes))).await?;
        }
        OutputFormat::Json => write_json(out, &TrafficRecord { direction, bytes }).await?,
    }
    Ok(())
}

/// Interactive request/response loop.
///
/// Parse errors and timeouts are reported and the loop continues. Any other
/// transport error is returned; the caller must close the session.
pub async fn run_interactive<I, S, W>(
    input: I,
    session: &mut Session<S>,
    out: &mut W,
    format: OutputFormat,
    show_prompt: bool,
) -> Result<ConsoleExit>
where
    I: AsyncBufRead + Unpin,
    S: AsyncRead + AsyncWrite + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();

    loop {
        if show_prompt {
            write_prompt(out, PROMPT).await?;
        }

        let Some(line) = lines.next_line().await? else {
            return Ok(ConsoleExit::EndOfInput);
        };

        let cmd = match parse_input(&line) {
            Ok(ConsoleInput::Empty) => continue,
            Ok(ConsoleInput::Help) => {
                write_line(out, &help_text()).await?;
                continue;
            }
            Ok(ConsoleInput::Quit) => return Ok(ConsoleExit::Quit),
            Ok(ConsoleInput::Execute(cmd)) => cmd,
            Err(e) => {
                report_error(out, &line, &e.into(), format).await?;
                continue;
            }
        };

        match session.execute(&cmd).await {
            Ok(result) => report_result(out, &cmd, &result, format).await?,
            Err(e) if !e.is_fatal_for_session() => report_error(out, &line, &e, format).await?,
            Err(e) => {
                report_error(out, &line, &e, format).await?;
                return Err(e);
            }
        }
    }
}

/// Run the fixed battery, checking each reply against the reference ALU.
///
/// Unanswered commands are counted and the run continues; a broken stream
/// ends it with an error.
pub async fn run_self_test<S, W>(
    session: &mut Session<S>,
    out: &mut W,
    format: OutputFormat,
    gap: Duration,
) -> Result<SelfTestSummary>
where
    S: AsyncRead + AsyncWrite + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut summary = SelfTestSummary::default();

    if format == OutputFormat::Text {
        write_line(out, &format!("self-test: {}", SRA_EXPECTATION_NOTE)).await?;
    }

    for (i, line) in SELF_TEST_BATTERY.iter().enumerate() {
        if i > 0 && !gap.is_zero() {
            tokio::time::sleep(gap).await;
        }

        let cmd = parse_line(line)?;
        let expected = evaluate(cmd.operation(), cmd.operand_a(), cmd.operand_b());

        match session.execute(&cmd).await {
            Ok(result) => {
                report_result(out, &cmd, &result, format).await?;
                if result.result == expected {
                    summary.passed += 1;
                } else {
                    summary.mismatched += 1;
                    tracing::warn!(
                        "{}: expected 0x{:02X}, device returned 0x{:02X}",
                        cmd,
                        expected,
                        result.result
                    );
                    if cmd.operation() == Operation::ShrArithmetic && format == OutputFormat::Text {
                        write_line(out, &format!("note: {}", SRA_EXPECTATION_NOTE)).await?;
                    }
                }
            }
            Err(e) if !e.is_fatal_for_session() => {
                report_error(out, line, &e, format).await?;
                summary.unanswered += 1;
            }
            Err(e) => return Err(e),
        }
    }

    if format == OutputFormat::Text {
        write_line(
            out,
            &format!(
                "self-test: {} passed, {} mismatched, {} unanswered",
                summary.passed, summary.mismatched, summary.unanswered
            ),
        )
        .await?;
    } else {
        write_json(out, &summary).await?;
    }

    Ok(summary)
}

/// Monitor loop: commands go out fire-and-forget, inbound bytes are printed
/// as they arrive with no pairing.
pub async fn run_monitor<I, W>(
    input: I,
    monitor: &mut Monitor,
    out: &mut W,
    format: OutputFormat,
) -> Result<ConsoleExit>
where
    I: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let writer = monitor.writer();
    let mut lines = input.lines();
    let mut input_open = true;

    loop {
        tokio::select! {
            line = lines.next_line(), if input_open => {
                let Some(line) = line? else {
                    // Keep printing traffic until the stream closes.
                    input_open = false;
                    continue;
                };
                match parse_input(&line) {
                    Ok(ConsoleInput::Empty) => {}
                    Ok(ConsoleInput::Help) => write_line(out, &help_text()).await?,
                    Ok(ConsoleInput::Quit) => return Ok(ConsoleExit::Quit),
                    Ok(ConsoleInput::Execute(cmd)) => {
                        let frame = writer.send_command(&cmd).await?;
                        report_traffic(out, "TX", frame.as_bytes(), format).await?;
                    }
                    Err(e) => report_error(out, &line, &e.into(), format).await?,
                }
            }
            chunk = monitor.next_chunk() => {
                let Some(chunk) = chunk else {
                    return Ok(if input_open {
                        ConsoleExit::StreamClosed
                    } else {
                        ConsoleExit::EndOfInput
                    });
                };
                report_traffic(out, "RX", &chunk, format).await?;
            }
        }
    }
}
