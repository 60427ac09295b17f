use std::io::{self, Write};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use crate::config::Settings;
use crate::context::{ExecutionContext, StopHandle};
use crate::engine::{ExecutionError, execute};
use crate::handlers::StdinInput;
use crate::parser::{ParseError, parse_str};

/// How long a timed-out run may take to reach its next instruction boundary.
const STOP_GRACE: Duration = Duration::from_millis(200);

/// How a program run through [`run_program`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    /// The stop flag was raised, e.g. by Ctrl+C.
    Stopped,
    /// `--timeout` elapsed and the run was stopped.
    TimedOut,
    Failed,
}

impl RunOutcome {
    pub fn exit_code(self) -> i32 {
        match self {
            RunOutcome::Completed => 0,
            RunOutcome::Failed | RunOutcome::TimedOut => 1,
            RunOutcome::Stopped => 130,
        }
    }
}

/// Parse and execute `code` with `settings`, reporting every problem on stderr.
///
/// Execution happens on a worker thread so `timeout` can stop it; `stop` is
/// shared with the caller (and any Ctrl+C handler).
pub fn run_program(
    program: Option<&str>,
    code: &str,
    settings: &Settings,
    input: StdinInput,
    stop: &StopHandle,
    timeout: Option<Duration>,
) -> RunOutcome {
    let tree = match parse_str(code, settings.parse_options()) {
        Ok(tree) => tree,
        Err(err) => {
            print_parse_error(program, code, &err);
            return RunOutcome::Failed;
        }
    };

    let mut context = ExecutionContext::new(settings.tape_size);
    context.set_eof_policy(settings.eof_policy);
    context.set_input_handler(input);
    context.set_stop_handle(stop.clone());

    let (tx, rx) = mpsc::channel::<Result<(), ExecutionError>>();
    thread::spawn(move || {
        let _ = tx.send(execute(&tree, &mut context));
    });

    let mut timed_out = false;
    let result = match timeout {
        Some(limit) => match rx.recv_timeout(limit) {
            Ok(result) => Some(result),
            Err(mpsc::RecvTimeoutError::Timeout) => {
                timed_out = true;
                stop.request();
                // A worker blocked on input never reaches an instruction boundary;
                // it is left behind and ends with the process.
                rx.recv_timeout(STOP_GRACE).ok()
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => None,
        },
        None => rx.recv().ok(),
    };
    let _ = io::stdout().flush();

    match result {
        Some(Err(err)) => {
            print_execution_error(program, &err);
            RunOutcome::Failed
        }
        _ if timed_out => {
            let limit = timeout.map(|d| d.as_millis()).unwrap_or_default();
            eprintln!("Execution aborted: wall-clock timeout exceeded ({limit} ms)");
            let _ = io::stderr().flush();
            RunOutcome::TimedOut
        }
        Some(Ok(())) if stop.is_requested() => {
            eprintln!("Execution aborted: interrupted");
            let _ = io::stderr().flush();
            RunOutcome::Stopped
        }
        Some(Ok(())) => RunOutcome::Completed,
        None => {
            print_prefixed(program, "Runtime error: interpreter thread panicked");
            RunOutcome::Failed
        }
    }
}

fn print_prefixed(program: Option<&str>, msg: &str) {
    match program {
        Some(p) => eprintln!("{p}: {msg}"),
        None => eprintln!("{msg}"),
    }
    let _ = io::stderr().flush();
}

/// Report a runtime error. Bounds violations mirror the classic two-line message.
pub fn print_execution_error(program: Option<&str>, err: &ExecutionError) {
    match err {
        ExecutionError::TapeOverrun { tape_size, .. } => print_prefixed(
            program,
            &format!("error: tape memory out of bounds (overrun)\nexceeded the tape size of {tape_size} cells"),
        ),
        ExecutionError::TapeUnderrun { tape_size, .. } => print_prefixed(
            program,
            &format!("error: tape memory out of bounds (underrun)\nundershot the tape size of {tape_size} cells"),
        ),
        ExecutionError::Output { source } => {
            print_prefixed(program, &format!("I/O error: output failed: {source}"))
        }
    }
}

/// Report a parse error, with a caret under the offending byte when known.
pub fn print_parse_error(program: Option<&str>, code: &str, err: &ParseError) {
    let prefix_program = |msg: &str| {
        if let Some(p) = program {
            format!("{p}: {msg}")
        } else {
            msg.to_string()
        }
    };

    match err {
        ParseError::UnmatchedLoop { offset, kind } => {
            let msg = prefix_program(&format!("Parse error: unmatched loop {kind}"));
            print_error_with_context(&msg, code, *offset);
        }
        ParseError::UnrecognizedToken { ch } => {
            eprintln!("{}", prefix_program(&format!("Parse error: unrecognized token {ch:?}")));
            let _ = io::stderr().flush();
        }
        ParseError::Io { offset, source } => {
            let msg = prefix_program(&format!("I/O error: {source}"));
            print_error_with_context(&msg, code, *offset);
        }
    }
}

/// Print a concise error with the byte offset and a caret context window.
pub fn print_error_with_context(prefix: &str, code: &str, offset: usize) {
    eprintln!("{prefix} at offset {offset}");
    let (line, caret) = context_window(code, offset);
    eprintln!("  {line}");
    eprintln!("  {caret}");
    let _ = io::stderr().flush();
}

/// Up to 32 bytes either side of `offset` on its line, plus a caret line.
fn context_window(code: &str, offset: usize) -> (String, String) {
    const WINDOW: usize = 32;

    let bytes = code.as_bytes();
    let offset = offset.min(bytes.len());
    let line_start = bytes[..offset]
        .iter()
        .rposition(|&b| b == b'\n')
        .map_or(0, |i| i + 1);
    let line_end = bytes[offset..]
        .iter()
        .position(|&b| b == b'\n')
        .map_or(bytes.len(), |i| offset + i);

    let start = offset.saturating_sub(WINDOW).max(line_start);
    let end = (offset + WINDOW + 1).min(line_end);
    let slice = String::from_utf8_lossy(&bytes[start..end]).into_owned();

    let mut caret = " ".repeat(String::from_utf8_lossy(&bytes[start..offset]).chars().count());
    caret.push('^');
    (slice, caret)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caret_points_at_offset() {
        let (line, caret) = context_window("tthtt", 2);
        assert_eq!(line, "tthtt");
        assert_eq!(caret, "  ^");
    }

    #[test]
    fn window_stays_on_one_line() {
        let (line, caret) = context_window("tt\nhTT\nLL", 3);
        assert_eq!(line, "hTT");
        assert_eq!(caret, "^");
    }

    #[test]
    fn long_lines_are_clipped() {
        let code = format!("{}l{}", "x".repeat(100), "y".repeat(100));
        let (line, caret) = context_window(&code, 100);
        assert_eq!(line.len(), 65);
        assert_eq!(caret.len(), 33);
    }

    #[test]
    fn exit_codes() {
        assert_eq!(RunOutcome::Completed.exit_code(), 0);
        assert_eq!(RunOutcome::Failed.exit_code(), 1);
        assert_eq!(RunOutcome::TimedOut.exit_code(), 1);
        assert_eq!(RunOutcome::Stopped.exit_code(), 130);
    }
}
