//! An interpreter for HTML, a Brainfuck dialect with renamed tokens.
//!
//! | token | operation                      |
//! |-------|--------------------------------|
//! | `t`   | increment the current cell     |
//! | `m`   | decrement the current cell     |
//! | `L`   | move the pointer right         |
//! | `H`   | move the pointer left          |
//! | `T`   | output the current cell        |
//! | `M`   | input into the current cell    |
//! | `h`   | loop while the cell is nonzero |
//! | `l`   | end of loop                    |
//! | `#`   | dump the tape (debug only)     |
//!
//! Behaviors:
//! - Memory tape of 30,000 zeroed cells by default, wrapping byte arithmetic.
//! - Source is parsed into a tree of run-length-compressed instructions; any
//!   character outside the token set is a comment.
//! - Moving the pointer off either end of the tape is an error.
//! - End of input follows an [`EofPolicy`]; the cell is left unchanged by default.
//! - A run can be stopped from another thread through a [`StopHandle`].
//!
//! Quick start:
//!
//! ```no_run
//! use rust_html::{ExecutionContext, ParseOptions, execute, parse_str};
//!
//! // "Hello World!" followed by a newline
//! let code = "tttttttthLtttthLttLtttLtttLtHHHHmlLtLtLmLLthHlHmlLLTLmmmTtttttttTTtttTLLTHmTHTtttTmmmmmmTmmmmmmmmTLLtTLttT";
//! let program = parse_str(code, ParseOptions::default()).expect("permissive parsing never fails");
//! let mut context = ExecutionContext::default();
//! execute(&program, &mut context).expect("program should run");
//! ```

pub mod cli_util;
pub mod commands;
pub mod config;
pub mod context;
pub mod engine;
pub mod handlers;
pub mod instruction;
pub mod parser;
pub mod repl;

pub use context::{
    DEFAULT_TAPE_SIZE, EofPolicy, ExecutionContext, MAX_TAPE_SIZE, StopHandle, tape_size_from_request,
};
pub use engine::{ExecutionError, dump_tape, execute};
pub use handlers::{InputHandler, OutputHandler, StdinInput, StdoutOutput};
pub use instruction::{Block, Instruction, InstructionKind};
pub use parser::{
    ParseError, ParseMode, ParseOptions, Parser, UnmatchedLoopKind, parse_one, parse_stream,
    parse_stream_until, parse_str, parse_substr,
};

/// Any error produced while parsing or running a program.
#[derive(Debug, thiserror::Error)]
pub enum HtmlError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),
}

/// Parse `source` and run it against `context`.
pub fn run_str(
    source: &str,
    options: ParseOptions,
    context: &mut ExecutionContext,
) -> Result<(), HtmlError> {
    let program = parse_str(source, options)?;
    execute(&program, context)?;
    Ok(())
}
