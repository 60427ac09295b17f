//! Executes an instruction tree against an [`ExecutionContext`].

use std::io::{self, Write};

use crate::context::ExecutionContext;
use crate::instruction::{Block, Instruction, InstructionKind};

/// Cells on each side of the pointer shown by a Break dump.
const DUMP_RADIUS: usize = 10;
/// Cells shown by a Break dump.
const DUMP_WIDTH: usize = 2 * DUMP_RADIUS + 1;

/// Errors that abort a run.
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    /// A MoveRight would leave the tape.
    #[error("tape memory out of bounds (overrun): exceeded the tape size of {tape_size} cells")]
    TapeOverrun { pointer: usize, shift: i64, tape_size: usize },

    /// A MoveLeft would leave the tape.
    #[error("tape memory out of bounds (underrun): undershot the tape size of {tape_size} cells")]
    TapeUnderrun { pointer: usize, shift: i64, tape_size: usize },

    /// The output handler, or stdout while dumping the tape, failed.
    #[error("output failed: {source}")]
    Output {
        #[source]
        source: io::Error,
    },
}

/// A sequence being walked and the index of its next node.
struct Frame<'a> {
    block: &'a Block,
    next: usize,
}

/// Walk `block` until its sentinel, a stop request, or an error.
///
/// Stopping is not an error: the walk returns `Ok(())` as soon as the stop flag
/// is seen after an instruction. Loop bodies are walked with an explicit frame
/// stack, so nesting depth is bounded by memory rather than the thread's stack.
pub fn execute(block: &Block, context: &mut ExecutionContext) -> Result<(), ExecutionError> {
    let mut frames = vec![Frame { block, next: 0 }];

    while let Some(frame) = frames.last_mut() {
        let walked = frame.block;
        let index = frame.next;
        frame.next += 1;

        let instruction = match walked.instructions().get(index) {
            Some(instruction) if instruction.kind() != InstructionKind::LoopEnd => instruction,
            // End of a sequence. A loop body starts over while its cell is nonzero.
            _ => {
                if frames.len() > 1 && context.current() != 0 && !context.stop_requested() {
                    if let Some(frame) = frames.last_mut() {
                        frame.next = 0;
                    }
                    continue;
                }
                frames.pop();
                if frames.is_empty() || context.stop_requested() {
                    return Ok(());
                }
                continue;
            }
        };

        match instruction.kind() {
            InstructionKind::Increment => add(context, instruction.count()),
            InstructionKind::Decrement => add(context, instruction.count().wrapping_neg()),
            InstructionKind::MoveRight => shift(context, instruction.count())?,
            InstructionKind::MoveLeft => shift(context, instruction.count().wrapping_neg())?,
            InstructionKind::Output => output(context, instruction)?,
            InstructionKind::Input => input(context, instruction),
            InstructionKind::LoopStart => {
                if let Some(body) = instruction.body() {
                    if context.current() != 0 && !context.stop_requested() {
                        frames.push(Frame { block: body, next: 0 });
                        continue;
                    }
                }
            }
            InstructionKind::Break => write_dump(context, &mut io::stdout().lock())?,
            // Filtered out above.
            InstructionKind::LoopEnd => {}
        }

        if context.stop_requested() {
            return Ok(());
        }
    }
    Ok(())
}

fn write_dump<W: Write>(context: &ExecutionContext, out: &mut W) -> Result<(), ExecutionError> {
    out.write_all(dump_tape(context).as_bytes())
        .and_then(|()| out.flush())
        .map_err(|source| ExecutionError::Output { source })
}

fn add(context: &mut ExecutionContext, delta: i64) {
    // Only the low byte matters modulo 256.
    let delta = delta.rem_euclid(256) as u8;
    let cell = context.current_mut();
    *cell = cell.wrapping_add(delta);
}

fn shift(context: &mut ExecutionContext, delta: i64) -> Result<(), ExecutionError> {
    let pointer = context.pointer();
    let tape_size = context.tape_size();
    let target = i64::try_from(pointer)
        .ok()
        .and_then(|p| p.checked_add(delta))
        .and_then(|t| usize::try_from(t).ok())
        .filter(|&t| t < tape_size);

    match target {
        Some(target) => {
            context.set_pointer(target);
            Ok(())
        }
        None if delta < 0 => Err(ExecutionError::TapeUnderrun {
            pointer,
            shift: delta,
            tape_size,
        }),
        None => Err(ExecutionError::TapeOverrun {
            pointer,
            shift: delta,
            tape_size,
        }),
    }
}

fn output(context: &mut ExecutionContext, instruction: &Instruction) -> Result<(), ExecutionError> {
    let byte = context.current();
    for _ in 0..instruction.count() {
        context
            .output()
            .write_byte(byte)
            .map_err(|source| ExecutionError::Output { source })?;
    }
    Ok(())
}

fn input(context: &mut ExecutionContext, instruction: &Instruction) {
    for _ in 0..instruction.count() {
        let value = match context.input().read_byte() {
            Some(byte) => Some(byte),
            None => context.eof_policy().value(),
        };
        if let Some(value) = value {
            *context.current_mut() = value;
        }
    }
}

/// Render up to 21 cells starting ten cells left of the pointer as three
/// tab-separated rows: indices, values and a `^` under the pointer.
pub fn dump_tape(context: &ExecutionContext) -> String {
    let pointer = context.pointer();
    let low = pointer.saturating_sub(DUMP_RADIUS);
    let high = (low + DUMP_WIDTH).min(context.tape_size());
    let cells = &context.tape()[low..high];

    let mut out = String::new();
    for index in low..high {
        out.push_str(&format!("{index}\t"));
    }
    out.push('\n');
    for value in cells {
        out.push_str(&format!("{value}\t"));
    }
    out.push('\n');
    for index in low..high {
        out.push_str(if index == pointer { "^\t" } else { " \t" });
    }
    out.push('\n');
    out
}
