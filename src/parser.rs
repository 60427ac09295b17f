//! Turns HTML source text into an instruction tree.
//!
//! Runs of `t`/`m` and `L`/`H` collapse into one node carrying the signed net
//! count, runs of `T` or `M` collapse into one node counting the repeats, and
//! every `h` recursively parses its body until the matching `l`. Characters
//! outside the token set are comments.

use std::fmt;
use std::io::{self, BufReader, Read};

use crate::instruction::{Block, Instruction, InstructionKind};

/// How unbalanced loops are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseMode {
    /// Historical behaviour: an unclosed `h` runs to the end of the input and a
    /// stray top-level `l` truncates the program. Nothing is reported.
    #[default]
    Permissive,
    /// Unbalanced loops are reported as [`ParseError::UnmatchedLoop`].
    Strict,
}

/// Parser settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ParseOptions {
    pub mode: ParseMode,
    /// Recognise `#` as the [`InstructionKind::Break`] token.
    pub debug_token: bool,
    /// Stop parsing, at every nesting level, once this byte is read.
    pub terminator: Option<u8>,
}

impl ParseOptions {
    pub fn strict(mut self) -> Self {
        self.mode = ParseMode::Strict;
        self
    }

    pub fn with_debug_token(mut self, enabled: bool) -> Self {
        self.debug_token = enabled;
        self
    }

    pub fn until(mut self, terminator: u8) -> Self {
        self.terminator = Some(terminator);
        self
    }
}

/// Which side of a loop was unmatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnmatchedLoopKind {
    Open,
    Close,
}

impl fmt::Display for UnmatchedLoopKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnmatchedLoopKind::Open => write!(f, "'h'"),
            UnmatchedLoopKind::Close => write!(f, "'l'"),
        }
    }
}

/// Errors that can occur while parsing.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// [`parse_one`] was given a character outside the token set.
    #[error("Unrecognized token: {ch:?}")]
    UnrecognizedToken { ch: char },

    /// Strict mode only: a loop was not balanced.
    #[error("Unmatched loop {kind} at offset {offset}")]
    UnmatchedLoop { offset: usize, kind: UnmatchedLoopKind },

    /// Reading the source stream failed.
    #[error("I/O error at offset {offset}: {source}")]
    Io {
        offset: usize,
        #[source]
        source: io::Error,
    },
}

/// Parse a whole stream.
pub fn parse_stream<R: Read>(reader: R, options: ParseOptions) -> Result<Block, ParseError> {
    Parser::new(BufReader::new(reader).bytes(), options).parse()
}

/// Parse a stream up to (not including) the first `terminator` byte.
///
/// The terminator ends the parse at every nesting level, not just the loop it
/// appears in: loops still open are closed where the terminator was read and
/// the rest of the input is ignored. `ht\nTT` therefore yields a single loop,
/// with no Output after it.
pub fn parse_stream_until<R: Read>(
    reader: R,
    terminator: u8,
    options: ParseOptions,
) -> Result<Block, ParseError> {
    parse_stream(reader, options.until(terminator))
}

/// Parse an in-memory program.
pub fn parse_str(source: &str, options: ParseOptions) -> Result<Block, ParseError> {
    parse_substr(source, 0, None, options)
}

/// Parse the byte region `begin..end` of `source`; `end = None` means the end of
/// the string. Out-of-range bounds are clamped.
pub fn parse_substr(
    source: &str,
    begin: usize,
    end: Option<usize>,
    options: ParseOptions,
) -> Result<Block, ParseError> {
    let bytes = source.as_bytes();
    let end = end.unwrap_or(bytes.len()).min(bytes.len());
    let begin = begin.min(end);
    let mut parser = Parser::new(bytes[begin..end].iter().copied().map(Ok), options);
    parser.offset = begin;
    parser.parse()
}

/// Convert a single character into a node with count 1.
pub fn parse_one(ch: char, options: ParseOptions) -> Result<Instruction, ParseError> {
    u8::try_from(ch)
        .ok()
        .and_then(|byte| InstructionKind::from_token(byte, options.debug_token))
        .map(|kind| Instruction::new(kind, 1))
        .ok_or(ParseError::UnrecognizedToken { ch })
}

/// Recursive-descent parser over a fallible byte iterator.
pub struct Parser<I> {
    bytes: I,
    peeked: Option<u8>,
    offset: usize,
    finished: bool,
    options: ParseOptions,
}

impl<I> Parser<I>
where
    I: Iterator<Item = io::Result<u8>>,
{
    pub fn new(bytes: I, options: ParseOptions) -> Self {
        Self {
            bytes,
            peeked: None,
            offset: 0,
            finished: false,
            options,
        }
    }

    /// Offset of the next unread byte.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Parse the remaining input into a terminated block.
    ///
    /// Open loops are kept on an explicit stack, so arbitrarily deep nesting
    /// does not grow the call stack.
    pub fn parse(&mut self) -> Result<Block, ParseError> {
        let mut root = Vec::new();
        // Offset of each open `h` and the body collected so far, innermost last.
        let mut open: Vec<(usize, Vec<Instruction>)> = Vec::new();

        while let Some(byte) = self.peek()? {
            let at = self.offset;
            self.forward();

            let Some(kind) = InstructionKind::from_token(byte, self.options.debug_token) else {
                continue;
            };

            let instruction = match kind {
                InstructionKind::Increment
                | InstructionKind::Decrement
                | InstructionKind::MoveRight
                | InstructionKind::MoveLeft => self.parse_run(kind)?,
                InstructionKind::Output | InstructionKind::Input => self.parse_repeats(kind)?,
                InstructionKind::LoopStart => {
                    open.push((at, Vec::new()));
                    continue;
                }
                InstructionKind::LoopEnd => match open.pop() {
                    Some((_, body)) => Instruction::loop_over(Block::from_instructions(body)),
                    None => {
                        if self.options.mode == ParseMode::Strict {
                            return Err(ParseError::UnmatchedLoop {
                                offset: at,
                                kind: UnmatchedLoopKind::Close,
                            });
                        }
                        return Ok(Block::from_instructions(root));
                    }
                },
                InstructionKind::Break => Instruction::new(kind, 1),
            };

            match open.last_mut() {
                Some((_, body)) => body.push(instruction),
                None => root.push(instruction),
            }
        }

        if let Some(&(offset, _)) = open.last() {
            if self.options.mode == ParseMode::Strict {
                return Err(ParseError::UnmatchedLoop {
                    offset,
                    kind: UnmatchedLoopKind::Open,
                });
            }
        }

        // Input ended inside loops: close them from the inside out.
        let mut closed = None;
        while let Some((_, mut body)) = open.pop() {
            body.extend(closed.take());
            closed = Some(Instruction::loop_over(Block::from_instructions(body)));
        }
        root.extend(closed);
        Ok(Block::from_instructions(root))
    }

    /// Collapse a mixed run of `kind` and its opposite into one signed node.
    fn parse_run(&mut self, kind: InstructionKind) -> Result<Instruction, ParseError> {
        let mut instruction = Instruction::new(kind, 1);
        let same = kind.token();
        let opposite = kind.opposite().map(InstructionKind::token);

        while let Some(byte) = self.peek()? {
            if byte == same {
                instruction.bump(1);
            } else if Some(byte) == opposite {
                instruction.bump(-1);
            } else {
                break;
            }
            self.forward();
        }

        Ok(instruction)
    }

    /// Collapse exact repeats of `kind`.
    fn parse_repeats(&mut self, kind: InstructionKind) -> Result<Instruction, ParseError> {
        let mut instruction = Instruction::new(kind, 1);
        while self.peek()? == Some(kind.token()) {
            instruction.bump(1);
            self.forward();
        }
        Ok(instruction)
    }

    fn peek(&mut self) -> Result<Option<u8>, ParseError> {
        if self.peeked.is_none() && !self.finished {
            match self.bytes.next() {
                Some(Ok(byte)) if Some(byte) == self.options.terminator => self.finished = true,
                Some(Ok(byte)) => self.peeked = Some(byte),
                Some(Err(source)) => {
                    return Err(ParseError::Io {
                        offset: self.offset,
                        source,
                    });
                }
                None => self.finished = true,
            }
        }
        Ok(self.peeked)
    }

    fn forward(&mut self) {
        debug_assert!(self.peeked.is_some());
        self.peeked = None;
        self.offset += 1;
    }
}
