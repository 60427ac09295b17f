//! The instruction tree produced by the parser and walked by the engine.
//!
//! A program is a [`Block`]: an ordered sequence of [`Instruction`]s that always
//! ends in a [`InstructionKind::LoopEnd`] sentinel. Loop bodies are blocks owned
//! by their `LoopStart` instruction, so the whole program is a tree of owned
//! sequences.

use std::fmt;

/// Token for [`InstructionKind::Increment`].
pub const TOKEN_INCREMENT: u8 = b't';
/// Token for [`InstructionKind::Decrement`].
pub const TOKEN_DECREMENT: u8 = b'm';
/// Token for [`InstructionKind::MoveRight`].
pub const TOKEN_MOVE_RIGHT: u8 = b'L';
/// Token for [`InstructionKind::MoveLeft`].
pub const TOKEN_MOVE_LEFT: u8 = b'H';
/// Token for [`InstructionKind::Output`].
pub const TOKEN_OUTPUT: u8 = b'T';
/// Token for [`InstructionKind::Input`].
pub const TOKEN_INPUT: u8 = b'M';
/// Token for [`InstructionKind::LoopStart`].
pub const TOKEN_LOOP_START: u8 = b'h';
/// Token for [`InstructionKind::LoopEnd`].
pub const TOKEN_LOOP_END: u8 = b'l';
/// Token for [`InstructionKind::Break`]; only recognised with the debug token enabled.
pub const TOKEN_BREAK: u8 = b'#';

/// The closed set of operations a node can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstructionKind {
    Increment,
    Decrement,
    MoveRight,
    MoveLeft,
    Output,
    Input,
    LoopStart,
    /// Terminates the sequence it appears in.
    LoopEnd,
    /// Dumps a window of the tape. Debug token only.
    Break,
}

impl InstructionKind {
    /// Map a source byte to its kind. `#` is only a token when `debug_token` is set.
    pub fn from_token(byte: u8, debug_token: bool) -> Option<Self> {
        match byte {
            TOKEN_INCREMENT => Some(Self::Increment),
            TOKEN_DECREMENT => Some(Self::Decrement),
            TOKEN_MOVE_RIGHT => Some(Self::MoveRight),
            TOKEN_MOVE_LEFT => Some(Self::MoveLeft),
            TOKEN_OUTPUT => Some(Self::Output),
            TOKEN_INPUT => Some(Self::Input),
            TOKEN_LOOP_START => Some(Self::LoopStart),
            TOKEN_LOOP_END => Some(Self::LoopEnd),
            TOKEN_BREAK if debug_token => Some(Self::Break),
            _ => None,
        }
    }

    pub fn token(self) -> u8 {
        match self {
            Self::Increment => TOKEN_INCREMENT,
            Self::Decrement => TOKEN_DECREMENT,
            Self::MoveRight => TOKEN_MOVE_RIGHT,
            Self::MoveLeft => TOKEN_MOVE_LEFT,
            Self::Output => TOKEN_OUTPUT,
            Self::Input => TOKEN_INPUT,
            Self::LoopStart => TOKEN_LOOP_START,
            Self::LoopEnd => TOKEN_LOOP_END,
            Self::Break => TOKEN_BREAK,
        }
    }

    /// Whether a token of `next` directly after this kind's text continues the same run.
    fn merges_with(self, next: Self) -> bool {
        match self {
            Self::Output | Self::Input => next == self,
            _ => self.opposite().is_some_and(|opposite| next == self || next == opposite),
        }
    }

    /// The other half of a collapsible pair, e.g. `Decrement` for `Increment`.
    pub fn opposite(self) -> Option<Self> {
        match self {
            Self::Increment => Some(Self::Decrement),
            Self::Decrement => Some(Self::Increment),
            Self::MoveRight => Some(Self::MoveLeft),
            Self::MoveLeft => Some(Self::MoveRight),
            _ => None,
        }
    }
}

/// One node of the instruction tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    kind: InstructionKind,
    count: i64,
    body: Option<Block>,
}

impl Instruction {
    /// Create a node of `kind` with the given repeat count.
    ///
    /// A `LoopStart` created this way gets an empty (sentinel-only) body.
    pub fn new(kind: InstructionKind, count: i64) -> Self {
        let body = (kind == InstructionKind::LoopStart).then(Block::empty);
        Self { kind, count, body }
    }

    /// Create a `LoopStart` node owning `body`.
    pub fn loop_over(body: Block) -> Self {
        Self {
            kind: InstructionKind::LoopStart,
            count: 1,
            body: Some(body),
        }
    }

    /// The `LoopEnd` node that closes every sequence.
    pub fn sentinel() -> Self {
        Self::new(InstructionKind::LoopEnd, 1)
    }

    pub fn kind(&self) -> InstructionKind {
        self.kind
    }

    /// Net repeat count of the collapsed run this node stands for.
    pub fn count(&self) -> i64 {
        self.count
    }

    /// Loop body; `Some` only for `LoopStart`.
    pub fn body(&self) -> Option<&Block> {
        self.body.as_ref()
    }

    pub(crate) fn bump(&mut self, by: i64) {
        self.count += by;
    }
}

/// An ordered, owned sequence of instructions terminated by a `LoopEnd` sentinel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    instructions: Vec<Instruction>,
}

impl Block {
    /// A block holding only the sentinel.
    pub fn empty() -> Self {
        Self {
            instructions: vec![Instruction::sentinel()],
        }
    }

    /// Assemble a block from `instructions` and append the sentinel.
    pub fn from_instructions<I>(instructions: I) -> Self
    where
        I: IntoIterator<Item = Instruction>,
    {
        let mut instructions: Vec<Instruction> = instructions.into_iter().collect();
        instructions.push(Instruction::sentinel());
        Self { instructions }
    }

    /// All nodes, sentinel included.
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Instruction> {
        self.instructions.iter()
    }

    /// Number of nodes before the sentinel.
    pub fn len(&self) -> usize {
        self.instructions.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn write_body(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut previous: Option<InstructionKind> = None;
        for instruction in &self.instructions {
            if instruction.kind == InstructionKind::LoopEnd {
                break;
            }
            // Neighbours the parser would fold into one run need a comment between them.
            if previous.is_some_and(|kind| kind.merges_with(instruction.kind)) {
                f.write_str(" ")?;
            }
            write!(f, "{instruction}")?;
            previous = Some(instruction.kind);
        }
        Ok(())
    }
}

// Nested bodies are detached and dropped one by one, so a deeply nested tree
// does not recurse through `Drop`.
impl Drop for Block {
    fn drop(&mut self) {
        let mut pending: Vec<Block> = self
            .instructions
            .iter_mut()
            .filter_map(|instruction| instruction.body.take())
            .collect();
        while let Some(mut block) = pending.pop() {
            pending.extend(
                block
                    .instructions
                    .iter_mut()
                    .filter_map(|instruction| instruction.body.take()),
            );
        }
    }
}

impl Default for Block {
    fn default() -> Self {
        Self::empty()
    }
}

impl<'a> IntoIterator for &'a Block {
    type Item = &'a Instruction;
    type IntoIter = std::slice::Iter<'a, Instruction>;

    fn into_iter(self) -> Self::IntoIter {
        self.instructions.iter()
    }
}

fn write_token(f: &mut fmt::Formatter<'_>, kind: InstructionKind, times: i64) -> fmt::Result {
    let ch = kind.token() as char;
    for _ in 0..times {
        write!(f, "{ch}")?;
    }
    Ok(())
}

/// Canonical source text for the node. Re-parsing it yields the same node.
impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            InstructionKind::LoopStart => {
                write!(f, "{}", TOKEN_LOOP_START as char)?;
                if let Some(body) = &self.body {
                    body.write_body(f)?;
                }
                write!(f, "{}", TOKEN_LOOP_END as char)
            }
            InstructionKind::LoopEnd => Ok(()),
            InstructionKind::Break => write_token(f, self.kind, 1),
            kind => match kind.opposite() {
                // A run whose net is below one keeps its leading token so the
                // node kind survives a round trip.
                Some(opposite) if self.count < 1 => {
                    write_token(f, kind, 1)?;
                    write_token(f, opposite, 1 - self.count)
                }
                _ => write_token(f, kind, self.count),
            },
        }
    }
}

/// Canonical source text for the whole block, without a trailing `l`.
impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_body(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_table_round_trips() {
        for byte in *b"tmLHTMhl#" {
            let kind = InstructionKind::from_token(byte, true).expect("token");
            assert_eq!(kind.token(), byte);
        }
    }

    #[test]
    fn break_token_needs_debug() {
        assert_eq!(InstructionKind::from_token(b'#', false), None);
        assert_eq!(InstructionKind::from_token(b'#', true), Some(InstructionKind::Break));
    }

    #[test]
    fn from_instructions_appends_sentinel() {
        let block = Block::from_instructions([Instruction::new(InstructionKind::Output, 2)]);
        assert_eq!(block.len(), 1);
        assert_eq!(block.instructions().last(), Some(&Instruction::sentinel()));
    }

    #[test]
    fn loop_start_always_has_a_terminated_body() {
        let node = Instruction::new(InstructionKind::LoopStart, 1);
        let body = node.body().expect("loop body");
        assert!(body.is_empty());
        assert_eq!(body.instructions(), &[Instruction::sentinel()]);
        assert!(Instruction::new(InstructionKind::Output, 1).body().is_none());
    }

    #[test]
    fn display_keeps_kind_of_non_positive_runs() {
        assert_eq!(Instruction::new(InstructionKind::Increment, 3).to_string(), "ttt");
        assert_eq!(Instruction::new(InstructionKind::Increment, 0).to_string(), "tm");
        assert_eq!(Instruction::new(InstructionKind::MoveLeft, -1).to_string(), "HLL");
    }

    #[test]
    fn display_nests_loops() {
        let body = Block::from_instructions([Instruction::new(InstructionKind::Decrement, 1)]);
        let block = Block::from_instructions([
            Instruction::new(InstructionKind::Increment, 2),
            Instruction::loop_over(body),
            Instruction::new(InstructionKind::Output, 1),
        ]);
        assert_eq!(block.to_string(), "tthmlT");
    }

    #[test]
    fn display_separates_runs_that_would_fold() {
        let block = Block::from_instructions([
            Instruction::new(InstructionKind::Increment, 2),
            Instruction::new(InstructionKind::Decrement, 2),
            Instruction::new(InstructionKind::Output, 1),
            Instruction::new(InstructionKind::Output, 2),
            Instruction::new(InstructionKind::MoveRight, 1),
        ]);
        assert_eq!(block.to_string(), "tt mmT TTL");
    }
}
