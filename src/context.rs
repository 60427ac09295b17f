//! Runtime state for one program run.

use std::fmt;
use std::str::FromStr;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use crate::handlers::{InputHandler, OutputHandler, StdinInput, StdoutOutput};

/// Tape length used when no valid size is requested.
pub const DEFAULT_TAPE_SIZE: usize = 30_000;

/// Largest tape that will be allocated: 256 MiB of cells.
pub const MAX_TAPE_SIZE: usize = 1 << 28;

/// What an Input instruction stores when the input handler reports end of input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EofPolicy {
    /// Leave the current cell as it is.
    #[default]
    Unchanged,
    /// Store 0.
    Zero,
    /// Store -1, i.e. 255.
    MinusOne,
}

impl EofPolicy {
    /// The value to store for end of input, if any.
    pub fn value(self) -> Option<u8> {
        match self {
            EofPolicy::Unchanged => None,
            EofPolicy::Zero => Some(0),
            EofPolicy::MinusOne => Some(u8::MAX),
        }
    }
}

impl FromStr for EofPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unchanged" | "keep" => Ok(EofPolicy::Unchanged),
            "zero" | "0" => Ok(EofPolicy::Zero),
            "minus-one" | "minus_one" | "-1" | "255" => Ok(EofPolicy::MinusOne),
            _ => Err(format!(
                "invalid EOF policy: {s}, must be 'unchanged', 'zero' or 'minus-one'"
            )),
        }
    }
}

impl fmt::Display for EofPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EofPolicy::Unchanged => write!(f, "unchanged"),
            EofPolicy::Zero => write!(f, "zero"),
            EofPolicy::MinusOne => write!(f, "minus-one"),
        }
    }
}

/// Turn a user-requested tape size into a usable one: anything below 1 or above
/// [`MAX_TAPE_SIZE`] selects [`DEFAULT_TAPE_SIZE`].
pub fn tape_size_from_request(requested: i64) -> usize {
    usize::try_from(requested)
        .ok()
        .filter(|&size| size > 0 && size <= MAX_TAPE_SIZE)
        .unwrap_or(DEFAULT_TAPE_SIZE)
}

/// Cross-thread stop request for a running program.
///
/// Clones share one flag. The engine checks it after every instruction.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    flag: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// The tape, data pointer, I/O handlers and stop flag of one run.
pub struct ExecutionContext {
    tape: Vec<u8>,
    pointer: usize,
    output: Box<dyn OutputHandler + Send>,
    input: Box<dyn InputHandler + Send>,
    eof_policy: EofPolicy,
    stop: StopHandle,
}

impl ExecutionContext {
    /// Create a context with `tape_size` zeroed cells, reading stdin and writing
    /// stdout. A size of 0 or above [`MAX_TAPE_SIZE`] selects [`DEFAULT_TAPE_SIZE`].
    pub fn new(tape_size: usize) -> Self {
        let tape_size = if tape_size == 0 || tape_size > MAX_TAPE_SIZE {
            DEFAULT_TAPE_SIZE
        } else {
            tape_size
        };
        Self {
            tape: vec![0; tape_size],
            pointer: 0,
            output: Box::new(StdoutOutput),
            input: Box::new(StdinInput::raw()),
            eof_policy: EofPolicy::default(),
            stop: StopHandle::new(),
        }
    }

    /// Replace the output handler.
    pub fn set_output_handler<H>(&mut self, handler: H)
    where
        H: OutputHandler + Send + 'static,
    {
        self.output = Box::new(handler);
    }

    /// Replace the input handler.
    pub fn set_input_handler<H>(&mut self, handler: H)
    where
        H: InputHandler + Send + 'static,
    {
        self.input = Box::new(handler);
    }

    pub fn set_eof_policy(&mut self, policy: EofPolicy) {
        self.eof_policy = policy;
    }

    /// Share an existing stop flag, e.g. one owned by a signal handler.
    pub fn set_stop_handle(&mut self, stop: StopHandle) {
        self.stop = stop;
    }

    /// A handle that can stop this run from another thread.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Ask the running program to stop at the next instruction boundary.
    pub fn stop(&self) {
        self.stop.request();
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.is_requested()
    }

    pub fn tape(&self) -> &[u8] {
        &self.tape
    }

    pub fn tape_size(&self) -> usize {
        self.tape.len()
    }

    pub fn pointer(&self) -> usize {
        self.pointer
    }

    pub fn eof_policy(&self) -> EofPolicy {
        self.eof_policy
    }

    /// Value of the cell under the pointer.
    pub fn current(&self) -> u8 {
        self.tape[self.pointer]
    }

    pub(crate) fn current_mut(&mut self) -> &mut u8 {
        &mut self.tape[self.pointer]
    }

    pub(crate) fn set_pointer(&mut self, pointer: usize) {
        debug_assert!(pointer < self.tape.len());
        self.pointer = pointer;
    }

    pub(crate) fn output(&mut self) -> &mut (dyn OutputHandler + Send) {
        self.output.as_mut()
    }

    pub(crate) fn input(&mut self) -> &mut (dyn InputHandler + Send) {
        self.input.as_mut()
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new(DEFAULT_TAPE_SIZE)
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("tape_size", &self.tape.len())
            .field("pointer", &self.pointer)
            .field("eof_policy", &self.eof_policy)
            .field("stop_requested", &self.stop.is_requested())
            .finish_non_exhaustive()
    }
}
