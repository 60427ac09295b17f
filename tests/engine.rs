// Library-level behaviour of parsing and execution through the public API.

use std::io;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use rust_html::{
    Block, EofPolicy, ExecutionContext, ExecutionError, InstructionKind, ParseMode, ParseOptions,
    StopHandle, execute, parse_one, parse_stream_until, parse_str, parse_substr,
};

fn capture(context: &mut ExecutionContext) -> Arc<Mutex<Vec<u8>>> {
    let out = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&out);
    context.set_output_handler(move |byte: u8| -> io::Result<()> {
        sink.lock().unwrap().push(byte);
        Ok(())
    });
    out
}

fn feed(context: &mut ExecutionContext, bytes: &[u8]) {
    let mut pending = bytes.to_vec().into_iter();
    context.set_input_handler(move || -> Option<u8> { pending.next() });
}

fn run(source: &str, context: &mut ExecutionContext) -> Result<(), ExecutionError> {
    let block = parse_str(source, ParseOptions::default()).unwrap();
    execute(&block, context)
}

#[test]
fn increments_wrap_after_256() {
    let mut context = ExecutionContext::new(4);
    run(&"t".repeat(256), &mut context).unwrap();
    assert_eq!(context.current(), 0);
    run(&"t".repeat(300), &mut context).unwrap();
    assert_eq!(context.current(), 44);
}

#[test]
fn loop_runs_counter_times() {
    // cell0 = 8; each pass adds 3 to cell1
    let mut context = ExecutionContext::new(4);
    run("tttttttthLtttHml", &mut context).unwrap();
    assert_eq!(&context.tape()[..2], &[0, 24]);
    assert_eq!(context.pointer(), 0);
}

#[test]
fn cancelling_pairs_do_nothing() {
    let mut context = ExecutionContext::new(4);
    run("tmtmLHmt", &mut context).unwrap();
    assert_eq!(context.tape(), &[0, 0, 0, 0]);
    assert_eq!(context.pointer(), 0);
}

#[test]
fn copy_byte_with_zero_eof() {
    let mut context = ExecutionContext::new(8);
    context.set_eof_policy(EofPolicy::Zero);
    feed(&mut context, b"html!");
    let out = capture(&mut context);
    run("MhTMl", &mut context).unwrap();
    assert_eq!(out.lock().unwrap().as_slice(), b"html!");
}

#[test]
fn input_then_output_echoes_once_in_place() {
    let mut context = ExecutionContext::new(4);
    feed(&mut context, &[65]);
    let out = capture(&mut context);
    run("MT", &mut context).unwrap();
    assert_eq!(out.lock().unwrap().as_slice(), &[65]);
    assert_eq!(context.pointer(), 0);
    assert_eq!(context.current(), 65);
}

#[test]
fn deep_nesting_parses_and_runs() {
    let depth = 100_000;
    let mut context = ExecutionContext::new(2);
    let out = capture(&mut context);
    run(&format!("t{}mT{}tT", "h".repeat(depth), "l".repeat(depth)), &mut context).unwrap();
    assert_eq!(out.lock().unwrap().as_slice(), &[0, 1]);
}

#[test]
fn move_right_to_last_cell_is_allowed() {
    let mut context = ExecutionContext::new(5);
    run("LLLL", &mut context).unwrap();
    assert_eq!(context.pointer(), 4);
    assert!(matches!(
        run("L", &mut context),
        Err(ExecutionError::TapeOverrun { tape_size: 5, .. })
    ));
}

#[test]
fn canonical_text_reparses_to_the_same_tree() {
    let sources = ["tmm", "HL", "hhTlLl", "MMMTT hmml", "x y z", "tt mm LL H T T"];
    for source in sources {
        let tree = parse_str(source, ParseOptions::default()).unwrap();
        let again = parse_str(&tree.to_string(), ParseOptions::default()).unwrap();
        assert_eq!(tree, again, "{source:?}");
    }
}

#[test]
fn empty_program_leaves_state_alone() {
    let mut context = ExecutionContext::new(3);
    execute(&Block::empty(), &mut context).unwrap();
    assert_eq!(context.tape(), &[0, 0, 0]);
}

#[test]
fn substr_and_single_token_parsing() {
    let block = parse_substr("xxtttLLxx", 2, Some(5), ParseOptions::default()).unwrap();
    assert_eq!(block.len(), 1);
    assert_eq!(block.instructions()[0].kind(), InstructionKind::Increment);
    assert_eq!(block.instructions()[0].count(), 3);

    let single = parse_one('T', ParseOptions::default()).unwrap();
    assert_eq!(single.kind(), InstructionKind::Output);
    assert_eq!(single.count(), 1);
    assert!(parse_one('?', ParseOptions::default()).is_err());
    assert!(parse_one('#', ParseOptions::default()).is_err());
    assert!(parse_one('#', ParseOptions::default().with_debug_token(true)).is_ok());
}

#[test]
fn stream_parsing_stops_at_terminator() {
    let input = io::Cursor::new(b"htt\nTl".to_vec());
    let block = parse_stream_until(input, b'\n', ParseOptions::default()).unwrap();
    assert_eq!(block.len(), 1);
    let body = block.instructions()[0].body().unwrap();
    assert_eq!(body.len(), 1);
}

#[test]
fn strict_parsing_reports_offsets() {
    let strict = ParseOptions { mode: ParseMode::Strict, ..ParseOptions::default() };
    let err = parse_str("tt l", strict).unwrap_err();
    assert_eq!(err.to_string(), "Unmatched loop 'l' at offset 3");
}

#[test]
fn stop_handle_ends_an_infinite_loop() {
    let stop = StopHandle::new();
    let remote = stop.clone();
    let worker = thread::spawn(move || {
        let mut context = ExecutionContext::new(2);
        context.set_stop_handle(stop);
        run("thl", &mut context)
    });
    thread::sleep(Duration::from_millis(50));
    remote.request();
    assert!(worker.join().unwrap().is_ok());
}
