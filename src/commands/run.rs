use std::fs;
use std::io::{self, Write};
use std::time::Duration;

use clap::Args;

use crate::cli_util::run_program;
use crate::commands::install_stop_handler;
use crate::config::{self, Settings};
use crate::context::{EofPolicy, MAX_TAPE_SIZE, StopHandle, tape_size_from_request};
use crate::handlers::StdinInput;

#[derive(Args, Debug)]
#[command(disable_help_flag = true)]
pub struct RunArgs {
    /// Recognise '#' as the tape dump instruction
    #[arg(short = 'd', long = "debug")]
    pub debug: bool,

    /// Report unbalanced loops instead of tolerating them
    #[arg(short = 's', long = "strict")]
    pub strict: bool,

    /// Number of tape cells; values below 1 select the default of 30000
    #[arg(
        short = 't',
        long = "tape-size",
        value_name = "CELLS",
        allow_negative_numbers = true,
        value_parser = clap::value_parser!(i64).range(..=MAX_TAPE_SIZE as i64)
    )]
    pub tape_size: Option<i64>,

    /// What Input stores at end of input: unchanged, zero or minus-one
    #[arg(long = "eof", value_name = "POLICY")]
    pub eof: Option<EofPolicy>,

    /// Read HTML code from PATH instead of positional "<code>"
    #[arg(short = 'f', long = "file")]
    pub file: Option<String>,

    /// Concatenated HTML code parts
    #[arg(value_name = "code", trailing_var_arg = true)]
    pub code: Vec<String>,

    /// Stop the program after MS milliseconds of wall-clock time
    #[arg(long = "timeout", value_name = "MS")]
    pub timeout_ms: Option<u64>,

    /// Show this help
    #[arg(short = 'h', long = "help", action = clap::ArgAction::SetTrue)]
    pub help: bool,
}

/// Flags override the config file.
fn merge_settings(base: &Settings, args: &RunArgs) -> Settings {
    let mut settings = *base;
    settings.debug |= args.debug;
    settings.strict |= args.strict;
    if let Some(requested) = args.tape_size {
        settings.tape_size = tape_size_from_request(requested);
    }
    if let Some(policy) = args.eof {
        settings.eof_policy = policy;
    }
    settings
}

pub fn run(program: &str, args: RunArgs) -> i32 {
    if args.help {
        usage_and_exit(program, 0);
    }

    if args.file.is_none() && args.code.is_empty() {
        usage_and_exit(program, 2);
    }

    if args.file.is_some() && !args.code.is_empty() {
        eprintln!("{program}: cannot use positional code together with --file");
        usage_and_exit(program, 2);
    }

    let settings = merge_settings(config::settings(), &args);

    let code_str = if let Some(path) = &args.file {
        match fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("{program}: failed to read code file as UTF-8: {e}");
                let _ = io::stderr().flush();
                return 1;
            }
        }
    } else {
        args.code.join("")
    };

    let stop = StopHandle::new();
    if let Err(e) = install_stop_handler(&stop) {
        eprintln!("{program}: failed to set ctrl+c handler: {e}");
        let _ = io::stderr().flush();
        return 1;
    }

    let timeout = args.timeout_ms.map(Duration::from_millis);
    run_program(Some(program), &code_str, &settings, StdinInput::raw(), &stop, timeout).exit_code()
}

fn usage_and_exit(program: &str, code: i32) -> ! {
    eprintln!(
        r#"Usage:
  {0} run [OPTIONS] "<code>"
  {0} run [OPTIONS] --file <PATH>

Options:
  --file,      -f <PATH>   Read HTML code from PATH instead of positional "<code>"
  --debug,     -d          Recognise '#' as the tape dump instruction
  --strict,    -s          Report unbalanced 'h'/'l' instead of tolerating them
  --tape-size, -t <CELLS>  Number of tape cells (default 30000, at most 268435456)
  --eof <POLICY>           End of input: unchanged (default), zero, minus-one
  --timeout <MS>           Stop the program after MS milliseconds
  --help,      -h          Show this help

Notes:
- Input (`M`) reads a single byte from stdin.
- Characters other than t m L H T M h l are comments.
- Moving the pointer off the tape aborts with exit status 1.
- Ctrl+C stops the running program (exit status 130); press it twice to quit at once.
- Defaults come from html.toml in your config directory (or $HTML_CONFIG).

Examples:
- Load HTML code from a file:
    {0} run --file ./hello.html
- Echo stdin until end of input:
    {0} run --eof zero "MhTMl" < input.txt
"#,
        program
    );
    let _ = io::stderr().flush();
    std::process::exit(code);
}
