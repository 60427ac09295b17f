use std::fs;
use std::io::{self, Write};

use clap::Args;

use crate::cli_util::print_parse_error;
use crate::config;
use crate::parser::{ParseOptions, parse_stream, parse_str};

#[derive(Args, Debug)]
#[command(disable_help_flag = true)]
pub struct FmtArgs {
    /// Keep '#' tape dump instructions
    #[arg(short = 'd', long = "debug")]
    pub debug: bool,

    /// Read HTML code from PATH (otherwise reads from positional code or STDIN)
    #[arg(short = 'f', long = "file")]
    pub file: Option<String>,

    /// Concatenated HTML code parts. If omitted, reads from STDIN.
    #[arg(value_name = "code", trailing_var_arg = true)]
    pub code: Vec<String>,

    /// Show this help
    #[arg(short = 'h', long = "help", action = clap::ArgAction::SetTrue)]
    pub help: bool,
}

pub fn run(program: &str, args: FmtArgs) -> i32 {
    if args.help {
        usage_and_exit(program, 0);
    }

    let FmtArgs {
        debug,
        file,
        code,
        ..
    } = args;

    if file.is_some() && !code.is_empty() {
        eprintln!("{program}: cannot use positional code together with --file");
        usage_and_exit(program, 2);
    }

    let mut options = config::settings().parse_options();
    options.debug_token |= debug;

    let (source, parsed) = match file {
        Some(path) => match fs::read_to_string(&path) {
            Ok(s) => {
                let parsed = parse_str(&s, options);
                (s, parsed)
            }
            Err(e) => {
                eprintln!("{program}: failed to read code file as UTF-8: {e}");
                let _ = io::stderr().flush();
                return 1;
            }
        },
        None if !code.is_empty() => {
            let s = code.join("");
            let parsed = parse_str(&s, options);
            (s, parsed)
        }
        None => (String::new(), parse_stream(io::stdin().lock(), options)),
    };

    match parsed {
        Ok(tree) => {
            println!("{tree}");
            let _ = io::stdout().flush();
            0
        }
        Err(err) => {
            print_parse_error(Some(program), &source, &err);
            1
        }
    }
}

/// Canonical form of `source`: comments dropped, runs collapsed to their net.
pub fn canonical(source: &str, options: ParseOptions) -> Result<String, crate::ParseError> {
    Ok(parse_str(source, options)?.to_string())
}

fn usage_and_exit(program: &str, code: i32) -> ! {
    eprintln!(
        r#"Usage:
  {0} fmt [--debug] [CODE...]        # Format CODE args, or STDIN if no CODE is given
  {0} fmt [--debug] --file <PATH>    # Format the program in PATH

Options:
  --file,  -f <PATH>  Read the program from PATH
  --debug, -d         Keep '#' tape dump instructions
  --help,  -h         Show this help

Description:
  Prints the canonical form of a program: comments are dropped and every run
  of t/m, L/H, T or M is written as its net count. Formatting a formatted
  program changes nothing.
"#,
        program
    );
    let _ = io::stderr().flush();
    std::process::exit(code);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_drops_comments_and_collapses_runs() {
        let out = canonical("tttmm <- add\nhLl", ParseOptions::default()).unwrap();
        assert_eq!(out, "thLl");
    }

    #[test]
    fn canonical_is_idempotent() {
        let once = canonical("tmm LHH hTTl hh", ParseOptions::default()).unwrap();
        let twice = canonical(&once, ParseOptions::default()).unwrap();
        assert_eq!(once, twice);
    }
}
