use std::env;
use std::io::{self, Write};

use clap::{Parser, Subcommand};
use rust_html::commands::{self, fmt::FmtArgs, repl::ReplArgs, run::RunArgs};

fn print_top_usage_and_exit(program: &str, code: i32) -> ! {
    eprintln!(
        r#"Usage:
  {0} run  [OPTIONS] "<code>"        # Run HTML code (args are concatenated)
  {0} run  [OPTIONS] --file <PATH>   # Run HTML code loaded from file
  {0} fmt  [--debug] [CODE...]       # Print the canonical form of a program
  {0} repl [--bare|--editor]         # Start an HTML REPL (read-eval-print loop)

With no subcommand, starts the REPL.
Run "{0} <subcommand> --help" for more info.
"#,
        program
    );
    let _ = io::stderr().flush();
    std::process::exit(code);
}

#[derive(Parser, Debug)]
#[command(name = "html", disable_help_flag = true, disable_help_subcommand = true)]
struct Cli {
    /// Show this help
    #[arg(short = 'h', long = "help", action = clap::ArgAction::SetTrue)]
    help: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    Run(RunArgs),
    Fmt(FmtArgs),
    Repl(ReplArgs),
}

fn main() {
    let program = env::args().next().unwrap_or_else(|| "html".to_string());

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            eprintln!("{e}");
            print_top_usage_and_exit(&program, 2);
        }
    };

    if cli.help {
        print_top_usage_and_exit(&program, 0);
    }

    let code = match cli.command {
        Some(Command::Run(args)) => commands::run::run(&program, args),
        Some(Command::Fmt(args)) => commands::fmt::run(&program, args),
        Some(Command::Repl(args)) => commands::repl::run(&program, args),
        None => commands::repl::run(&program, ReplArgs::default()),
    };

    std::process::exit(code);
}
