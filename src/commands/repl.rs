use std::io::{self, IsTerminal, Write};

use clap::Args;

use crate::commands::install_stop_handler;
use crate::config;
use crate::context::StopHandle;
use crate::repl::{HISTORY_SIZE, ModeFlagOverride, ReplMode, execute_bare_once, repl_loop, select_mode};

#[derive(Args, Debug, Default)]
#[command(disable_help_flag = true)]
pub struct ReplArgs {
    /// Force non-interactive bare mode
    #[arg(long = "bare", conflicts_with = "editor")]
    pub bare: bool,

    /// Force interactive mode (errors if stdin is not a TTY)
    #[arg(long = "editor", conflicts_with = "bare")]
    pub editor: bool,

    /// Show this help
    #[arg(short = 'h', long = "help", action = clap::ArgAction::SetTrue)]
    pub help: bool,
}

impl ReplArgs {
    fn mode_flag(&self) -> ModeFlagOverride {
        match (self.bare, self.editor) {
            (true, _) => ModeFlagOverride::Bare,
            (_, true) => ModeFlagOverride::Editor,
            _ => ModeFlagOverride::None,
        }
    }
}

pub fn run(program: &str, args: ReplArgs) -> i32 {
    if args.help {
        usage_and_exit(program, 0);
    }

    // flags -> env -> auto-detect
    let mode = match select_mode(args.mode_flag()) {
        Ok(m) => m,
        Err(msg) => {
            eprintln!("{program}: {msg}");
            let _ = io::stderr().flush();
            return 1;
        }
    };

    let stop = StopHandle::new();
    if let Err(e) = install_stop_handler(&stop) {
        eprintln!("{program}: failed to set ctrl+c handler: {e}");
        let _ = io::stderr().flush();
        return 1;
    }

    let settings = config::settings();
    let result = match mode {
        ReplMode::Editor => {
            if io::stderr().is_terminal() {
                eprintln!("HTML REPL (interactive editor mode)");
                eprintln!("Ctrl+d/Ctrl+z (Windows) executes the current buffer. Ctrl+c stops a running program");
                let _ = io::stderr().flush();
            }
            repl_loop(settings, &stop)
        }
        ReplMode::Bare => execute_bare_once(settings, &stop),
    };

    match result {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("{program}: REPL error: {e}");
            let _ = io::stderr().flush();
            1
        }
    }
}

fn usage_and_exit(program: &str, code: i32) -> ! {
    eprintln!(
        r#"Usage:
  {0} repl   # Start an HTML REPL (read-eval-print loop)

Options:
  --help,   -h        Show this help
  --bare              Force non-interactive bare mode
  --editor            Force interactive editor mode (errors if stdin is not a TTY)

Description:
  Starts a REPL where you can enter HTML code and execute it live.

Notes:
    - Enter inserts a newline; Ctrl+D executes the current buffer on *nix/macOS.
    - Ctrl+Z executes the current buffer on Windows.
    - Ctrl+C stops a running program; on an empty prompt it leaves the REPL.
    - Each execution starts with a fresh tape and pointer, and is followed by a newline.
    - Input (`M`) reads from the line typed after the program starts.
    - The last {1} submissions are kept in history (Alt+Up / Alt+Down).
    - The REPL exits after a single execution if `HTML_REPL_ONCE` is set to `1`.
    - Mode selection:
        * Flags: --bare|--editor override environment and auto-detection.
        * Env: HTML_REPL_MODE=bare|editor overrides auto-detection.
        * Auto-detect: if stdin is a TTY, starts in interactive editor mode; otherwise, bare mode.
"#,
        program, HISTORY_SIZE
    );
    let _ = io::stderr().flush();
    std::process::exit(code);
}
