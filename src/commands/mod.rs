//! Subcommands of the `html` binary.

use std::io::{self, Write};

use crate::context::StopHandle;

pub mod fmt;
pub mod repl;
pub mod run;

/// First Ctrl+C asks the running program to stop; a second one exits at once.
pub fn install_stop_handler(stop: &StopHandle) -> Result<(), ctrlc::Error> {
    let stop = stop.clone();
    ctrlc::set_handler(move || {
        if stop.is_requested() {
            let _ = io::stdout().flush();
            let _ = io::stderr().flush();
            std::process::exit(130);
        }
        stop.request();
    })
}
