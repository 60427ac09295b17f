use std::env;
use std::io::{self, IsTerminal, Write};

use nu_ansi_term::{Color, Style};
use reedline::{DefaultPrompt, DefaultPromptSegment, Highlighter, HistoryItem, Signal, StyledText};

use crate::cli_util::run_program;
use crate::config::Settings;
use crate::context::StopHandle;
use crate::handlers::StdinInput;
use crate::instruction::InstructionKind;

/// Submissions remembered by the interactive editor.
pub const HISTORY_SIZE: usize = 20;

pub fn repl_loop(settings: &Settings, stop: &StopHandle) -> io::Result<()> {
    let mut editor = init_line_editor(settings.debug)?;

    loop {
        let submission = read_submission_interactive(&mut editor)?;
        let Some(submission) = submission else {
            // EOF or editor closed. End the session cleanly to avoid hanging when stdin is closed
            println!();
            io::stdout().flush()?;
            return Ok(());
        };

        if submission.trim().is_empty() {
            continue;
        }

        // Programs answer Input one line at a time while the editor is idle.
        execute_buffer(&submission, settings, StdinInput::line(), stop);

        if env::var("HTML_REPL_ONCE").ok().as_deref() == Some("1") {
            return Ok(());
        }
    }
}

fn init_line_editor(debug: bool) -> io::Result<reedline::Reedline> {
    use reedline::{
        default_emacs_keybindings, EditCommand, Emacs, FileBackedHistory, KeyCode, KeyModifiers,
        Reedline, ReedlineEvent,
    };

    // Enter inserts a newline, Ctrl+D (Ctrl+Z on Windows) submits the buffer.
    let mut keybindings = default_emacs_keybindings();
    keybindings.add_binding(KeyModifiers::NONE, KeyCode::Enter, ReedlineEvent::Edit(vec![EditCommand::InsertNewline]));
    keybindings.add_binding(KeyModifiers::CONTROL, KeyCode::Char('d'), ReedlineEvent::Submit);
    keybindings.add_binding(KeyModifiers::CONTROL, KeyCode::Char('z'), ReedlineEvent::Submit);
    keybindings.add_binding(KeyModifiers::ALT, KeyCode::Up, ReedlineEvent::PreviousHistory);
    keybindings.add_binding(KeyModifiers::ALT, KeyCode::Down, ReedlineEvent::NextHistory);

    let history = FileBackedHistory::new(HISTORY_SIZE)
        .map_err(|e| io::Error::other(format!("cannot create history: {e}")))?;

    let editor = Reedline::create()
        .with_highlighter(Box::new(TokenHighlighter::new(debug)))
        .with_history(Box::new(history))
        .with_edit_mode(Box::new(Emacs::new(keybindings)));

    Ok(editor)
}

/// Collect all lines until EOF; `None` when nothing was read.
pub fn read_submission<R: io::BufRead>(stdin: &mut R) -> Option<String> {
    let mut buffer = String::new();

    loop {
        let mut line = String::new();
        match stdin.read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => buffer.push_str(&line),
            Err(_) => return None,
        }
    }

    if buffer.is_empty() {
        None
    } else {
        Some(buffer)
    }
}

fn read_submission_interactive(editor: &mut reedline::Reedline) -> io::Result<Option<String>> {
    let prompt = DefaultPrompt::new(DefaultPromptSegment::Basic("html".to_string()), DefaultPromptSegment::Empty);

    match editor.read_line(&prompt) {
        Ok(Signal::Success(buffer)) => {
            if !buffer.trim().is_empty() {
                let _ = editor.history_mut().save(HistoryItem::from_command_line(buffer.clone()));
            }
            Ok(Some(buffer))
        }
        Ok(Signal::CtrlC) | Ok(Signal::CtrlD) => Ok(None),
        Err(e) => {
            eprintln!("repl: editor error: {e}");
            let _ = io::stderr().flush();
            Ok(None)
        }
    }
}

/// Run one submission with a fresh tape. A newline always follows the output
/// so the next prompt starts at column 0.
fn execute_buffer(buffer: &str, settings: &Settings, input: StdinInput, stop: &StopHandle) {
    stop.reset();
    run_program(None, buffer, settings, input, stop, None);
    stop.reset();
    println!();
    let _ = io::stdout().flush();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplMode {
    Bare,
    Editor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeFlagOverride {
    None,
    Bare,
    Editor,
}

/// Flags win over `HTML_REPL_MODE`, which wins over TTY auto-detection.
pub fn select_mode(flag: ModeFlagOverride) -> Result<ReplMode, String> {
    let stdin_is_tty = io::stdin().is_terminal();
    select_mode_with(flag, env::var("HTML_REPL_MODE").ok().as_deref(), stdin_is_tty)
}

fn select_mode_with(flag: ModeFlagOverride, env_mode: Option<&str>, stdin_is_tty: bool) -> Result<ReplMode, String> {
    match flag {
        ModeFlagOverride::Bare => return Ok(ReplMode::Bare),
        ModeFlagOverride::Editor => {
            if !stdin_is_tty {
                return Err("cannot start editor: stdin is not a TTY (use --bare or HTML_REPL_MODE=bare)".to_string());
            }
            return Ok(ReplMode::Editor);
        }
        ModeFlagOverride::None => {}
    }

    if let Some(val) = env_mode {
        return match val.trim().to_ascii_lowercase().as_str() {
            "bare" => Ok(ReplMode::Bare),
            "editor" => {
                if !stdin_is_tty {
                    return Err("cannot start editor: stdin is not a TTY (use HTML_REPL_MODE=bare)".to_string());
                }
                Ok(ReplMode::Editor)
            }
            _ => Err(format!("invalid HTML_REPL_MODE value: {val}, must be 'bare' or 'editor'")),
        };
    }

    if stdin_is_tty {
        Ok(ReplMode::Editor)
    } else {
        Ok(ReplMode::Bare)
    }
}

/// Read all of stdin as one program and run it. Stdin is consumed by the
/// program text, so Input sees end of input.
pub fn execute_bare_once(settings: &Settings, stop: &StopHandle) -> io::Result<()> {
    let mut locked = io::BufReader::new(io::stdin().lock());
    if let Some(submission) = read_submission(&mut locked) {
        if !submission.trim().is_empty() {
            execute_buffer(&submission, settings, StdinInput::raw(), stop);
        }
    }
    Ok(())
}

// Catppuccin Mocha accents.
mod palette {
    use nu_ansi_term::Color;

    pub const SURFACE2: Color = Color::Rgb(108, 112, 134);
    pub const RED: Color = Color::Rgb(243, 139, 168);
    pub const GREEN: Color = Color::Rgb(166, 227, 161);
    pub const YELLOW: Color = Color::Rgb(249, 226, 175);
    pub const MAUVE: Color = Color::Rgb(203, 166, 247);
    pub const PEACH: Color = Color::Rgb(250, 179, 135);
    pub const TEAL: Color = Color::Rgb(148, 226, 213);
    pub const SKY: Color = Color::Rgb(137, 220, 235);
    pub const BLUE: Color = Color::Rgb(137, 180, 250);
}

/// Colors tokens by what they do and dims comments.
struct TokenHighlighter {
    debug: bool,
}

impl TokenHighlighter {
    fn new(debug: bool) -> Self {
        Self { debug }
    }

    fn style_for(&self, ch: char) -> Style {
        let kind = u8::try_from(ch)
            .ok()
            .and_then(|b| InstructionKind::from_token(b, self.debug));
        let color: Color = match kind {
            Some(InstructionKind::MoveRight) => palette::SKY,
            Some(InstructionKind::MoveLeft) => palette::TEAL,
            Some(InstructionKind::Increment) => palette::GREEN,
            Some(InstructionKind::Decrement) => palette::RED,
            Some(InstructionKind::Output) => palette::YELLOW,
            Some(InstructionKind::Input) => palette::PEACH,
            Some(InstructionKind::LoopStart | InstructionKind::LoopEnd) => palette::MAUVE,
            Some(InstructionKind::Break) => palette::BLUE,
            None => return Style::new().fg(palette::SURFACE2),
        };
        Style::new().fg(color).bold()
    }
}

impl Highlighter for TokenHighlighter {
    fn highlight(&self, line: &str, _cursor: usize) -> StyledText {
        let mut out = StyledText::new();
        let mut current: Option<Style> = None;
        let mut buffer = String::new();

        for ch in line.chars() {
            let style = self.style_for(ch);
            match current {
                Some(s) if s != style => {
                    out.push((s, std::mem::take(&mut buffer)));
                    current = Some(style);
                }
                None => current = Some(style),
                _ => {}
            }
            buffer.push(ch);
        }

        if let Some(s) = current {
            if !buffer.is_empty() {
                out.push((s, buffer));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn read_submission_reads_until_eof_multiple_lines() {
        let input = b"ttt\nLtT\n";
        let mut cursor = Cursor::new(&input[..]);
        let got = read_submission(&mut cursor);
        assert_eq!(got.as_deref(), Some("ttt\nLtT\n"));
    }

    #[test]
    fn read_submission_empty_returns_none() {
        let mut cursor = Cursor::new(Vec::<u8>::new());
        assert!(read_submission(&mut cursor).is_none());
    }

    #[test]
    fn mode_flags_override_env() {
        assert_eq!(select_mode_with(ModeFlagOverride::Bare, Some("editor"), true), Ok(ReplMode::Bare));
        assert!(select_mode_with(ModeFlagOverride::Editor, None, false).is_err());
        assert_eq!(select_mode_with(ModeFlagOverride::None, Some("bare"), true), Ok(ReplMode::Bare));
        assert!(select_mode_with(ModeFlagOverride::None, Some("fancy"), true).is_err());
        assert_eq!(select_mode_with(ModeFlagOverride::None, None, false), Ok(ReplMode::Bare));
        assert_eq!(select_mode_with(ModeFlagOverride::None, None, true), Ok(ReplMode::Editor));
    }

    #[test]
    fn highlighter_groups_runs_by_style() {
        let highlighter = TokenHighlighter::new(false);
        let styled = highlighter.highlight("ttm x#", 0);
        let pieces: Vec<&str> = styled.buffer.iter().map(|(_, s)| s.as_str()).collect();
        assert_eq!(pieces, vec!["tt", "m", " x#"]);
    }
}
