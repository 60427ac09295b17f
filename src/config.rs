use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::sync::OnceLock;

use cross_xdg::BaseDirs;

use crate::context::{DEFAULT_TAPE_SIZE, EofPolicy, tape_size_from_request};
use crate::parser::{ParseMode, ParseOptions};

/// Interpreter defaults read from `html.toml`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    pub tape_size: usize,
    pub eof_policy: EofPolicy,
    /// Recognise `#` as the tape dump instruction.
    pub debug: bool,
    /// Report unbalanced loops instead of tolerating them.
    pub strict: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            tape_size: DEFAULT_TAPE_SIZE,
            eof_policy: EofPolicy::default(),
            debug: false,
            strict: false,
        }
    }
}

impl Settings {
    pub fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            mode: if self.strict { ParseMode::Strict } else { ParseMode::Permissive },
            debug_token: self.debug,
            terminator: None,
        }
    }
}

static SETTINGS: OnceLock<Settings> = OnceLock::new();

pub fn settings() -> &'static Settings {
    SETTINGS.get_or_init(|| load_from_toml().unwrap_or_default())
}

/// `$HTML_CONFIG` if set, otherwise `html.toml` in the XDG config home.
pub fn config_path() -> Option<PathBuf> {
    if let Some(path) = env::var_os("HTML_CONFIG") {
        return Some(PathBuf::from(path));
    }

    // On Linux: resolves to /home/<user>/.config
    // On Windows: resolves to C:\Users\<user>\.config
    // On macOS: resolves to /Users/<user>/.config
    let base_dirs = BaseDirs::new().ok()?;
    let mut path = PathBuf::from(base_dirs.config_home());
    path.push("html.toml");
    Some(path)
}

fn load_from_toml() -> Option<Settings> {
    let content = fs::read_to_string(config_path()?).ok()?;
    Some(parse_settings(&content))
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

/// Read the `[interpreter]` section of a config file. Unknown keys and
/// unparsable values keep their defaults.
pub fn parse_settings(content: &str) -> Settings {
    // Very small hand-rolled parser: look for [interpreter] section and key = value pairs
    let mut in_section = false;
    let mut map: HashMap<String, String> = HashMap::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') { continue; }
        if line.starts_with('[') && line.ends_with(']') {
            in_section = &line[1..line.len()-1] == "interpreter";
            continue;
        }
        if !in_section { continue; }
        if let Some(eq) = line.find('=') {
            let key = line[..eq].trim().to_string();
            let val_raw = line[eq+1..].trim();
            // Accept quoted or unquoted
            let val = if val_raw.starts_with('"') && val_raw.ends_with('"') && val_raw.len() >= 2 {
                val_raw[1..val_raw.len()-1].to_string()
            } else { val_raw.to_string() };
            map.insert(key, val);
        }
    }

    let mut cfg = Settings::default();

    if let Some(size) = map.get("tape_size") {
        cfg.tape_size = size.trim().parse::<i64>().map(tape_size_from_request).unwrap_or(DEFAULT_TAPE_SIZE);
    }
    if let Some(policy) = map.get("eof").and_then(|s| s.parse::<EofPolicy>().ok()) {
        cfg.eof_policy = policy;
    }
    if let Some(debug) = map.get("debug").and_then(|s| parse_bool(s)) {
        cfg.debug = debug;
    }
    if let Some(strict) = map.get("strict").and_then(|s| parse_bool(s)) {
        cfg.strict = strict;
    }

    cfg
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_is_default() {
        assert_eq!(parse_settings(""), Settings::default());
    }

    #[test]
    fn reads_interpreter_section() {
        let cfg = parse_settings(
            r#"
# user settings
[interpreter]
tape_size = 64
eof = "zero"
debug = true
strict = yes
"#,
        );
        assert_eq!(cfg.tape_size, 64);
        assert_eq!(cfg.eof_policy, EofPolicy::Zero);
        assert!(cfg.debug);
        assert!(cfg.strict);
        assert_eq!(cfg.parse_options().mode, ParseMode::Strict);
        assert!(cfg.parse_options().debug_token);
    }

    #[test]
    fn other_sections_are_ignored() {
        let cfg = parse_settings("[colors]\ntape_size = 5\n[interpreter]\neof = minus-one\n");
        assert_eq!(cfg.tape_size, DEFAULT_TAPE_SIZE);
        assert_eq!(cfg.eof_policy, EofPolicy::MinusOne);
    }

    #[test]
    fn invalid_values_fall_back() {
        let cfg = parse_settings("[interpreter]\ntape_size = -3\neof = maybe\ndebug = perhaps\n");
        assert_eq!(cfg, Settings::default());

        let cfg = parse_settings("[interpreter]\ntape_size = lots\n");
        assert_eq!(cfg.tape_size, DEFAULT_TAPE_SIZE);

        let cfg = parse_settings("[interpreter]\ntape_size = 100000000000000\n");
        assert_eq!(cfg.tape_size, DEFAULT_TAPE_SIZE);
    }
}
