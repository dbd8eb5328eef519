//! CLI - Command Line Interface for clipdeck
//!
//! Every browse operation is scriptable and JSON-parseable. `play` is the one
//! interactive command: it reads single key presses and maps them to player
//! actions.
//!
//! # Examples
//!
//! ```bash
//! clipdeck popular --limit 5
//! clipdeck search "ocean waves" --json
//! clipdeck info 856479
//! clipdeck play 856479 --fullscreen
//! ```

use clap::{Args, Parser, Subcommand};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use serde::{Deserialize, Serialize};
use std::io::IsTerminal;
use std::path::PathBuf;

use crate::error::{DataError, LocalError};
use crate::player::PlayerAction;

// =============================================================================
// Exit Codes
// =============================================================================

/// Exit codes for CLI operations (semantic for scripting)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,
    /// General error
    Error = 1,
    InvalidArgs = 2,
    NetworkError = 3,
    /// Media could not be loaded or played
    PlaybackFailed = 4,
    /// Local cache could not be read or written
    CacheError = 5,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> i32 {
        code as i32
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> std::process::ExitCode {
        std::process::ExitCode::from(code as u8)
    }
}

impl From<&DataError> for ExitCode {
    fn from(err: &DataError) -> Self {
        match err {
            DataError::Remote(_) => ExitCode::NetworkError,
            DataError::Local(LocalError::DiskFull | LocalError::Storage(_)) => {
                ExitCode::CacheError
            }
        }
    }
}

// =============================================================================
// Main CLI Structure
// =============================================================================

/// clipdeck - browse and play Pexels videos from the terminal
#[derive(Parser, Debug)]
#[command(
    name = "clipdeck",
    version,
    about = "Browse and play Pexels videos from the terminal",
    arg_required_else_help = true,
    after_help = "EXAMPLES:\n\
                  clipdeck popular                    Popular videos (cached)\n\
                  clipdeck search \"city night\"        Search the catalog\n\
                  clipdeck play 856479                Play with keyboard controls\n\n\
                  PLAY KEYS:\n\
                  space play/pause   left/right seek 3s   0-9 jump to 0-90%\n\
                  f fullscreen   c controls   l lock   +/- speed   r retry   q quit"
)]
pub struct Cli {
    /// Output format as JSON (default for non-TTY)
    #[arg(long, short = 'j', global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Path to config file
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Check if JSON output should be used
    pub fn should_json(&self) -> bool {
        self.json || !std::io::stdout().is_terminal()
    }
}

// =============================================================================
// Subcommands
// =============================================================================

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List popular videos (served from the cache when populated)
    #[command(visible_alias = "p")]
    Popular(PopularCmd),

    /// Search the catalog
    #[command(visible_alias = "s")]
    Search(SearchCmd),

    /// Show playback detail for one video
    #[command(visible_alias = "i")]
    Info(InfoCmd),

    /// List everything in the local cache
    Cached(CachedCmd),

    /// Play a video in mpv with keyboard controls
    Play(PlayCmd),
}

/// List popular videos
#[derive(Args, Debug)]
pub struct PopularCmd {
    /// Skip the cache and fetch from the network
    #[arg(long, short = 'r')]
    pub refresh: bool,

    /// Maximum number of results
    #[arg(long, short = 'l')]
    pub limit: Option<usize>,
}

/// Search videos by keyword
#[derive(Args, Debug)]
pub struct SearchCmd {
    #[arg(required = true)]
    pub query: String,

    /// Maximum number of results
    #[arg(long, short = 'l')]
    pub limit: Option<usize>,
}

#[derive(Args, Debug)]
pub struct InfoCmd {
    /// Pexels video id
    pub id: u64,
}

#[derive(Args, Debug)]
pub struct CachedCmd {}

#[derive(Args, Debug)]
pub struct PlayCmd {
    /// Pexels video id
    pub id: u64,

    /// Open paused instead of playing immediately
    #[arg(long)]
    pub paused: bool,

    /// Start in fullscreen
    #[arg(long, short = 'f')]
    pub fullscreen: bool,
}

// =============================================================================
// Play Keys
// =============================================================================

/// Seconds moved by the arrow keys
pub const SEEK_STEP_SECS: i64 = 3;
/// Speed change per `+`/`-` press
pub const SPEED_STEP: f32 = 0.25;

/// What a key press means during interactive playback
#[derive(Debug, Clone, PartialEq)]
pub enum KeyCommand {
    Player(PlayerAction),
    /// Change speed relative to the current one
    SpeedStep(f32),
    Quit,
}

/// Map a key press to a playback command
pub fn key_to_command(key: KeyEvent) -> Option<KeyCommand> {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return Some(KeyCommand::Quit);
    }

    let action = match key.code {
        KeyCode::Char(' ') | KeyCode::Char('k') => PlayerAction::PlayPause,
        KeyCode::Left => PlayerAction::SeekBySeconds(-SEEK_STEP_SECS),
        KeyCode::Right => PlayerAction::SeekBySeconds(SEEK_STEP_SECS),
        KeyCode::Char(c @ '0'..='9') => {
            let tenths = c.to_digit(10).unwrap_or(0) as f32;
            PlayerAction::SeekTo(tenths / 10.0)
        }
        KeyCode::Char('f') => PlayerAction::ToggleFullscreen,
        KeyCode::Char('c') => PlayerAction::ToggleControls,
        KeyCode::Char('l') => PlayerAction::ToggleLock,
        KeyCode::Char('r') => PlayerAction::Retry,
        KeyCode::Char('+') | KeyCode::Char('=') => return Some(KeyCommand::SpeedStep(SPEED_STEP)),
        KeyCode::Char('-') => return Some(KeyCommand::SpeedStep(-SPEED_STEP)),
        KeyCode::Char('q') | KeyCode::Esc => return Some(KeyCommand::Quit),
        _ => return None,
    };
    Some(KeyCommand::Player(action))
}

// =============================================================================
// JSON Output Types
// =============================================================================

/// Generic JSON output wrapper with status
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonOutput<T: Serialize> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "is_zero")]
    pub exit_code: i32,
}

fn is_zero(n: &i32) -> bool {
    *n == 0
}

impl<T: Serialize> JsonOutput<T> {
    pub fn success(data: T) -> Self {
        Self {
            data: Some(data),
            error: None,
            exit_code: 0,
        }
    }

    pub fn error_msg(msg: impl Into<String>, code: ExitCode) -> JsonOutput<()> {
        JsonOutput::<()> {
            data: None,
            error: Some(msg.into()),
            exit_code: code.into(),
        }
    }
}

// =============================================================================
// Output Helpers
// =============================================================================

/// Output handler for consistent formatting
pub struct Output {
    pub json: bool,
    pub quiet: bool,
}

impl Output {
    pub fn new(cli: &Cli) -> Self {
        Self {
            json: cli.should_json(),
            quiet: cli.quiet,
        }
    }

    /// Print data as a JSON envelope, or as lines via `Display` otherwise
    pub fn print<T: Serialize>(&self, data: T, human: impl FnOnce(&T) -> String) -> anyhow::Result<()> {
        if self.json {
            let output = JsonOutput::success(data);
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!("{}", human(&data));
        }
        Ok(())
    }

    /// Print error and return exit code
    pub fn error(&self, msg: impl Into<String>, code: ExitCode) -> ExitCode {
        let msg = msg.into();
        if self.json {
            let output = JsonOutput::<()>::error_msg(&msg, code);
            if let Ok(json) = serde_json::to_string_pretty(&output) {
                eprintln!("{}", json);
            }
        } else if !self.quiet {
            eprintln!("Error: {}", msg);
        }
        code
    }

    /// Print info message (suppressed in quiet mode)
    pub fn info(&self, msg: impl std::fmt::Display) {
        if !self.quiet && !self.json {
            eprintln!("{}", msg);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use crossterm::event::KeyEventKind;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_digit_keys_seek_to_tenths() {
        assert_eq!(
            key_to_command(key(KeyCode::Char('0'))),
            Some(KeyCommand::Player(PlayerAction::SeekTo(0.0)))
        );
        assert_eq!(
            key_to_command(key(KeyCode::Char('7'))),
            Some(KeyCommand::Player(PlayerAction::SeekTo(0.7)))
        );
    }

    #[test]
    fn test_transport_keys() {
        assert_eq!(
            key_to_command(key(KeyCode::Char(' '))),
            Some(KeyCommand::Player(PlayerAction::PlayPause))
        );
        assert_eq!(
            key_to_command(key(KeyCode::Left)),
            Some(KeyCommand::Player(PlayerAction::SeekBySeconds(-3)))
        );
        assert_eq!(
            key_to_command(key(KeyCode::Char('l'))),
            Some(KeyCommand::Player(PlayerAction::ToggleLock))
        );
        assert_eq!(
            key_to_command(key(KeyCode::Char('-'))),
            Some(KeyCommand::SpeedStep(-SPEED_STEP))
        );
    }

    #[test]
    fn test_quit_keys() {
        assert_eq!(key_to_command(key(KeyCode::Esc)), Some(KeyCommand::Quit));
        assert_eq!(key_to_command(key(KeyCode::Char('q'))), Some(KeyCommand::Quit));

        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(ctrl_c.kind, KeyEventKind::Press);
        assert_eq!(key_to_command(ctrl_c), Some(KeyCommand::Quit));
    }

    #[test]
    fn test_unmapped_key() {
        assert_eq!(key_to_command(key(KeyCode::Char('z'))), None);
        assert_eq!(key_to_command(key(KeyCode::Tab)), None);
    }

    #[test]
    fn test_data_error_exit_codes() {
        use crate::error::RemoteError;
        assert_eq!(
            ExitCode::from(&DataError::from(RemoteError::NoInternet)),
            ExitCode::NetworkError
        );
        assert_eq!(
            ExitCode::from(&DataError::from(LocalError::DiskFull)),
            ExitCode::CacheError
        );
    }
}
