//! Launching programs outside the process.
//!
//! Two uses: opening an outbound link in the user's browser, and running an
//! external audio player for synthesized speech. Player command lines are
//! split with POSIX shell quoting rules, so `"/opt/my player/play" -q` works.

use std::path::Path;
use std::process::{Child, Command, Stdio};

use thiserror::Error;

/// Placeholder replaced by the audio file path in a player command line.
/// Without it the path is appended as the last argument.
pub const PATH_PLACEHOLDER: &str = "{}";

#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("Empty command")]
    EmptyCommand,

    #[error("Invalid command line: {0}")]
    InvalidCommand(String),

    #[error("Refusing to open non-http URL: {0}")]
    UnsupportedUrl(String),

    #[error("Failed to run '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Split a command line into program and arguments.
pub fn parse_command_line(line: &str) -> Result<(String, Vec<String>), LaunchError> {
    let parts = shlex::split(line).ok_or_else(|| LaunchError::InvalidCommand(line.to_string()))?;
    let mut parts = parts.into_iter();
    let program = parts.next().ok_or(LaunchError::EmptyCommand)?;
    Ok((program, parts.collect()))
}

/// Player used when none is configured and native audio is not built in.
pub fn default_player_command() -> &'static str {
    if cfg!(target_os = "macos") {
        "afplay"
    } else {
        "ffplay -nodisp -autoexit -loglevel quiet"
    }
}

/// Build (but do not spawn) the player command for `audio_path`.
pub fn player_command(command_line: &str, audio_path: &Path) -> Result<Command, LaunchError> {
    let (program, args) = parse_command_line(command_line)?;
    let path = audio_path.to_string_lossy();

    let mut has_placeholder = false;
    let mut args: Vec<String> = args
        .into_iter()
        .map(|arg| {
            if arg == PATH_PLACEHOLDER {
                has_placeholder = true;
                path.to_string()
            } else {
                arg
            }
        })
        .collect();
    if !has_placeholder {
        args.push(path.to_string());
    }

    let mut cmd = Command::new(program);
    cmd.args(args);
    Ok(cmd)
}

pub fn spawn_player(command_line: &str, audio_path: &Path) -> Result<Child, LaunchError> {
    let mut cmd = player_command(command_line, audio_path)?;
    let program = cmd.get_program().to_string_lossy().into_owned();
    cmd.stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|source| LaunchError::Spawn { program, source })
}

/// Open an http(s) link with the platform's default handler.
pub fn open_url(url: &str) -> Result<(), LaunchError> {
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(LaunchError::UnsupportedUrl(url.to_string()));
    }

    let mut cmd = opener_command(url);
    let program = cmd.get_program().to_string_lossy().into_owned();
    cmd.stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|source| LaunchError::Spawn { program, source })?;

    log::debug!("Opened {}", url);
    Ok(())
}

#[cfg(target_os = "macos")]
fn opener_command(url: &str) -> Command {
    let mut cmd = Command::new("open");
    cmd.arg(url);
    cmd
}

#[cfg(windows)]
fn opener_command(url: &str) -> Command {
    // The empty string is the window title `start` expects first
    let mut cmd = Command::new("cmd");
    cmd.args(["/C", "start", "", url]);
    cmd
}

#[cfg(all(not(target_os = "macos"), not(windows)))]
fn opener_command(url: &str) -> Command {
    let mut cmd = Command::new("xdg-open");
    cmd.arg(url);
    cmd
}
