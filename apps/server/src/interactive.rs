//! Line-oriented control on stdin.

use std::io::Write;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use pipeplay_core::{Command, PlayerController, PlayerStatus, VolumeDirection};
use tokio::io::{AsyncBufReadExt, BufReader};

const HELP: &str = "\
Commands:
  play <path|url>     load and play media
  pause | resume      pause or resume playback
  stop                stop and unload
  volume <0-1>        set volume
  volume up|down      step volume
  mute | unmute       toggle mute
  seek <seconds>      jump to absolute position
  status              show player status
  help                show this help
  quit                exit";

/// One parsed input line.
#[derive(Debug, PartialEq)]
pub enum Line {
    Command(Command),
    Status,
    Help,
    Quit,
    Empty,
}

/// Parses a single line of user input.
pub fn parse_line(line: &str) -> Result<Line> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let parsed = match word.to_ascii_lowercase().as_str() {
        "" => Line::Empty,
        "play" if rest.is_empty() => bail!("usage: play <path|url>"),
        "play" => Line::Command(Command::play(rest)),
        "pause" => Line::Command(Command::Pause),
        "resume" => Line::Command(Command::Resume),
        "stop" => Line::Command(Command::Stop),
        "volume" | "vol" => match rest {
            "up" | "+" => Line::Command(Command::StepVolume {
                direction: VolumeDirection::Up,
            }),
            "down" | "-" => Line::Command(Command::StepVolume {
                direction: VolumeDirection::Down,
            }),
            "" => bail!("usage: volume <0-1>|up|down"),
            level => Line::Command(Command::SetVolume {
                level: level
                    .parse()
                    .with_context(|| format!("'{}' is not a number", level))?,
            }),
        },
        "mute" => Line::Command(Command::Mute { on: true }),
        "unmute" => Line::Command(Command::Mute { on: false }),
        "seek" if rest.is_empty() => bail!("usage: seek <seconds>"),
        "seek" => Line::Command(Command::Seek {
            offset: rest
                .parse()
                .with_context(|| format!("'{}' is not a number", rest))?,
        }),
        "status" => Line::Status,
        "help" | "?" => Line::Help,
        "quit" | "exit" | "q" => Line::Quit,
        other => bail!("unknown command '{}' (try 'help')", other),
    };
    Ok(parsed)
}

/// Renders a status snapshot on one line.
pub fn format_status(status: &PlayerStatus) -> String {
    let mut out = format!("[{}] volume {:.2}", status.state, status.volume);
    if status.muted {
        out.push_str(" (muted)");
    }
    if let Some(reference) = &status.media_reference {
        match status.duration() {
            Some(d) => out.push_str(&format!(" | {:.1}s / {:.1}s", status.position_seconds, d)),
            None => out.push_str(&format!(" | {:.1}s", status.position_seconds)),
        }
        let title = status.metadata.as_ref().and_then(|m| m.title.as_deref());
        let artist = status.metadata.as_ref().and_then(|m| m.artist.as_deref());
        match (title, artist) {
            (Some(t), Some(a)) => out.push_str(&format!(" | {} - {}", a, t)),
            (Some(t), None) => out.push_str(&format!(" | {}", t)),
            _ => out.push_str(&format!(" | {}", reference)),
        }
    }
    if let Some(message) = &status.error_message {
        out.push_str(&format!(" | error: {}", message));
    }
    out
}

/// Reads commands from stdin until `quit` or end of input.
///
/// Command errors are printed and the loop continues.
pub async fn run(player: Arc<PlayerController>) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("{}", HELP);

    loop {
        print!("> ");
        std::io::stdout().flush().ok();

        let Some(line) = lines.next_line().await.context("Failed to read stdin")? else {
            break;
        };

        match parse_line(&line) {
            Ok(Line::Empty) => {}
            Ok(Line::Quit) => break,
            Ok(Line::Help) => println!("{}", HELP),
            Ok(Line::Status) => println!("{}", format_status(&player.current_status())),
            Ok(Line::Command(command)) => match player.execute(command).await {
                Ok(status) => println!("{}", format_status(&status)),
                Err(e) => println!("Error: {}", e),
            },
            Err(e) => println!("{}", e),
        }
    }
    Ok(())
}
