//! Interactive control from the terminal the daemon runs in.
//!
//! An empty line means the user is looking at the alerts again. Single
//! letters trigger the poller operations by hand.

use tokio::io::{AsyncBufRead, AsyncBufReadExt as _};

use crate::poller::PollerControl;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    Focus,
    Check,
    Play,
    Unlock,
    Quit,
    Unknown,
}

pub fn parse_input(line: &str) -> Input {
    match line.trim().to_ascii_lowercase().as_str() {
        "" | "f" | "focus" => Input::Focus,
        "c" | "check" => Input::Check,
        "p" | "play" => Input::Play,
        "u" | "unlock" => Input::Unlock,
        "q" | "quit" => Input::Quit,
        _ => Input::Unknown,
    }
}

/// Feeds lines from `reader` to `control` until EOF or a quit command.
/// Returns true when the user asked to quit.
pub async fn run<R>(reader: R, control: &(dyn PollerControl + Sync)) -> bool
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => return false,
            Err(e) => {
                log::error!("Failed to read input: {e}");
                return false;
            }
        };

        match parse_input(&line) {
            Input::Focus => control.focus(),
            Input::Check => control.check_now(),
            Input::Play => control.play(),
            Input::Unlock => control.unlock(),
            Input::Quit => return true,
            Input::Unknown => {
                log::warn!("Unknown command '{}' (Enter, c, p, u, q)", line.trim());
            }
        }
    }
}
