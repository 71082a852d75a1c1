//! Terminal clearing

use std::io::{self, Write};

pub struct Screen;

impl Screen {
    /// Clear the terminal; `NO_CLEAR_SCREEN` keeps the scrollback
    pub fn clear() {
        if std::env::var("NO_CLEAR_SCREEN").is_ok() {
            println!("\n\n");
            return;
        }

        if Self::try_ansi_clear() || Self::try_command_clear() {
            return;
        }
        println!("\n\n");
    }

    fn try_ansi_clear() -> bool {
        match std::env::var("TERM") {
            Ok(term)
                if term.contains("xterm") || term.contains("screen") || term.contains("tmux") =>
            {
                print!("\x1B[2J\x1B[1;1H");
                let _ = io::stdout().flush();
                true
            }
            _ => false,
        }
    }

    fn try_command_clear() -> bool {
        std::process::Command::new("clear")
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }
}
