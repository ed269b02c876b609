//! Conflict prompts available to the CLI.

use std::io::{self, BufRead, IsTerminal, Write};

use savesync_core::models::ResolutionChoice;
use savesync_core::sync::{ConflictPrompt, FixedPrompt};
use savesync_core::{ConflictResolution, SaveConflict};
use tokio::sync::oneshot;

use crate::commands::common::format_conflict_lines;

const MAX_ATTEMPTS: usize = 3;

pub enum CliPrompt {
    Fixed(FixedPrompt),
    Terminal(TerminalPrompt),
}

impl ConflictPrompt for CliPrompt {
    async fn choose(&self, conflict: &SaveConflict) -> Option<ResolutionChoice> {
        match self {
            Self::Fixed(prompt) => prompt.choose(conflict).await,
            Self::Terminal(prompt) => prompt.choose(conflict).await,
        }
    }
}

/// Asks on stderr and reads the answer from stdin.
pub struct TerminalPrompt {
    remember: bool,
}

impl TerminalPrompt {
    pub const fn new(remember: bool) -> Self {
        Self { remember }
    }
}

impl ConflictPrompt for TerminalPrompt {
    async fn choose(&self, conflict: &SaveConflict) -> Option<ResolutionChoice> {
        if !io::stdin().is_terminal() {
            tracing::warn!("No terminal to ask on; leaving the conflict unresolved");
            return None;
        }

        eprintln!("The local and cloud saves differ:");
        for line in format_conflict_lines(&conflict.local, &conflict.cloud) {
            eprintln!("{line}");
        }

        for _ in 0..MAX_ATTEMPTS {
            eprint!("Keep [l]ocal, [c]loud, [n]ewer, or [x] cancel? ");
            let _ = io::stderr().flush();

            let line = read_line().await?;
            if let Some(resolution) = parse_answer(&line) {
                return Some(ResolutionChoice {
                    resolution,
                    remember: self.remember,
                });
            }
            eprintln!("Unrecognized answer: {}", line.trim());
        }
        None
    }
}

/// Read one line on a detached thread so an abandoned prompt never holds up exit.
async fn read_line() -> Option<String> {
    let (reply, answer) = oneshot::channel();
    std::thread::spawn(move || {
        let mut line = String::new();
        let read = io::stdin().lock().read_line(&mut line);
        let _ = reply.send(read.ok().filter(|count| *count > 0).map(|_| line));
    });
    answer.await.ok().flatten()
}

/// Map a typed answer to a resolution; an empty answer cancels.
pub fn parse_answer(input: &str) -> Option<ConflictResolution> {
    let answer = input.trim().to_ascii_lowercase();
    match answer.as_str() {
        "" | "x" => Some(ConflictResolution::Cancel),
        "l" | "local" => Some(ConflictResolution::KeepLocal),
        "c" | "cloud" => Some(ConflictResolution::KeepCloud),
        "n" | "newer" => Some(ConflictResolution::KeepNewer),
        other => other.parse().ok(),
    }
}
