//! Terminal rendering of a live debate.

use colored::*;
use std::io::{self, Write};

use crate::config::DebateConfig;
use crate::protocol::Frame;
use crate::session::Termination;
use crate::transcript::Transcript;

/// Prints frames as they arrive: a banner per round, a speaker label per
/// message, and token text inline.
#[derive(Debug, Default)]
pub struct TerminalRenderer {
    round: usize,
    seat: usize,
    /// Emit plain text, no colors.
    pub plain: bool,
}

impl TerminalRenderer {
    pub fn new(plain: bool) -> Self {
        TerminalRenderer {
            plain,
            ..Self::default()
        }
    }

    pub fn print_header(&self, topic: &str, config: &DebateConfig, base_url: &str) {
        println!("{}", "AI DEBATE".bright_cyan().bold());
        println!("{}: {}", "Topic".bright_yellow(), topic);
        println!("{}: {}", "Style".bright_yellow(), config.debate_style);
        println!(
            "{}: {} rounds, {} debaters",
            "Format".bright_yellow(),
            config.num_rounds,
            config.num_debaters
        );
        println!("{}: {}", "Server".bright_yellow(), base_url);
        println!("{}", "=".repeat(50).bright_blue());
    }

    /// Render one frame. Returns the text actually printed, for tests.
    pub fn frame(&mut self, frame: &Frame) -> String {
        let out = match frame {
            Frame::StartDebate { .. } | Frame::TokenEnd { .. } => String::new(),
            Frame::RoundStart { .. } => {
                self.round += 1;
                self.seat = 0;
                let banner = format!("\n── Round {} ──", self.round);
                if self.plain {
                    format!("{banner}\n")
                } else {
                    format!("{}\n", banner.bright_magenta().bold())
                }
            }
            Frame::MessageStart { .. } => {
                self.seat += 1;
                let label = format!("Debater {}:", self.seat);
                if self.plain {
                    format!("\n{label} ")
                } else {
                    format!("\n{} ", label.bright_green().bold())
                }
            }
            Frame::Token { message } => message.clone(),
            Frame::MessageComplete { .. } => "\n".to_string(),
            Frame::RoundComplete { .. } | Frame::DebateComplete { .. } => String::new(),
            Frame::Error { message } => {
                let line = format!("\n[error] {message}\n");
                if self.plain {
                    line
                } else {
                    line.bright_red().to_string()
                }
            }
        };
        if !out.is_empty() {
            print!("{out}");
            let _ = io::stdout().flush();
        }
        out
    }

    pub fn print_footer(&self, transcript: &Transcript, termination: &Termination) {
        println!("\n{}", "=".repeat(50).bright_blue());
        let status = if termination.is_failure() {
            termination.to_string().bright_red()
        } else {
            termination.to_string().bright_green()
        };
        println!("Stream ended: {status}");
        println!(
            "Received {} rounds, {} messages.",
            transcript.rounds().len(),
            transcript.message_count()
        );
    }
}
