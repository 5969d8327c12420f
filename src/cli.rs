use std::path::PathBuf;

use clap::Parser;

use crate::config::{DebateConfig, DebateStyle};
use crate::scoring::{debater_id, Criterion};

#[derive(Parser)]
#[command(name = "debate-stream")]
#[command(version)]
#[command(about = "Run a multi-round AI debate and watch it stream in")]
pub struct Args {
    /// Debate topic
    pub topic: String,

    /// Number of rounds (1-10)
    #[arg(long, short, default_value = "3")]
    pub rounds: u32,

    /// Number of debaters (at least 2)
    #[arg(long, short, default_value = "2")]
    pub debaters: u32,

    /// Debate style
    #[arg(long, value_enum, default_value = "formal")]
    pub style: DebateStyle,

    /// Sampling temperature (0.0-1.0)
    #[arg(long, default_value = "0.7")]
    pub temperature: f32,

    /// Token budget per response (100-2000)
    #[arg(long, default_value = "500")]
    pub max_tokens: u32,

    /// API key; falls back to OPENAI_API_KEY
    #[arg(long)]
    pub api_key: Option<String>,

    /// Settings file (TOML)
    #[arg(long)]
    pub settings: Option<PathBuf>,

    /// Debate service base URL (overrides settings and DEBATE_API_URL)
    #[arg(long)]
    pub base_url: Option<String>,

    /// Seconds to wait for the debate to finish before giving up
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Write the scored result JSON into this directory
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// Score entry, repeatable: DEBATER:CRITERION=VALUE, e.g. 1:reasoning=8
    #[arg(long = "score", value_parser = parse_score)]
    pub scores: Vec<ScoreArg>,

    /// Final ranking, best first, as debater numbers: e.g. 2,1
    #[arg(long, value_delimiter = ',', value_parser = parse_seat)]
    pub ranking: Vec<usize>,

    /// Free-form notes stored with the exported result
    #[arg(long, default_value = "")]
    pub notes: String,

    /// Ask the service for an LLM verdict once the debate completes
    #[arg(long)]
    pub llm_judge: bool,

    /// Disable colored output
    #[arg(long)]
    pub plain: bool,
}

impl Args {
    /// The debate configuration implied by the flags.
    pub fn debate_config(&self) -> DebateConfig {
        DebateConfig {
            num_rounds: self.rounds,
            temperature: self.temperature,
            max_tokens_per_response: self.max_tokens,
            ..DebateConfig::default()
        }
        .with_style(self.style)
        .with_debaters(self.debaters)
    }

    /// Ranking as debater ids, best first.
    pub fn ranking_ids(&self) -> Vec<String> {
        self.ranking
            .iter()
            .map(|&n| debater_id(n.saturating_sub(1)))
            .collect()
    }
}

/// One `--score` entry.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreArg {
    pub debater: usize,
    pub criterion: Criterion,
    pub value: u8,
}

impl ScoreArg {
    pub fn debater_id(&self) -> String {
        debater_id(self.debater.saturating_sub(1))
    }
}

/// A 1-based debater number.
pub fn parse_seat(s: &str) -> Result<usize, String> {
    s.trim()
        .parse()
        .ok()
        .filter(|&n: &usize| n >= 1)
        .ok_or_else(|| format!("debater must be a number from 1, got {s:?}"))
}

pub fn parse_score(s: &str) -> Result<ScoreArg, String> {
    let (debater, rest) = s
        .split_once(':')
        .ok_or_else(|| format!("expected DEBATER:CRITERION=VALUE, got {s:?}"))?;
    let (criterion, value) = rest
        .split_once('=')
        .ok_or_else(|| format!("expected CRITERION=VALUE after ':', got {rest:?}"))?;
    let debater = parse_seat(debater)?;
    let criterion = <Criterion as clap::ValueEnum>::from_str(criterion.trim(), true)?;
    let value: u8 = value
        .trim()
        .parse()
        .map_err(|_| format!("score must be a number, got {value:?}"))?;
    Ok(ScoreArg {
        debater,
        criterion,
        value,
    })
}
