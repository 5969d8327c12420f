use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::DebateError;

/// Tone the debaters are instructed to take.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DebateStyle {
    Formal,
    Socratic,
    Collaborative,
    Adversarial,
}

impl std::fmt::Display for DebateStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DebateStyle::Formal => write!(f, "formal"),
            DebateStyle::Socratic => write!(f, "socratic"),
            DebateStyle::Collaborative => write!(f, "collaborative"),
            DebateStyle::Adversarial => write!(f, "adversarial"),
        }
    }
}

impl DebateStyle {
    /// Prompt templates for `debater_1` and `debater_2`.
    pub fn templates(self) -> [&'static str; 2] {
        match self {
            DebateStyle::Formal => [
                "You are Debater 1. Construct a logical, structured argument backed by strong evidence. Clearly define your stance and preemptively address possible rebuttals. Maintain a professional and precise tone.",
                "You are Debater 2. Critically analyze and challenge the previous argument. Identify logical flaws, inconsistencies, or counter-evidence. Strengthen your own position while refuting your opponent's.",
            ],
            DebateStyle::Socratic => [
                "You are Debater 1. Engage in Socratic questioning to probe the assumptions behind the debate topic. Encourage deeper exploration rather than merely defending a fixed position.",
                "You are Debater 2. Respond to the questions raised with further questioning, uncovering contradictions or refining the argument. Seek to clarify rather than merely counter.",
            ],
            DebateStyle::Collaborative => [
                "You are Debater 1. Present a reasoned argument while also considering alternative viewpoints. Aim to refine the discussion by integrating insights from both perspectives.",
                "You are Debater 2. Engage constructively with the previous argument. Instead of purely opposing, synthesize perspectives and highlight nuances to advance the discussion.",
            ],
            DebateStyle::Adversarial => [
                "You are Debater 1. Your goal is to strongly advocate for your position while **exposing weaknesses in any opposing argument**. Be aggressive in refuting errors while maintaining logical integrity.",
                "You are Debater 2. Your goal is to **dismantle** the previous argument using **counter-evidence, logical dissection, or exposing hidden assumptions**. Aim to make flaws clear to a non-expert judge.",
            ],
        }
    }

    /// Instruction for the debater at 1-based position `n`.
    ///
    /// Debaters past the second reuse the challenger template with their own
    /// number substituted in.
    pub fn prompt_for(self, n: u32) -> String {
        let [opener, challenger] = self.templates();
        match n {
            1 => opener.to_string(),
            2 => challenger.to_string(),
            _ => challenger.replacen("Debater 2", &format!("Debater {n}"), 1),
        }
    }
}

/// Per-role system instruction sent to the producer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemPrompt {
    pub role: String,
    pub content: String,
}

impl SystemPrompt {
    pub fn debater(n: u32, content: impl Into<String>) -> Self {
        SystemPrompt {
            role: format!("debater_{n}"),
            content: content.into(),
        }
    }
}

pub const MIN_ROUNDS: u32 = 1;
pub const MAX_ROUNDS: u32 = 10;
pub const MIN_DEBATERS: u32 = 2;
pub const MIN_TOKENS: u32 = 100;
pub const MAX_TOKENS: u32 = 2000;

/// Parameters of one debate, fixed when the stream is opened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebateConfig {
    pub num_rounds: u32,
    pub num_debaters: u32,
    pub temperature: f32,
    pub max_tokens_per_response: u32,
    pub system_prompts: Vec<SystemPrompt>,
    pub debate_style: DebateStyle,
}

impl Default for DebateConfig {
    fn default() -> Self {
        DebateConfig {
            num_rounds: 3,
            num_debaters: 2,
            temperature: 0.7,
            max_tokens_per_response: 500,
            system_prompts: vec![
                SystemPrompt::debater(1, "You are Debater 1. Your goal is to construct a strong argument for your position while anticipating and addressing counterarguments. Strive for logical clarity and depth."),
                SystemPrompt::debater(2, "You are Debater 2. Your goal is to critically evaluate and challenge the argument made by Debater 1 while reinforcing your own position. Identify weaknesses, inconsistencies, or missing considerations."),
            ],
            debate_style: DebateStyle::Formal,
        }
    }
}

impl DebateConfig {
    /// Switch style and regenerate one system prompt per debater from its templates.
    pub fn with_style(mut self, style: DebateStyle) -> Self {
        self.debate_style = style;
        self.system_prompts = (1..=self.num_debaters)
            .map(|n| SystemPrompt::debater(n, style.prompt_for(n)))
            .collect();
        self
    }

    /// Change the debater count, adding template prompts for new seats and
    /// dropping prompts for removed ones.
    pub fn with_debaters(mut self, n: u32) -> Self {
        self.num_debaters = n;
        let wanted = n as usize;
        if self.system_prompts.len() > wanted {
            self.system_prompts.truncate(wanted);
        }
        while self.system_prompts.len() < wanted {
            let seat = self.system_prompts.len() as u32 + 1;
            self.system_prompts
                .push(SystemPrompt::debater(seat, self.debate_style.prompt_for(seat)));
        }
        self
    }

    /// Check the bounds the debate service enforces on its request model.
    pub fn validate(&self) -> Result<(), DebateError> {
        if !(MIN_ROUNDS..=MAX_ROUNDS).contains(&self.num_rounds) {
            return Err(DebateError::InvalidConfig(format!(
                "numRounds must be between {MIN_ROUNDS} and {MAX_ROUNDS}, got {}",
                self.num_rounds
            )));
        }
        if self.num_debaters < MIN_DEBATERS {
            return Err(DebateError::InvalidConfig(format!(
                "numDebaters must be at least {MIN_DEBATERS}, got {}",
                self.num_debaters
            )));
        }
        if !(0.0..=1.0).contains(&self.temperature) {
            return Err(DebateError::InvalidConfig(format!(
                "temperature must be between 0 and 1, got {}",
                self.temperature
            )));
        }
        if !(MIN_TOKENS..=MAX_TOKENS).contains(&self.max_tokens_per_response) {
            return Err(DebateError::InvalidConfig(format!(
                "maxTokensPerResponse must be between {MIN_TOKENS} and {MAX_TOKENS}, got {}",
                self.max_tokens_per_response
            )));
        }
        if self.system_prompts.len() < self.num_debaters as usize {
            return Err(DebateError::InvalidConfig(format!(
                "{} debaters need as many system prompts, got {}",
                self.num_debaters,
                self.system_prompts.len()
            )));
        }
        Ok(())
    }
}
