//! Human scoring of a finished debate and the exported result record.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::config::DebateConfig;
use crate::error::DebateError;
use crate::protocol::DebateId;
use crate::transcript::Transcript;

pub const MIN_SCORE: u8 = 1;
pub const MAX_SCORE: u8 = 10;
pub const DEFAULT_SCORE: u8 = 5;

/// Judging criteria, each scored 1–10.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum Criterion {
    Reasoning,
    Evidence,
    Clarity,
    Persuasiveness,
    Honesty,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Score {
    pub reasoning: u8,
    pub evidence: u8,
    pub clarity: u8,
    pub persuasiveness: u8,
    pub honesty: u8,
    pub feedback: String,
}

impl Default for Score {
    fn default() -> Self {
        Score {
            reasoning: DEFAULT_SCORE,
            evidence: DEFAULT_SCORE,
            clarity: DEFAULT_SCORE,
            persuasiveness: DEFAULT_SCORE,
            honesty: DEFAULT_SCORE,
            feedback: String::new(),
        }
    }
}

impl Score {
    fn slot(&mut self, criterion: Criterion) -> &mut u8 {
        match criterion {
            Criterion::Reasoning => &mut self.reasoning,
            Criterion::Evidence => &mut self.evidence,
            Criterion::Clarity => &mut self.clarity,
            Criterion::Persuasiveness => &mut self.persuasiveness,
            Criterion::Honesty => &mut self.honesty,
        }
    }

    pub fn total(&self) -> u32 {
        [
            self.reasoning,
            self.evidence,
            self.clarity,
            self.persuasiveness,
            self.honesty,
        ]
        .iter()
        .map(|&s| s as u32)
        .sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebateScore {
    pub debater_id: String,
    pub ranking: u32,
    pub score: Score,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebaterMessage {
    pub round: u32,
    pub debater_id: String,
    pub response: String,
}

/// Snapshot of a scored debate, suitable for download.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebateResult {
    pub debate_id: String,
    pub topic: String,
    /// Unix time in milliseconds.
    pub timestamp: u64,
    pub config: DebateConfig,
    pub scores: Vec<DebateScore>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub judge_notes: String,
    pub messages: Vec<DebaterMessage>,
}

impl DebateResult {
    pub fn file_name(&self) -> String {
        format!("debate_results_{}.json", self.debate_id)
    }

    pub fn to_json_pretty(&self) -> Result<String, DebateError> {
        serde_json::to_string_pretty(self).map_err(|e| DebateError::Export(e.to_string()))
    }

    /// Write `debate_results_<id>.json` into `dir` and return its path.
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf, DebateError> {
        let path = dir.join(self.file_name());
        let json = self.to_json_pretty()?;
        std::fs::write(&path, json)
            .map_err(|e| DebateError::Export(format!("{}: {e}", path.display())))?;
        Ok(path)
    }
}

pub fn debater_id(position: usize) -> String {
    format!("debater_{}", position + 1)
}

/// Flatten the transcript to one entry per message. Debater ids follow the
/// message's position within its round.
pub fn debater_messages(transcript: &Transcript) -> Vec<DebaterMessage> {
    transcript
        .rounds()
        .iter()
        .enumerate()
        .flat_map(|(r, round)| {
            round
                .messages
                .iter()
                .enumerate()
                .map(move |(m, message)| DebaterMessage {
                    round: r as u32 + 1,
                    debater_id: debater_id(m),
                    response: message.text.clone(),
                })
        })
        .collect()
}

pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Editable per-debater scores plus a ranking order.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreSheet {
    scores: Vec<DebateScore>,
    /// Debater ids, best first.
    ranking: Vec<String>,
    judge_notes: String,
}

impl ScoreSheet {
    /// Default scores for `n` debaters, ranked in seat order.
    pub fn with_debaters(n: usize) -> Self {
        let scores: Vec<DebateScore> = (0..n)
            .map(|i| DebateScore {
                debater_id: debater_id(i),
                ranking: i as u32 + 1,
                score: Score::default(),
            })
            .collect();
        let ranking = scores.iter().map(|s| s.debater_id.clone()).collect();
        ScoreSheet {
            scores,
            ranking,
            judge_notes: String::new(),
        }
    }

    /// One seat per message in the widest round.
    pub fn for_transcript(transcript: &Transcript) -> Self {
        let seats = transcript
            .rounds()
            .iter()
            .map(|r| r.messages.len())
            .max()
            .unwrap_or(0);
        Self::with_debaters(seats)
    }

    pub fn debaters(&self) -> usize {
        self.scores.len()
    }

    pub fn score(&self, debater_id: &str) -> Option<&Score> {
        self.scores
            .iter()
            .find(|s| s.debater_id == debater_id)
            .map(|s| &s.score)
    }

    fn entry_mut(&mut self, debater_id: &str) -> Result<&mut DebateScore, DebateError> {
        self.scores
            .iter_mut()
            .find(|s| s.debater_id == debater_id)
            .ok_or_else(|| DebateError::Export(format!("unknown debater {debater_id}")))
    }

    pub fn set_score(
        &mut self,
        debater_id: &str,
        criterion: Criterion,
        value: u8,
    ) -> Result<(), DebateError> {
        if !(MIN_SCORE..=MAX_SCORE).contains(&value) {
            return Err(DebateError::Export(format!(
                "score must be between {MIN_SCORE} and {MAX_SCORE}, got {value}"
            )));
        }
        *self.entry_mut(debater_id)?.score.slot(criterion) = value;
        Ok(())
    }

    pub fn set_feedback(&mut self, debater_id: &str, feedback: impl Into<String>) -> Result<(), DebateError> {
        self.entry_mut(debater_id)?.score.feedback = feedback.into();
        Ok(())
    }

    pub fn set_judge_notes(&mut self, notes: impl Into<String>) {
        self.judge_notes = notes.into();
    }

    pub fn ranking(&self) -> &[String] {
        &self.ranking
    }

    /// Move the debater at ranking position `from` to `to`, shifting the
    /// ones in between. Out-of-range positions are ignored.
    pub fn move_debater(&mut self, from: usize, to: usize) {
        if from >= self.ranking.len() || to >= self.ranking.len() || from == to {
            return;
        }
        let id = self.ranking.remove(from);
        self.ranking.insert(to, id);
    }

    /// Replace the whole ranking. Must be a permutation of the debater ids.
    pub fn set_ranking(&mut self, order: Vec<String>) -> Result<(), DebateError> {
        let mut sorted = order.clone();
        sorted.sort();
        let mut expected: Vec<String> = self.scores.iter().map(|s| s.debater_id.clone()).collect();
        expected.sort();
        if sorted != expected {
            return Err(DebateError::Export(format!(
                "ranking must list each of {} exactly once",
                expected.join(", ")
            )));
        }
        self.ranking = order;
        Ok(())
    }

    /// 1-based position of `debater_id` in the ranking.
    pub fn rank_of(&self, debater_id: &str) -> Option<u32> {
        self.ranking
            .iter()
            .position(|id| id == debater_id)
            .map(|p| p as u32 + 1)
    }

    /// Build the export record. Pure: the timestamp is passed in.
    pub fn result(
        &self,
        debate_id: &DebateId,
        topic: &str,
        config: &DebateConfig,
        transcript: &Transcript,
        timestamp: u64,
    ) -> DebateResult {
        let scores = self
            .scores
            .iter()
            .map(|s| DebateScore {
                ranking: self.rank_of(&s.debater_id).unwrap_or(s.ranking),
                ..s.clone()
            })
            .collect();
        DebateResult {
            debate_id: debate_id.to_string(),
            topic: topic.to_string(),
            timestamp,
            config: config.clone(),
            scores,
            judge_notes: self.judge_notes.clone(),
            messages: debater_messages(transcript),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Frame;
    use crate::reducer::TranscriptReducer;

    fn two_round_transcript() -> Transcript {
        let mut reducer = TranscriptReducer::new();
        let mut t = Transcript::new();
        for round in 0..2 {
            reducer.fold(&mut t, &Frame::round_start());
            for seat in 0..2 {
                reducer.fold(&mut t, &Frame::message_start());
                reducer.fold(&mut t, &Frame::token(format!("r{round}d{seat}")));
                reducer.fold(&mut t, &Frame::message_complete());
            }
            reducer.fold(&mut t, &Frame::round_complete());
        }
        reducer.fold(&mut t, &Frame::debate_complete());
        t
    }

    #[test]
    fn test_default_scores_are_five() {
        let sheet = ScoreSheet::with_debaters(2);
        let s = sheet.score("debater_1").unwrap();
        assert_eq!(s.reasoning, 5);
        assert_eq!(s.total(), 25);
        assert_eq!(sheet.ranking(), ["debater_1", "debater_2"]);
    }

    #[test]
    fn test_for_transcript_counts_seats() {
        let sheet = ScoreSheet::for_transcript(&two_round_transcript());
        assert_eq!(sheet.debaters(), 2);
        assert_eq!(ScoreSheet::for_transcript(&Transcript::new()).debaters(), 0);
    }

    #[test]
    fn test_set_score_bounds() {
        let mut sheet = ScoreSheet::with_debaters(2);
        assert!(sheet.set_score("debater_2", Criterion::Evidence, 9).is_ok());
        assert_eq!(sheet.score("debater_2").unwrap().evidence, 9);
        assert!(sheet.set_score("debater_2", Criterion::Evidence, 0).is_err());
        assert!(sheet.set_score("debater_2", Criterion::Evidence, 11).is_err());
        assert!(sheet.set_score("debater_7", Criterion::Evidence, 5).is_err());
    }

    #[test]
    fn test_move_debater_reorders() {
        let mut sheet = ScoreSheet::with_debaters(3);
        sheet.move_debater(2, 0);
        assert_eq!(sheet.ranking(), ["debater_3", "debater_1", "debater_2"]);
        assert_eq!(sheet.rank_of("debater_3"), Some(1));
        sheet.move_debater(0, 9);
        assert_eq!(sheet.ranking(), ["debater_3", "debater_1", "debater_2"]);
    }

    #[test]
    fn test_set_ranking_requires_permutation() {
        let mut sheet = ScoreSheet::with_debaters(2);
        assert!(sheet
            .set_ranking(vec!["debater_1".into(), "debater_1".into()])
            .is_err());
        assert!(sheet
            .set_ranking(vec!["debater_2".into(), "debater_1".into()])
            .is_ok());
        assert_eq!(sheet.rank_of("debater_1"), Some(2));
    }

    #[test]
    fn test_debater_messages_flatten() {
        let msgs = debater_messages(&two_round_transcript());
        assert_eq!(msgs.len(), 4);
        assert_eq!(msgs[3].round, 2);
        assert_eq!(msgs[3].debater_id, "debater_2");
        assert_eq!(msgs[3].response, "r1d1");
    }

    #[test]
    fn test_result_applies_ranking_and_serializes_camel_case() {
        let t = two_round_transcript();
        let mut sheet = ScoreSheet::for_transcript(&t);
        sheet.move_debater(1, 0);
        sheet.set_feedback("debater_1", "solid opening").unwrap();
        sheet.set_judge_notes("close call");
        let result = sheet.result(
            &DebateId::new("5"),
            "Should cities ban cars?",
            &DebateConfig::default(),
            &t,
            1_700_000_000_000,
        );
        assert_eq!(result.scores[0].ranking, 2);
        assert_eq!(result.scores[1].ranking, 1);
        assert_eq!(result.file_name(), "debate_results_5.json");

        let v = serde_json::to_value(&result).unwrap();
        assert_eq!(v["debateId"], "5");
        assert_eq!(v["scores"][0]["debaterId"], "debater_1");
        assert_eq!(v["scores"][0]["score"]["feedback"], "solid opening");
        assert_eq!(v["judgeNotes"], "close call");
        assert_eq!(v["messages"][0]["debaterId"], "debater_1");
        assert_eq!(v["config"]["numRounds"], 3);
    }

    #[test]
    fn test_empty_judge_notes_omitted() {
        let t = Transcript::new();
        let result = ScoreSheet::with_debaters(2).result(
            &DebateId::new("1"),
            "t",
            &DebateConfig::default(),
            &t,
            0,
        );
        let v = serde_json::to_value(&result).unwrap();
        assert!(v.get("judgeNotes").is_none());
    }

    #[test]
    fn test_write_to_dir() {
        let dir = tempfile::tempdir().unwrap();
        let t = two_round_transcript();
        let result = ScoreSheet::for_transcript(&t).result(
            &DebateId::new("9"),
            "topic",
            &DebateConfig::default(),
            &t,
            42,
        );
        let path = result.write_to(dir.path()).unwrap();
        assert!(path.ends_with("debate_results_9.json"));
        let back: DebateResult =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back, result);
    }

    #[test]
    fn test_now_millis_is_recent() {
        assert!(now_millis() > 1_600_000_000_000);
    }
}
