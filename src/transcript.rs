//! The visible debate transcript: rounds of messages built from token fragments.
//!
//! Everything here is append-only. Rounds and messages are never removed or
//! reordered, text buffers only grow, and completion flags flip once.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RoundId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct MessageId(pub u64);

/// One participant's response within a round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub id: MessageId,
    pub text: String,
    pub complete: bool,
}

impl Message {
    fn new(id: MessageId) -> Self {
        Message {
            id,
            text: String::new(),
            complete: false,
        }
    }
}

/// One cycle of the debate, one message per participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Round {
    pub id: RoundId,
    pub messages: Vec<Message>,
    pub complete: bool,
}

impl Round {
    fn new(id: RoundId) -> Self {
        Round {
            id,
            messages: Vec::new(),
            complete: false,
        }
    }

    pub fn message(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub(crate) fn message_mut(&mut self, id: MessageId) -> Option<&mut Message> {
        self.messages.iter_mut().find(|m| m.id == id)
    }
}

/// Rounds in arrival order; index + 1 is the round number.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Transcript {
    rounds: Vec<Round>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rounds(&self) -> &[Round] {
        &self.rounds
    }

    pub fn is_empty(&self) -> bool {
        self.rounds.is_empty()
    }

    pub fn last_round(&self) -> Option<&Round> {
        self.rounds.last()
    }

    pub fn round(&self, id: RoundId) -> Option<&Round> {
        self.rounds.iter().find(|r| r.id == id)
    }

    pub fn message_count(&self) -> usize {
        self.rounds.iter().map(|r| r.messages.len()).sum()
    }

    /// True once every round and message has been marked complete.
    pub fn is_settled(&self) -> bool {
        self.rounds
            .iter()
            .all(|r| r.complete && r.messages.iter().all(|m| m.complete))
    }

    // Mutation is crate-private: only the reducer grows a transcript.

    pub(crate) fn push_round(&mut self, id: RoundId) {
        self.rounds.push(Round::new(id));
    }

    pub(crate) fn round_mut(&mut self, id: RoundId) -> Option<&mut Round> {
        self.rounds.iter_mut().find(|r| r.id == id)
    }

    pub(crate) fn last_round_mut(&mut self) -> Option<&mut Round> {
        self.rounds.last_mut()
    }

    pub(crate) fn push_message(&mut self, round: RoundId, id: MessageId) -> bool {
        match self.round_mut(round) {
            Some(r) if !r.complete => {
                r.messages.push(Message::new(id));
                true
            }
            _ => false,
        }
    }
}
