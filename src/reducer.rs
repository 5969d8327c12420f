//! Folding decoded frames into a [`Transcript`].
//!
//! Frames never carry round or message ids; they address "the one currently
//! open". [`TranscriptReducer`] is the single owner of that cursor state. It
//! keeps ids only and resolves them against the caller's transcript on every
//! frame, so the transcript itself stays a plain value the caller can clone
//! and render at any point.
//!
//! `round_complete` clears both cursors as soon as it is seen. A
//! `round_start` or `message_start` that arrives while the previous
//! round/message is still open finalizes the open one first, so at most one
//! round and one message are ever open.

use tracing::{debug, warn};

use crate::error::ProtocolViolation;
use crate::protocol::Frame;
use crate::transcript::{MessageId, RoundId, Transcript};

/// What the caller should do after a frame has been folded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Control {
    Continue,
    /// A terminal frame was folded; stop reading.
    Finished(Ending),
}

/// How a stream ended from the producer's point of view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ending {
    Completed,
    UpstreamError(String),
}

#[derive(Debug)]
pub struct TranscriptReducer {
    /// Shared counter for round and message ids; never rewound.
    next_id: u64,
    round: Option<RoundId>,
    message: Option<MessageId>,
    active: bool,
    violations: u64,
}

impl Default for TranscriptReducer {
    fn default() -> Self {
        Self::new()
    }
}

impl TranscriptReducer {
    pub fn new() -> Self {
        TranscriptReducer {
            next_id: 1,
            round: None,
            message: None,
            active: true,
            violations: 0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn current_round(&self) -> Option<RoundId> {
        self.round
    }

    pub fn current_message(&self) -> Option<MessageId> {
        self.message
    }

    /// Frames dropped by [`fold`](Self::fold) for unmet preconditions.
    pub fn violations(&self) -> u64 {
        self.violations
    }

    /// Stop accepting frames; anything arriving later is dropped.
    pub fn deactivate(&mut self) {
        self.active = false;
    }

    /// Retire the cursors of a previous stream before folding a new one into
    /// the same transcript. Ids keep counting so none are ever reused.
    pub fn reset(&mut self) {
        self.round = None;
        self.message = None;
        self.active = true;
    }

    /// Best-effort fold: a frame whose precondition is unmet is logged and
    /// skipped rather than failing the stream.
    pub fn fold(&mut self, transcript: &mut Transcript, frame: &Frame) -> Control {
        match self.apply(transcript, frame) {
            Ok(control) => control,
            Err(violation) => {
                self.violations += 1;
                warn!(%violation, "frame dropped");
                Control::Continue
            }
        }
    }

    /// Fold one frame, reporting an unmet precondition as an error. The
    /// transcript is left untouched when an error is returned.
    pub fn apply(
        &mut self,
        transcript: &mut Transcript,
        frame: &Frame,
    ) -> Result<Control, ProtocolViolation> {
        if !self.active {
            return Err(ProtocolViolation::Inactive { frame: frame.kind() });
        }

        match frame {
            Frame::StartDebate { .. } => {}

            Frame::RoundStart { .. } => {
                if let Some(open) = self.round.take() {
                    debug!(round = open.0, "round_start with round still open; finalizing it");
                    self.finalize_round(transcript, open);
                }
                let id = RoundId(self.alloc());
                transcript.push_round(id);
                self.round = Some(id);
                self.message = None;
                debug!(round = id.0, "round opened");
            }

            Frame::MessageStart { .. } => {
                let round = self
                    .round
                    .ok_or(ProtocolViolation::NoOpenRound { frame: frame.kind() })?;
                if let Some(open) = self.message.take() {
                    debug!(message = open.0, "message_start with message still open; finalizing it");
                    self.finalize_message(transcript, round, open);
                }
                let id = MessageId(self.alloc());
                if !transcript.push_message(round, id) {
                    self.round = None;
                    return Err(ProtocolViolation::NoOpenRound { frame: frame.kind() });
                }
                self.message = Some(id);
                debug!(round = round.0, message = id.0, "message opened");
            }

            Frame::Token { message } => self.append(transcript, message, frame.kind())?,

            Frame::TokenEnd { .. } => self.append(transcript, "", frame.kind())?,

            Frame::MessageComplete { .. } => {
                let (round, message) = self.open_message(frame.kind())?;
                self.finalize_message(transcript, round, message);
                self.message = None;
            }

            Frame::RoundComplete { .. } => {
                let round = self
                    .round
                    .take()
                    .ok_or(ProtocolViolation::NoOpenRound { frame: frame.kind() })?;
                self.finalize_round(transcript, round);
            }

            Frame::DebateComplete { .. } => {
                if let (Some(round), Some(message)) = (self.round, self.message) {
                    self.finalize_message(transcript, round, message);
                }
                if let Some(last) = transcript.last_round_mut() {
                    last.complete = true;
                }
                self.round = None;
                self.message = None;
                self.active = false;
                return Ok(Control::Finished(Ending::Completed));
            }

            Frame::Error { message } => {
                self.round = None;
                self.message = None;
                self.active = false;
                return Ok(Control::Finished(Ending::UpstreamError(message.clone())));
            }
        }

        Ok(Control::Continue)
    }

    fn alloc(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn open_message(&self, kind: &'static str) -> Result<(RoundId, MessageId), ProtocolViolation> {
        match (self.round, self.message) {
            (Some(round), Some(message)) => Ok((round, message)),
            _ => Err(ProtocolViolation::NoOpenMessage { frame: kind }),
        }
    }

    fn append(
        &mut self,
        transcript: &mut Transcript,
        text: &str,
        kind: &'static str,
    ) -> Result<(), ProtocolViolation> {
        let (round, message) = self.open_message(kind)?;
        let Some(msg) = transcript
            .round_mut(round)
            .and_then(|r| r.message_mut(message))
            .filter(|m| !m.complete)
        else {
            self.message = None;
            return Err(ProtocolViolation::NoOpenMessage { frame: kind });
        };
        msg.text.push_str(text);
        Ok(())
    }

    fn finalize_message(&self, transcript: &mut Transcript, round: RoundId, message: MessageId) {
        if let Some(msg) = transcript
            .round_mut(round)
            .and_then(|r| r.message_mut(message))
        {
            msg.complete = true;
        }
    }

    /// Mark the round and whatever message is still open in it complete, and
    /// clear the message cursor.
    fn finalize_round(&mut self, transcript: &mut Transcript, round: RoundId) {
        if let Some(message) = self.message.take() {
            self.finalize_message(transcript, round, message);
        }
        if let Some(r) = transcript.round_mut(round) {
            r.complete = true;
        }
    }
}
