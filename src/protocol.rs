use serde::{Deserialize, Serialize};

use crate::config::DebateConfig;

// -- Stream frames ----------------------------------------------------------

/// One decoded `data:` record from the debate event stream.
///
/// Frames never name the round or message they belong to; they always refer
/// to the most recently opened one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Frame {
    StartDebate {
        #[serde(default, rename = "message", skip_serializing_if = "Option::is_none")]
        label: Option<String>,
    },
    RoundStart {
        #[serde(default, rename = "message", skip_serializing_if = "Option::is_none")]
        label: Option<String>,
    },
    MessageStart {
        #[serde(default, rename = "message", skip_serializing_if = "Option::is_none")]
        label: Option<String>,
    },
    Token {
        #[serde(default)]
        message: String,
    },
    TokenEnd {
        #[serde(default, rename = "message", skip_serializing_if = "Option::is_none")]
        label: Option<String>,
    },
    MessageComplete {
        #[serde(default, rename = "message", skip_serializing_if = "Option::is_none")]
        label: Option<String>,
    },
    RoundComplete {
        #[serde(default, rename = "message", skip_serializing_if = "Option::is_none")]
        label: Option<String>,
    },
    DebateComplete {
        #[serde(default, rename = "message", skip_serializing_if = "Option::is_none")]
        label: Option<String>,
    },
    Error {
        #[serde(default)]
        message: String,
    },
}

impl Frame {
    /// Wire name of the frame's `type` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Frame::StartDebate { .. } => "start_debate",
            Frame::RoundStart { .. } => "round_start",
            Frame::MessageStart { .. } => "message_start",
            Frame::Token { .. } => "token",
            Frame::TokenEnd { .. } => "token_end",
            Frame::MessageComplete { .. } => "message_complete",
            Frame::RoundComplete { .. } => "round_complete",
            Frame::DebateComplete { .. } => "debate_complete",
            Frame::Error { .. } => "error",
        }
    }

    /// `debate_complete` and `error` end the stream; nothing after them is read.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Frame::DebateComplete { .. } | Frame::Error { .. })
    }

    pub fn token(text: impl Into<String>) -> Self {
        Frame::Token {
            message: text.into(),
        }
    }

    pub fn round_start() -> Self {
        Frame::RoundStart { label: None }
    }

    pub fn message_start() -> Self {
        Frame::MessageStart { label: None }
    }

    pub fn message_complete() -> Self {
        Frame::MessageComplete { label: None }
    }

    pub fn round_complete() -> Self {
        Frame::RoundComplete { label: None }
    }

    pub fn debate_complete() -> Self {
        Frame::DebateComplete { label: None }
    }

    /// Render as one SSE record, blank-line terminated.
    pub fn to_sse(&self) -> String {
        // Serializing a closed enum of strings cannot fail.
        let json = serde_json::to_string(self).unwrap_or_default();
        format!("data: {json}\n\n")
    }
}

// -- Handshake types --------------------------------------------------------

/// Body of `POST /api/debate/start`.
#[derive(Debug, Serialize)]
pub struct StartDebateRequest<'a> {
    pub prompt: &'a str,
    pub config: &'a DebateConfig,
}

/// Opaque identifier returned by the handshake and used to address the stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct DebateId(String);

impl DebateId {
    pub fn new(id: impl Into<String>) -> Self {
        DebateId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DebateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Response of `POST /api/debate/start`.
///
/// The server sends the id as a string, but numeric ids are accepted too.
#[derive(Debug, Deserialize)]
pub struct StartDebateResponse {
    #[serde(default)]
    pub debate_id: Option<serde_json::Value>,
}

impl StartDebateResponse {
    pub fn debate_id(&self) -> Option<DebateId> {
        match self.debate_id.as_ref()? {
            serde_json::Value::String(s) if !s.trim().is_empty() => Some(DebateId(s.clone())),
            serde_json::Value::Number(n) => Some(DebateId(n.to_string())),
            _ => None,
        }
    }
}
