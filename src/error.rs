//! Crate-level error taxonomy.
//!
//! Transport failures (handshake, connection) are [`DebateError`]s and reach
//! the caller as rejected operations. Per-record problems inside a running
//! stream are [`FrameError`] (decoder) or [`ProtocolViolation`] (reducer);
//! both are logged and skipped, never propagated.

use thiserror::Error;

/// Errors surfaced to the caller of the client API.
#[derive(Debug, Error)]
pub enum DebateError {
    /// Phase one of the handshake failed: the registering request could not
    /// be sent, returned a non-success status, or carried no debate id.
    #[error("handshake failed: {detail}")]
    Handshake {
        status: Option<u16>,
        detail: String,
    },

    /// Phase two failed: the event stream could not be opened.
    #[error("stream unavailable for debate {debate_id}: {detail}")]
    StreamUnavailable {
        debate_id: String,
        status: Option<u16>,
        detail: String,
    },

    #[error("invalid debate config: {0}")]
    InvalidConfig(String),

    #[error("invalid credential: {0}")]
    InvalidCredential(String),

    #[error("settings error: {0}")]
    Settings(String),

    #[error("export failed: {0}")]
    Export(String),

    /// Any other HTTP failure on an auxiliary endpoint (judge, health).
    #[error("HTTP {status} from {url}")]
    Http { status: u16, url: String },

    #[error(transparent)]
    Request(#[from] reqwest::Error),
}

impl DebateError {
    pub(crate) fn handshake(status: Option<u16>, detail: impl Into<String>) -> Self {
        DebateError::Handshake {
            status,
            detail: detail.into(),
        }
    }

    pub(crate) fn unavailable(
        debate_id: &str,
        status: Option<u16>,
        detail: impl Into<String>,
    ) -> Self {
        DebateError::StreamUnavailable {
            debate_id: debate_id.to_string(),
            status,
            detail: detail.into(),
        }
    }
}

/// A single SSE record whose payload could not be turned into a frame.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("malformed frame payload {payload:?}: {detail}")]
pub struct FrameError {
    pub payload: String,
    pub detail: String,
}

/// A frame arrived whose precondition was not met by the cursor state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ProtocolViolation {
    #[error("{frame} received with no open round")]
    NoOpenRound { frame: &'static str },

    #[error("{frame} received with no open message")]
    NoOpenMessage { frame: &'static str },

    #[error("{frame} received after the stream was retired")]
    Inactive { frame: &'static str },
}
