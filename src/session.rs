//! Transport session: handshake, one live event stream per session, and
//! delivery of decoded frames to a single consumer.
//!
//! Opening a debate is two requests. `POST /api/debate/start` registers the
//! debate and returns an opaque id; `GET /api/debate/{id}/stream` is the
//! long-lived event stream. A spawned reader task pulls chunks off the
//! stream, runs them through [`FrameDecoder`] and forwards frames over an
//! unbounded channel in wire order. The consumer side is a [`StreamHandle`].
//!
//! All teardown goes through one owned guard ([`ActiveStream`]): dropping it
//! cancels the reader and clears the session's current-stream indicator, so
//! every exit path (completion, upstream error, timeout, disconnect, explicit
//! close, session drop) releases the same way.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use reqwest::header::{ACCEPT, CACHE_CONTROL};
use reqwest::Client;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::DebateConfig;
use crate::credential::{ApiKey, API_KEY_HEADER};
use crate::decoder::FrameDecoder;
use crate::error::DebateError;
use crate::protocol::{DebateId, Frame, StartDebateRequest, StartDebateResponse};
use crate::settings::ClientSettings;

// ---------------------------------------------------------------------------
// Stream outcome types
// ---------------------------------------------------------------------------

/// Why a stream stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// `debate_complete` was received.
    Completed,
    /// The producer sent an `error` frame.
    UpstreamError(String),
    /// No terminating frame arrived within the stream timeout.
    TimedOut,
    /// Closed by the caller. Not a failure.
    Aborted,
    /// The server ended the body before a terminating frame.
    Disconnected,
    /// Reading the body failed mid-stream.
    Transport(String),
}

impl Termination {
    pub fn is_failure(&self) -> bool {
        !matches!(self, Termination::Completed | Termination::Aborted)
    }
}

impl std::fmt::Display for Termination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Termination::Completed => write!(f, "debate complete"),
            Termination::UpstreamError(msg) => write!(f, "upstream error: {msg}"),
            Termination::TimedOut => write!(f, "timed out waiting for the debate to finish"),
            Termination::Aborted => write!(f, "aborted"),
            Termination::Disconnected => write!(f, "stream ended before the debate finished"),
            Termination::Transport(e) => write!(f, "stream read failed: {e}"),
        }
    }
}

/// What the reader task hands to the consumer.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Frame(Frame),
    /// Always the last event of a stream, sent exactly once.
    Closed(Termination),
}

// ---------------------------------------------------------------------------
// DebateClient: the two handshake requests plus auxiliary endpoints
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct DebateClient {
    http: Client,
    settings: ClientSettings,
}

impl DebateClient {
    pub fn new(settings: ClientSettings) -> Result<Self, DebateError> {
        // No whole-request timeout on the client: the event stream is
        // long-lived and bounded by `stream_timeout` instead.
        let http = Client::builder()
            .connect_timeout(settings.connect_timeout)
            .build()?;
        Ok(DebateClient { http, settings })
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    /// Phase one: register the debate and obtain its stream id.
    ///
    /// # Returns
    /// - `Err(DebateError::InvalidConfig)`: config fails validation; nothing is sent.
    /// - `Err(DebateError::Handshake)`: connection failure, non-2xx status,
    ///   unparseable body, or no `debate_id` in the body.
    pub async fn start_debate(
        &self,
        prompt: &str,
        config: &DebateConfig,
        credential: &ApiKey,
    ) -> Result<DebateId, DebateError> {
        config.validate()?;

        let url = self.settings.start_url();
        let resp = self
            .http
            .post(&url)
            .timeout(self.settings.handshake_timeout)
            .header(API_KEY_HEADER, credential.expose())
            .json(&StartDebateRequest { prompt, config })
            .send()
            .await
            .map_err(|e| DebateError::handshake(None, format!("{url}: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(DebateError::handshake(
                Some(status.as_u16()),
                format!("failed to start stream, status {status}"),
            ));
        }

        let body: StartDebateResponse = resp.json().await.map_err(|e| {
            DebateError::handshake(Some(status.as_u16()), format!("unreadable response: {e}"))
        })?;

        let debate_id = body.debate_id().ok_or_else(|| {
            DebateError::handshake(Some(status.as_u16()), "response carried no debate_id")
        })?;
        info!(debate_id = %debate_id, "debate registered");
        Ok(debate_id)
    }

    /// Phase two: open the event stream for a registered debate.
    pub async fn connect(&self, debate_id: &DebateId) -> Result<reqwest::Response, DebateError> {
        let url = self.settings.stream_url(debate_id.as_str());
        let resp = self
            .http
            .get(&url)
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await
            .map_err(|e| DebateError::unavailable(debate_id.as_str(), None, e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(DebateError::unavailable(
                debate_id.as_str(),
                Some(status.as_u16()),
                format!("stream response not ok: {status}"),
            ));
        }
        Ok(resp)
    }

    /// Ask the service to judge a finished debate with an LLM. The verdict
    /// shape is service-defined and returned as-is.
    pub async fn judge_llm(&self, debate_id: &DebateId) -> Result<serde_json::Value, DebateError> {
        let url = self.settings.judge_url(debate_id.as_str());
        let resp = self
            .http
            .get(&url)
            .timeout(self.settings.handshake_timeout)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(DebateError::Http {
                status: resp.status().as_u16(),
                url,
            });
        }
        Ok(resp.json().await?)
    }

    /// `GET /api/health`; true when the service answers `{"status":"ok"}`.
    pub async fn health(&self) -> Result<bool, DebateError> {
        let url = self.settings.health_url();
        let resp = self
            .http
            .get(&url)
            .timeout(self.settings.handshake_timeout)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(DebateError::Http {
                status: resp.status().as_u16(),
                url,
            });
        }
        let body: serde_json::Value = resp.json().await?;
        Ok(body.get("status").and_then(|s| s.as_str()) == Some("ok"))
    }
}

// ---------------------------------------------------------------------------
// Per-stream shared state
// ---------------------------------------------------------------------------

type Indicator = Arc<watch::Sender<Option<DebateId>>>;

/// State shared by the session guard, the reader task and the handle.
#[derive(Debug)]
struct StreamState {
    debate_id: DebateId,
    /// Cancelled only by the caller (close, drop, re-open).
    cancel: CancellationToken,
    retired: AtomicBool,
    indicator: Indicator,
}

impl StreamState {
    /// Clear the current-stream indicator. Only the first call on any exit
    /// path has an effect.
    fn retire(&self) -> bool {
        if self.retired.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.indicator.send_if_modified(|current| {
            if current.as_ref() == Some(&self.debate_id) {
                *current = None;
                true
            } else {
                false
            }
        });
        debug!(debate_id = %self.debate_id, "stream retired");
        true
    }

    fn is_retired(&self) -> bool {
        self.retired.load(Ordering::SeqCst)
    }
}

/// Owned handle on the live stream. Dropping it is the one teardown path.
struct ActiveStream {
    state: Arc<StreamState>,
}

impl Drop for ActiveStream {
    fn drop(&mut self) {
        self.state.cancel.cancel();
        self.state.retire();
    }
}

// ---------------------------------------------------------------------------
// StreamSession
// ---------------------------------------------------------------------------

/// Owns at most one live debate stream.
pub struct StreamSession {
    client: DebateClient,
    active: Option<ActiveStream>,
    indicator: Indicator,
}

impl StreamSession {
    pub fn new(client: DebateClient) -> Self {
        let (tx, _rx) = watch::channel(None);
        StreamSession {
            client,
            active: None,
            indicator: Arc::new(tx),
        }
    }

    pub fn client(&self) -> &DebateClient {
        &self.client
    }

    /// Id of the stream currently open, if any.
    pub fn current_stream(&self) -> Option<DebateId> {
        self.indicator.borrow().clone()
    }

    /// Watch the current-stream indicator. It is set when a stream opens and
    /// cleared once when it ends, however it ends.
    pub fn subscribe(&self) -> watch::Receiver<Option<DebateId>> {
        self.indicator.subscribe()
    }

    pub fn is_open(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|a| !a.state.is_retired())
    }

    /// Register a debate and open its event stream.
    ///
    /// Any stream already open on this session is closed first.
    pub async fn open(
        &mut self,
        input: &str,
        config: &DebateConfig,
        credential: &ApiKey,
    ) -> Result<StreamHandle, DebateError> {
        self.close();
        // Reject an unrepresentable deadline before registering anything.
        self.client.settings.stream_deadline()?;

        let debate_id = self.client.start_debate(input, config, credential).await?;

        let deadline = self.client.settings.stream_deadline()?;
        let response = tokio::time::timeout_at(deadline, self.client.connect(&debate_id))
            .await
            .map_err(|_| {
                DebateError::unavailable(debate_id.as_str(), None, "timed out waiting for stream")
            })??;

        let state = Arc::new(StreamState {
            debate_id: debate_id.clone(),
            cancel: CancellationToken::new(),
            retired: AtomicBool::new(false),
            indicator: Arc::clone(&self.indicator),
        });
        self.indicator.send_replace(Some(debate_id.clone()));

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(read_stream(response, Arc::clone(&state), deadline, tx));
        info!(debate_id = %debate_id, "stream opened");

        self.active = Some(ActiveStream {
            state: Arc::clone(&state),
        });
        Ok(StreamHandle {
            state,
            rx,
            finished: false,
        })
    }

    /// Close the open stream, if any. Safe to call any number of times.
    pub fn close(&mut self) {
        if let Some(active) = self.active.take() {
            debug!(debate_id = %active.state.debate_id, "closing stream");
        }
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        self.close();
    }
}

// ---------------------------------------------------------------------------
// StreamHandle: the single consumer
// ---------------------------------------------------------------------------

/// Consumer end of one debate stream.
///
/// Frames come out strictly in wire order. Once the stream has been closed
/// by the caller, frames still queued are dropped rather than delivered.
#[derive(Debug)]
pub struct StreamHandle {
    state: Arc<StreamState>,
    rx: mpsc::UnboundedReceiver<StreamEvent>,
    finished: bool,
}

impl StreamHandle {
    pub fn debate_id(&self) -> &DebateId {
        &self.state.debate_id
    }

    /// Close this stream from the consumer side. Idempotent.
    pub fn close(&self) {
        self.state.cancel.cancel();
        self.state.retire();
    }

    /// Next event, or `None` after [`StreamEvent::Closed`] has been returned.
    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        if self.finished {
            return None;
        }
        let event = if self.state.cancel.is_cancelled() {
            None
        } else {
            tokio::select! {
                biased;
                _ = self.state.cancel.cancelled() => None,
                event = self.rx.recv() => event,
            }
        };
        match event {
            Some(StreamEvent::Frame(frame)) => Some(StreamEvent::Frame(frame)),
            Some(StreamEvent::Closed(t)) => {
                self.finished = true;
                Some(StreamEvent::Closed(t))
            }
            None => {
                self.finished = true;
                Some(StreamEvent::Closed(Termination::Aborted))
            }
        }
    }

    /// Drive the stream to its end, calling `handler` once per frame.
    pub async fn on_frame<F>(mut self, mut handler: F) -> Termination
    where
        F: FnMut(Frame),
    {
        while let Some(event) = self.next_event().await {
            match event {
                StreamEvent::Frame(frame) => handler(frame),
                StreamEvent::Closed(t) => return t,
            }
        }
        Termination::Aborted
    }
}

// ---------------------------------------------------------------------------
// Reader task
// ---------------------------------------------------------------------------

async fn read_stream(
    response: reqwest::Response,
    state: Arc<StreamState>,
    deadline: Instant,
    tx: mpsc::UnboundedSender<StreamEvent>,
) {
    let mut body = response.bytes_stream();
    let mut decoder = FrameDecoder::new();
    let timeout = tokio::time::sleep_until(deadline);
    tokio::pin!(timeout);

    let termination = loop {
        tokio::select! {
            biased;
            _ = state.cancel.cancelled() => break Termination::Aborted,
            _ = &mut timeout => break Termination::TimedOut,
            chunk = body.next() => match chunk {
                Some(Ok(bytes)) => {
                    if let Some(end) = forward(decoder.push(&bytes), &tx) {
                        break end;
                    }
                }
                Some(Err(e)) => break Termination::Transport(e.to_string()),
                None => {
                    break forward(decoder.finish().into_iter().collect(), &tx)
                        .unwrap_or(Termination::Disconnected);
                }
            },
        }
    };

    match &termination {
        Termination::Completed | Termination::Aborted => info!(
            debate_id = %state.debate_id,
            frames = decoder.decoded(),
            skipped = decoder.skipped(),
            outcome = %termination,
            "stream finished"
        ),
        _ => warn!(
            debate_id = %state.debate_id,
            frames = decoder.decoded(),
            skipped = decoder.skipped(),
            outcome = %termination,
            "stream ended abnormally"
        ),
    }

    state.retire();
    let _ = tx.send(StreamEvent::Closed(termination));
}

/// Send frames to the consumer. Returns the termination if one of them ends
/// the stream or the consumer has gone away.
fn forward(frames: Vec<Frame>, tx: &mpsc::UnboundedSender<StreamEvent>) -> Option<Termination> {
    for frame in frames {
        let end = match &frame {
            Frame::DebateComplete { .. } => Some(Termination::Completed),
            Frame::Error { message } => Some(Termination::UpstreamError(message.clone())),
            _ => None,
        };
        if tx.send(StreamEvent::Frame(frame)).is_err() {
            return Some(Termination::Aborted);
        }
        if end.is_some() {
            return end;
        }
    }
    None
}
