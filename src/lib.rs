pub mod cli;
pub mod config;
pub mod credential;
pub mod decoder;
pub mod error;
pub mod protocol;
pub mod reducer;
pub mod render;
pub mod scoring;
pub mod session;
pub mod settings;
pub mod transcript;

pub use config::{DebateConfig, DebateStyle, SystemPrompt};
pub use credential::ApiKey;
pub use decoder::FrameDecoder;
pub use error::{DebateError, FrameError, ProtocolViolation};
pub use protocol::{DebateId, Frame};
pub use reducer::{Control, Ending, TranscriptReducer};
pub use scoring::{DebateResult, ScoreSheet};
pub use session::{DebateClient, StreamEvent, StreamHandle, StreamSession, Termination};
pub use settings::ClientSettings;
pub use transcript::{Message, MessageId, Round, RoundId, Transcript};

use tracing::debug;

// ---------------------------------------------------------------------------
// Stream → transcript
// ---------------------------------------------------------------------------

/// Drive `handle` to completion, folding every frame into `transcript`.
///
/// `observe` runs after each fold with the frame and the updated transcript.
/// Frames arriving after the reducer has retired (a terminal frame was
/// folded) are dropped without being observed. The reducer's cursors are
/// reset first, so a transcript can receive several debates in turn.
pub async fn fold_stream<F>(
    handle: StreamHandle,
    reducer: &mut TranscriptReducer,
    transcript: &mut Transcript,
    mut observe: F,
) -> Termination
where
    F: FnMut(&Frame, &Transcript),
{
    reducer.reset();
    let termination = handle
        .on_frame(|frame| {
            if !reducer.is_active() {
                debug!(kind = frame.kind(), "late frame dropped");
                return;
            }
            reducer.fold(transcript, &frame);
            observe(&frame, transcript);
        })
        .await;
    reducer.deactivate();
    termination
}
