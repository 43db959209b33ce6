use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::store::StoreError;
use super::timing::PlaybackRate;

// ── Error Types ────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum NarrationError {
    #[error("speech synthesis is not supported on this platform")]
    Unsupported,
    #[error("synthesis failed: {0}")]
    Synthesis(String),
    #[error("narration session is closed")]
    SessionClosed,
    #[error(transparent)]
    Store(#[from] StoreError),
}

// ── Voice Profiles ─────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VoiceProfile {
    pub voice_id: String,
    pub name: String,
    /// BCP 47 tag as reported by the platform (e.g. "en-US", "fa-IR").
    pub language: String,
    #[serde(default)]
    pub is_default: bool,
}

impl VoiceProfile {
    pub fn new(voice_id: &str, name: &str, language: &str) -> Self {
        Self {
            voice_id: voice_id.to_string(),
            name: name.to_string(),
            language: language.to_string(),
            is_default: false,
        }
    }

    /// Primary language subtag, lowercased ("en-US" → "en").
    pub fn primary_language(&self) -> String {
        self.language
            .split(['-', '_'])
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase()
    }
}

// ── Utterances ─────────────────────────────────────────

/// Identifies one submitted chunk. The generation is bumped on every
/// cancellation so callbacks from a superseded sequence can be recognised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct UtteranceId {
    pub generation: u64,
    pub chunk_index: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub id: UtteranceId,
    pub text: String,
    pub rate: PlaybackRate,
    /// `None` means the platform default voice.
    pub voice_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UtteranceEvent {
    Finished(UtteranceId),
    Failed { id: UtteranceId, reason: String },
}

impl UtteranceEvent {
    pub fn id(&self) -> UtteranceId {
        match self {
            UtteranceEvent::Finished(id) => *id,
            UtteranceEvent::Failed { id, .. } => *id,
        }
    }
}

/// Channel handle a speech engine reports utterance completion through.
#[derive(Debug, Clone)]
pub struct UtteranceSink {
    tx: mpsc::UnboundedSender<UtteranceEvent>,
}

impl UtteranceSink {
    pub fn new(tx: mpsc::UnboundedSender<UtteranceEvent>) -> Self {
        Self { tx }
    }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<UtteranceEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    pub fn finished(&self, id: UtteranceId) {
        self.send(UtteranceEvent::Finished(id));
    }

    pub fn failed(&self, id: UtteranceId, reason: impl Into<String>) {
        self.send(UtteranceEvent::Failed {
            id,
            reason: reason.into(),
        });
    }

    pub fn send(&self, event: UtteranceEvent) {
        // Receiver is gone once the session has been unmounted.
        if self.tx.send(event).is_err() {
            tracing::trace!("utterance event dropped: session no longer listening");
        }
    }
}

// ── Speech Engine Trait ────────────────────────────────

/// Platform speech capability: the surface of a `SpeechSynthesis`-style API.
///
/// Calls are fire-and-forget; completion and failure arrive later through
/// the [`UtteranceSink`] handed to [`SpeechEngine::speak`].
pub trait SpeechEngine: Send + Sync {
    /// Unique identifier for this engine (e.g. "browser", "simulated")
    fn id(&self) -> String;

    /// Feature detection. Checked once when a session mounts.
    fn is_supported(&self) -> bool;

    /// Voices currently offered by the platform, in platform order.
    fn voices(&self) -> Vec<VoiceProfile>;

    /// Queue one utterance. An `Err` is treated like a platform error event.
    fn speak(&self, utterance: Utterance, sink: UtteranceSink) -> Result<(), NarrationError>;

    /// Drop the current utterance and anything queued behind it.
    fn cancel(&self);

    fn pause(&self);

    fn resume(&self);

    /// Whether the platform still holds a paused utterance that `resume` can continue.
    fn is_paused(&self) -> bool;
}
