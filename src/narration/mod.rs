pub mod chunker;
pub mod config;
pub mod controller;
pub mod i18n;
pub mod interface;
pub mod session;
pub mod simulated;
pub mod source;
pub mod store;
pub mod timing;
pub mod transport;
pub mod voice_registry;

#[cfg(test)]
mod tests;

pub use chunker::{chunk_text, split_sentences, ChunkPlan};
pub use config::{load_config, NarrationConfig};
pub use controller::{ControllerOptions, PlaybackController, PlaybackSnapshot, PlaybackStatus};
pub use interface::{
    NarrationError, SpeechEngine, Utterance, UtteranceEvent, UtteranceId, UtteranceSink,
    VoiceProfile,
};
pub use session::NarrationSession;
pub use simulated::SimulatedSpeechEngine;
pub use source::{ContentLanguage, NarrationSource};
pub use store::{FileStore, MemoryStore, PersistedPreferences, PreferencesStore, StoreError};
pub use timing::{Clock, ManualClock, PlaybackRate, PositionEstimate, SystemClock};
pub use transport::{TransportCommand, TransportView};
