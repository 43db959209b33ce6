use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::interface::{
    NarrationError, SpeechEngine, Utterance, UtteranceId, UtteranceSink, VoiceProfile,
};
use super::timing::{estimate_duration_ms, DEFAULT_WORDS_PER_MINUTE};

/// Speech engine that "speaks" by sleeping for the estimated utterance
/// duration, then reporting completion. Used by the CLI and for demos on
/// machines without a synthesis backend.
///
/// Holds a single utterance at a time; `speak` replaces whatever is running.
pub struct SimulatedSpeechEngine {
    voices: Vec<VoiceProfile>,
    words_per_minute: u32,
    state: Arc<Mutex<SimState>>,
}

#[derive(Default)]
struct SimState {
    running: Option<Running>,
    paused: Option<Pending>,
}

struct Running {
    pending: Pending,
    started_at: Instant,
    task: JoinHandle<()>,
}

struct Pending {
    id: UtteranceId,
    remaining_ms: u64,
    sink: UtteranceSink,
}

impl SimulatedSpeechEngine {
    pub fn new(voices: Vec<VoiceProfile>) -> Self {
        Self {
            voices,
            words_per_minute: DEFAULT_WORDS_PER_MINUTE,
            state: Arc::new(Mutex::new(SimState::default())),
        }
    }

    pub fn with_words_per_minute(mut self, words_per_minute: u32) -> Self {
        self.words_per_minute = words_per_minute;
        self
    }

    /// A handful of voices in English, Arabic and Persian.
    pub fn default_voices() -> Vec<VoiceProfile> {
        let mut samantha = VoiceProfile::new("sim-en-us", "Samantha", "en-US");
        samantha.is_default = true;
        vec![
            samantha,
            VoiceProfile::new("sim-en-gb", "Daniel", "en-GB"),
            VoiceProfile::new("sim-ar-sa", "Maged", "ar-SA"),
            VoiceProfile::new("sim-fa-ir", "Dariush", "fa-IR"),
        ]
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        lock_state(&self.state)
    }

    fn start(&self, state: &mut SimState, pending: Pending) {
        let shared = Arc::clone(&self.state);
        let id = pending.id;
        let sink = pending.sink.clone();
        let wait = Duration::from_millis(pending.remaining_ms);
        let task = tokio::spawn(async move {
            tokio::time::sleep(wait).await;
            {
                let mut state = lock_state(&shared);
                if state.running.as_ref().map(|r| r.pending.id) == Some(id) {
                    state.running = None;
                }
            }
            sink.finished(id);
        });
        state.running = Some(Running {
            pending,
            started_at: Instant::now(),
            task,
        });
    }
}

impl Default for SimulatedSpeechEngine {
    fn default() -> Self {
        Self::new(Self::default_voices())
    }
}

fn lock_state(state: &Mutex<SimState>) -> MutexGuard<'_, SimState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl SpeechEngine for SimulatedSpeechEngine {
    fn id(&self) -> String {
        "simulated".to_string()
    }

    fn is_supported(&self) -> bool {
        true
    }

    fn voices(&self) -> Vec<VoiceProfile> {
        self.voices.clone()
    }

    fn speak(&self, utterance: Utterance, sink: UtteranceSink) -> Result<(), NarrationError> {
        if utterance.text.trim().is_empty() {
            return Err(NarrationError::Synthesis("empty utterance".to_string()));
        }
        let base_ms = estimate_duration_ms(&utterance.text, self.words_per_minute);
        let remaining_ms = (base_ms as f64 / f64::from(utterance.rate.multiplier())).round() as u64;
        tracing::info!(
            chunk = utterance.id.chunk_index,
            rate = utterance.rate.label(),
            voice = utterance.voice_id.as_deref().unwrap_or("default"),
            duration_ms = remaining_ms,
            "speaking: {}",
            utterance.text
        );

        let mut state = self.lock();
        if let Some(previous) = state.running.take() {
            previous.task.abort();
        }
        state.paused = None;
        self.start(
            &mut state,
            Pending {
                id: utterance.id,
                remaining_ms,
                sink,
            },
        );
        Ok(())
    }

    fn cancel(&self) {
        let mut state = self.lock();
        if let Some(running) = state.running.take() {
            running.task.abort();
        }
        state.paused = None;
    }

    fn pause(&self) {
        let mut state = self.lock();
        if let Some(running) = state.running.take() {
            running.task.abort();
            let elapsed = running.started_at.elapsed().as_millis() as u64;
            let mut pending = running.pending;
            pending.remaining_ms = pending.remaining_ms.saturating_sub(elapsed);
            state.paused = Some(pending);
        }
    }

    fn resume(&self) {
        let mut state = self.lock();
        if let Some(pending) = state.paused.take() {
            self.start(&mut state, pending);
        }
    }

    fn is_paused(&self) -> bool {
        self.lock().paused.is_some()
    }
}
