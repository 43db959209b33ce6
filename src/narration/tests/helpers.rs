use crate::narration::controller::{ControllerOptions, PlaybackController};
use crate::narration::interface::{
    NarrationError, SpeechEngine, Utterance, UtteranceEvent, UtteranceSink, VoiceProfile,
};
use crate::narration::timing::ManualClock;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

// ── Text builders ───────────────────────────────────────────

/// 31 characters, 5 words.
pub const SENTENCE: &str = "Alpha beta gamma delta epsilon.";

/// Budget that fits exactly one [`SENTENCE`] per chunk.
pub const ONE_SENTENCE_BUDGET: usize = 40;

/// Five sentences: 25 words (7500 ms at 200 wpm), 155 characters once
/// chunked, one chunk every 1500 ms.
pub fn five_sentences() -> String {
    vec![SENTENCE; 5].join(" ")
}

pub fn sentences(count: usize) -> String {
    vec![SENTENCE; count].join(" ")
}

// ── Mock speech engine ──────────────────────────────────────

#[derive(Default)]
struct MockState {
    spoken: Vec<(Utterance, UtteranceSink)>,
    cancels: usize,
    pauses: usize,
    resumes: usize,
    paused: bool,
    reject_speak: bool,
}

/// Records every call; completion is driven by the test.
pub struct MockSpeechEngine {
    supported: bool,
    voices: Vec<VoiceProfile>,
    state: Mutex<MockState>,
}

#[allow(dead_code)]
impl MockSpeechEngine {
    pub fn new() -> Self {
        Self {
            supported: true,
            voices: vec![
                VoiceProfile::new("en-1", "Samantha", "en-US"),
                VoiceProfile::new("en-2", "Daniel", "en-GB"),
            ],
            state: Mutex::new(MockState::default()),
        }
    }

    pub fn unsupported() -> Self {
        Self {
            supported: false,
            ..Self::new()
        }
    }

    pub fn with_voices(voices: Vec<VoiceProfile>) -> Self {
        Self {
            voices,
            ..Self::new()
        }
    }

    pub fn spoken(&self) -> Vec<Utterance> {
        let state = self.state.lock().unwrap();
        state.spoken.iter().map(|(u, _)| u.clone()).collect()
    }

    pub fn spoken_count(&self) -> usize {
        self.state.lock().unwrap().spoken.len()
    }

    pub fn last(&self) -> Option<Utterance> {
        let state = self.state.lock().unwrap();
        state.spoken.last().map(|(u, _)| u.clone())
    }

    pub fn cancel_count(&self) -> usize {
        self.state.lock().unwrap().cancels
    }

    pub fn pause_count(&self) -> usize {
        self.state.lock().unwrap().pauses
    }

    pub fn resume_count(&self) -> usize {
        self.state.lock().unwrap().resumes
    }

    pub fn reject_speak(&self, reject: bool) {
        self.state.lock().unwrap().reject_speak = reject;
    }

    /// The platform silently dropped the paused utterance.
    pub fn drop_paused_utterance(&self) {
        self.state.lock().unwrap().paused = false;
    }

    /// Report the most recent utterance as finished.
    pub fn finish_current(&self) {
        let state = self.state.lock().unwrap();
        let (utterance, sink) = state.spoken.last().expect("nothing was spoken");
        sink.finished(utterance.id);
    }

    pub fn fail_current(&self, reason: &str) {
        let state = self.state.lock().unwrap();
        let (utterance, sink) = state.spoken.last().expect("nothing was spoken");
        sink.failed(utterance.id, reason);
    }

    /// Deliver an arbitrary event through the last sink handed to `speak`.
    pub fn emit(&self, event: UtteranceEvent) {
        let state = self.state.lock().unwrap();
        let (_, sink) = state.spoken.last().expect("nothing was spoken");
        sink.send(event);
    }
}

impl SpeechEngine for MockSpeechEngine {
    fn id(&self) -> String {
        "mock".to_string()
    }

    fn is_supported(&self) -> bool {
        self.supported
    }

    fn voices(&self) -> Vec<VoiceProfile> {
        self.voices.clone()
    }

    fn speak(&self, utterance: Utterance, sink: UtteranceSink) -> Result<(), NarrationError> {
        let mut state = self.state.lock().unwrap();
        if state.reject_speak {
            return Err(NarrationError::Synthesis("voice engine offline".to_string()));
        }
        state.paused = false;
        state.spoken.push((utterance, sink));
        Ok(())
    }

    fn cancel(&self) {
        let mut state = self.state.lock().unwrap();
        state.cancels += 1;
        state.paused = false;
    }

    fn pause(&self) {
        let mut state = self.state.lock().unwrap();
        state.pauses += 1;
        state.paused = true;
    }

    fn resume(&self) {
        let mut state = self.state.lock().unwrap();
        state.resumes += 1;
        state.paused = false;
    }

    fn is_paused(&self) -> bool {
        self.state.lock().unwrap().paused
    }
}

// ── Controller harness ──────────────────────────────────────

/// A controller wired to a mock engine and a hand-driven clock.
pub struct ControllerHarness {
    pub controller: PlaybackController,
    pub engine: Arc<MockSpeechEngine>,
    pub clock: Arc<ManualClock>,
    events: mpsc::UnboundedReceiver<UtteranceEvent>,
}

#[allow(dead_code)]
impl ControllerHarness {
    pub fn new(text: &str) -> Self {
        Self::with_engine(text, MockSpeechEngine::new())
    }

    pub fn with_engine(text: &str, engine: MockSpeechEngine) -> Self {
        let engine = Arc::new(engine);
        let clock = Arc::new(ManualClock::new());
        let (sink, events) = UtteranceSink::channel();
        let options = ControllerOptions {
            max_chunk_chars: ONE_SENTENCE_BUDGET,
            ..Default::default()
        };
        let controller =
            PlaybackController::new(text, options, engine.clone(), clock.clone(), sink);
        Self {
            controller,
            engine,
            clock,
            events,
        }
    }

    /// Feed every pending utterance event to the controller.
    pub fn pump(&mut self) -> usize {
        let mut delivered = 0;
        while let Ok(event) = self.events.try_recv() {
            self.controller.handle_event(event);
            delivered += 1;
        }
        delivered
    }

    pub fn finish_current(&mut self) {
        self.engine.finish_current();
        self.pump();
    }

    pub fn fail_current(&mut self, reason: &str) {
        self.engine.fail_current(reason);
        self.pump();
    }

    pub fn position_ms(&self) -> u64 {
        self.controller.position().position_ms
    }
}

/// Let spawned tasks (session loop, preference writer) run to quiescence.
#[allow(dead_code)]
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}
