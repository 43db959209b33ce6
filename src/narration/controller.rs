//! Playback controller: the Idle → Playing → Paused state machine that feeds
//! chunks to the speech engine one utterance at a time.
//!
//! The engine never reports progress inside an utterance, so the position is
//! extrapolated from the clock: `accumulator + (now - segment_start)`, capped
//! at the estimated duration. Every cancellation bumps a generation counter;
//! utterance events carrying an older generation are dropped, which keeps a
//! late "finished" callback from advancing a sequence that no longer exists.

use serde::Serialize;
use std::sync::Arc;

use super::chunker::{ChunkPlan, DEFAULT_MAX_CHUNK_CHARS};
use super::interface::{
    NarrationError, SpeechEngine, Utterance, UtteranceEvent, UtteranceId, UtteranceSink,
};
use super::store::PersistedPreferences;
use super::timing::{
    estimate_duration_ms, Clock, PlaybackRate, PositionEstimate, DEFAULT_WORDS_PER_MINUTE,
};
use super::voice_registry::VoiceRegistry;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum PlaybackStatus {
    #[default]
    Idle,
    Playing,
    Paused,
}

#[derive(Debug, Clone, Copy)]
pub struct ControllerOptions {
    pub max_chunk_chars: usize,
    pub words_per_minute: u32,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            max_chunk_chars: DEFAULT_MAX_CHUNK_CHARS,
            words_per_minute: DEFAULT_WORDS_PER_MINUTE,
        }
    }
}

/// Read model of the controller, published to the transport.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PlaybackSnapshot {
    pub supported: bool,
    pub status: PlaybackStatus,
    pub current_chunk_index: usize,
    pub chunk_count: usize,
    pub position: PositionEstimate,
    pub duration_ms: u64,
    pub rate: PlaybackRate,
    pub selected_voice_id: Option<String>,
}

pub struct PlaybackController {
    engine: Arc<dyn SpeechEngine>,
    clock: Arc<dyn Clock>,
    sink: UtteranceSink,
    plan: ChunkPlan,
    duration_ms: u64,
    supported: bool,
    closed: bool,

    status: PlaybackStatus,
    current_chunk_index: usize,
    /// Position at the start of the running segment, or the frozen position.
    accumulator_ms: u64,
    /// Clock reading when the running segment started; `None` unless Playing.
    segment_started_at: Option<u64>,
    rate: PlaybackRate,
    selected_voice_id: Option<String>,

    generation: u64,
    /// The platform holds a paused utterance that `resume` may continue.
    paused_utterance: bool,
    persist_requested: bool,
}

impl PlaybackController {
    pub fn new(
        text: &str,
        options: ControllerOptions,
        engine: Arc<dyn SpeechEngine>,
        clock: Arc<dyn Clock>,
        sink: UtteranceSink,
    ) -> Self {
        let plan = ChunkPlan::new(text, options.max_chunk_chars);
        let duration_ms = estimate_duration_ms(text, options.words_per_minute);
        let supported = engine.is_supported();
        if !supported {
            tracing::info!(engine = %engine.id(), "speech synthesis unsupported; narration disabled");
        }
        tracing::debug!(
            chunks = plan.len(),
            total_chars = plan.total_chars(),
            duration_ms,
            "narration controller ready"
        );

        Self {
            engine,
            clock,
            sink,
            plan,
            duration_ms,
            supported,
            closed: false,
            status: PlaybackStatus::Idle,
            current_chunk_index: 0,
            accumulator_ms: 0,
            segment_started_at: None,
            rate: PlaybackRate::default(),
            selected_voice_id: None,
            generation: 0,
            paused_utterance: false,
            persist_requested: false,
        }
    }

    /// Seed position, rate and voice from stored preferences.
    /// Only meaningful before playback starts.
    pub fn restore(&mut self, prefs: &PersistedPreferences) {
        if self.status != PlaybackStatus::Idle {
            return;
        }
        self.accumulator_ms = prefs.position_ms.min(self.duration_ms);
        self.current_chunk_index = self
            .plan
            .chunk_for_position(self.accumulator_ms, self.duration_ms);
        self.rate = prefs.rate;
        self.selected_voice_id = prefs.voice_id.clone();
    }

    // ── Commands ───────────────────────────────────────

    /// Start speaking from `from_position_ms`, or from the current position.
    ///
    /// Synthesis restarts at the boundary of the chunk containing the mapped
    /// character offset; the platform cannot start mid-utterance.
    pub fn play(&mut self, from_position_ms: Option<u64>) -> Result<(), NarrationError> {
        self.ensure_active()?;
        if self.plan.is_empty() {
            tracing::debug!("nothing to narrate");
            return Ok(());
        }
        if self.status == PlaybackStatus::Playing && from_position_ms.is_none() {
            return Ok(());
        }

        let position = match from_position_ms {
            Some(requested) => requested.min(self.duration_ms),
            // Resuming a finished position starts over.
            None if self.accumulator_ms >= self.duration_ms => 0,
            None => self.accumulator_ms,
        };

        self.cancel_in_flight();
        let index = self.plan.chunk_for_position(position, self.duration_ms);
        self.status = PlaybackStatus::Playing;
        self.current_chunk_index = index;
        self.accumulator_ms = position;
        self.segment_started_at = Some(self.clock.now_ms());
        tracing::debug!(position_ms = position, chunk = index, generation = self.generation, "playing");
        self.submit(index);
        Ok(())
    }

    pub fn pause(&mut self) {
        if !self.is_active() || self.status != PlaybackStatus::Playing {
            return;
        }
        self.engine.pause();
        self.accumulator_ms = self.estimate_at(self.clock.now_ms());
        self.segment_started_at = None;
        self.status = PlaybackStatus::Paused;
        self.paused_utterance = true;
        self.persist_requested = true;
        tracing::debug!(position_ms = self.accumulator_ms, "paused");
    }

    /// Continue a paused narration. When the platform no longer holds the
    /// paused utterance, synthesis restarts from the frozen position.
    pub fn resume(&mut self) -> Result<(), NarrationError> {
        self.ensure_active()?;
        if self.status != PlaybackStatus::Paused {
            return Ok(());
        }
        if self.paused_utterance && self.engine.is_paused() {
            self.engine.resume();
            self.status = PlaybackStatus::Playing;
            self.segment_started_at = Some(self.clock.now_ms());
            self.paused_utterance = false;
            tracing::debug!(position_ms = self.accumulator_ms, "resumed");
            Ok(())
        } else {
            tracing::debug!("paused utterance was dropped by the platform, restarting chunk");
            self.play(Some(self.accumulator_ms))
        }
    }

    pub fn stop(&mut self) {
        if !self.is_active() {
            return;
        }
        self.cancel_in_flight();
        self.reset_to_start();
        self.persist_requested = true;
        tracing::debug!("stopped");
    }

    pub fn seek(&mut self, position_ms: u64) -> Result<(), NarrationError> {
        self.ensure_active()?;
        let target = position_ms.min(self.duration_ms);
        match self.status {
            PlaybackStatus::Playing => self.play(Some(target))?,
            PlaybackStatus::Paused => {
                // The paused utterance belongs to the old position.
                self.cancel_in_flight();
                self.move_to(target);
            }
            PlaybackStatus::Idle => self.move_to(target),
        }
        self.persist_requested = true;
        Ok(())
    }

    /// Seek relative to the current position, clamped to the text.
    pub fn seek_by(&mut self, delta_ms: i64) -> Result<(), NarrationError> {
        let current = self.position().position_ms as i64;
        let target = current.saturating_add(delta_ms).max(0) as u64;
        self.seek(target)
    }

    /// Takes effect from the next chunk; the in-flight utterance keeps its rate.
    pub fn set_rate(&mut self, rate: PlaybackRate) {
        if self.closed {
            return;
        }
        self.rate = rate;
        self.persist_requested = true;
    }

    /// Takes effect from the next chunk; the in-flight utterance keeps its voice.
    pub fn set_voice(&mut self, voice_id: Option<String>) {
        if self.closed {
            return;
        }
        self.selected_voice_id = voice_id;
        self.persist_requested = true;
    }

    /// Play/pause/resume depending on the current status.
    pub fn toggle(&mut self) -> Result<(), NarrationError> {
        match self.status {
            PlaybackStatus::Idle => self.play(None),
            PlaybackStatus::Playing => {
                self.pause();
                Ok(())
            }
            PlaybackStatus::Paused => self.resume(),
        }
    }

    /// Tear down for unmount: cancel platform speech once, freeze the
    /// position for a final save and ignore everything afterwards.
    pub fn shutdown(&mut self) {
        if self.closed {
            return;
        }
        if self.supported {
            self.engine.cancel();
        }
        self.generation += 1;
        self.accumulator_ms = self.estimate_at(self.clock.now_ms());
        self.segment_started_at = None;
        self.status = PlaybackStatus::Idle;
        self.paused_utterance = false;
        self.persist_requested = true;
        self.closed = true;
    }

    // ── Platform events ────────────────────────────────

    pub fn handle_event(&mut self, event: UtteranceEvent) {
        let id = event.id();
        if self.closed
            || self.status == PlaybackStatus::Idle
            || id.generation != self.generation
            || id.chunk_index != self.current_chunk_index
        {
            tracing::trace!(?id, generation = self.generation, "dropping stale utterance event");
            return;
        }

        match event {
            UtteranceEvent::Finished(_) => self.advance(),
            UtteranceEvent::Failed { reason, .. } => {
                tracing::warn!(chunk = id.chunk_index, %reason, "speech synthesis failed, stopping narration");
                self.abort();
            }
        }
    }

    // ── Queries ────────────────────────────────────────

    pub fn status(&self) -> PlaybackStatus {
        self.status
    }

    pub fn is_supported(&self) -> bool {
        self.supported
    }

    pub fn current_chunk_index(&self) -> usize {
        self.current_chunk_index
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    pub fn rate(&self) -> PlaybackRate {
        self.rate
    }

    pub fn selected_voice_id(&self) -> Option<&str> {
        self.selected_voice_id.as_deref()
    }

    pub fn plan(&self) -> &ChunkPlan {
        &self.plan
    }

    pub fn position(&self) -> PositionEstimate {
        PositionEstimate::approximate(self.estimate_at(self.clock.now_ms()))
    }

    pub fn preferences(&self) -> PersistedPreferences {
        PersistedPreferences {
            position_ms: self.position().position_ms,
            rate: self.rate,
            voice_id: self.selected_voice_id.clone(),
        }
    }

    /// Preferences to write if a command asked for persistence since the last call.
    pub fn take_persist_request(&mut self) -> Option<PersistedPreferences> {
        if std::mem::take(&mut self.persist_requested) {
            Some(self.preferences())
        } else {
            None
        }
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        PlaybackSnapshot {
            supported: self.supported,
            status: self.status,
            current_chunk_index: self.current_chunk_index,
            chunk_count: self.plan.len(),
            position: self.position(),
            duration_ms: self.duration_ms,
            rate: self.rate,
            selected_voice_id: self.selected_voice_id.clone(),
        }
    }

    // ── Internals ──────────────────────────────────────

    fn is_active(&self) -> bool {
        self.supported && !self.closed
    }

    fn ensure_active(&self) -> Result<(), NarrationError> {
        if self.closed {
            Err(NarrationError::SessionClosed)
        } else if !self.supported {
            Err(NarrationError::Unsupported)
        } else {
            Ok(())
        }
    }

    fn estimate_at(&self, now: u64) -> u64 {
        let position = match (self.status, self.segment_started_at) {
            (PlaybackStatus::Playing, Some(started)) => {
                self.accumulator_ms + now.saturating_sub(started)
            }
            _ => self.accumulator_ms,
        };
        position.min(self.duration_ms)
    }

    fn cancel_in_flight(&mut self) {
        self.engine.cancel();
        self.generation += 1;
        self.paused_utterance = false;
    }

    fn move_to(&mut self, position_ms: u64) {
        self.accumulator_ms = position_ms;
        self.current_chunk_index = self.plan.chunk_for_position(position_ms, self.duration_ms);
    }

    fn reset_to_start(&mut self) {
        self.status = PlaybackStatus::Idle;
        self.current_chunk_index = 0;
        self.accumulator_ms = 0;
        self.segment_started_at = None;
        self.paused_utterance = false;
    }

    fn submit(&mut self, index: usize) {
        let Some(text) = self.plan.get(index) else {
            return;
        };
        let registry = VoiceRegistry::from_profiles(self.engine.voices());
        let utterance = Utterance {
            id: UtteranceId {
                generation: self.generation,
                chunk_index: index,
            },
            text: text.to_string(),
            rate: self.rate,
            voice_id: registry.resolve(self.selected_voice_id.as_deref()),
        };
        tracing::trace!(chunk = index, chars = utterance.text.chars().count(), "submitting utterance");
        if let Err(e) = self.engine.speak(utterance, self.sink.clone()) {
            tracing::warn!(chunk = index, error = %e, "speech engine rejected utterance, stopping narration");
            self.abort();
        }
    }

    /// The current utterance finished: move to the next chunk or wrap up.
    fn advance(&mut self) {
        let next = self.current_chunk_index + 1;
        if next >= self.plan.len() {
            tracing::debug!("narration finished");
            self.generation += 1;
            self.reset_to_start();
            self.persist_requested = true;
            return;
        }

        self.current_chunk_index = next;
        match self.status {
            PlaybackStatus::Playing => {
                let now = self.clock.now_ms();
                // Text progress is a floor for the wall-clock estimate.
                let chunk_start = self.plan.position_of_chunk(next, self.duration_ms);
                self.accumulator_ms = self.estimate_at(now).max(chunk_start).min(self.duration_ms);
                self.segment_started_at = Some(now);
                self.submit(next);
            }
            // Finished right as it was paused; resume restarts from the frozen position.
            _ => self.paused_utterance = false,
        }
    }

    /// Fail-stop after a synthesis error: no retry, remaining chunks dropped.
    fn abort(&mut self) {
        self.engine.cancel();
        self.generation += 1;
        let frozen = self.estimate_at(self.clock.now_ms());
        self.status = PlaybackStatus::Idle;
        self.segment_started_at = None;
        self.paused_utterance = false;
        self.move_to(frozen);
        self.persist_requested = true;
    }
}
