//! Playback timing: speed multipliers, word-count duration estimates and the
//! clock the position extrapolation runs on.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Baseline narration speed used for duration estimates.
pub const DEFAULT_WORDS_PER_MINUTE: u32 = 200;

// ── Playback Rate ──────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum PlaybackRate {
    Slow,
    #[default]
    Normal,
    Fast,
    Faster,
}

impl PlaybackRate {
    pub const ALL: [PlaybackRate; 4] = [
        PlaybackRate::Slow,
        PlaybackRate::Normal,
        PlaybackRate::Fast,
        PlaybackRate::Faster,
    ];

    pub fn multiplier(self) -> f32 {
        match self {
            PlaybackRate::Slow => 0.75,
            PlaybackRate::Normal => 1.0,
            PlaybackRate::Fast => 1.25,
            PlaybackRate::Faster => 1.5,
        }
    }

    /// Map a stored or user-supplied multiplier back onto one of the fixed rates.
    pub fn from_multiplier(value: f64) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|rate| (f64::from(rate.multiplier()) - value).abs() < 1e-3)
    }

    pub fn label(self) -> &'static str {
        match self {
            PlaybackRate::Slow => "0.75x",
            PlaybackRate::Normal => "1x",
            PlaybackRate::Fast => "1.25x",
            PlaybackRate::Faster => "1.5x",
        }
    }
}

// ── Estimates ──────────────────────────────────────────

/// Estimated narration length of `text` at `words_per_minute`.
///
/// Computed once per text; the rate multiplier is not applied.
pub fn estimate_duration_ms(text: &str, words_per_minute: u32) -> u64 {
    let wpm = if words_per_minute == 0 {
        DEFAULT_WORDS_PER_MINUTE
    } else {
        words_per_minute
    };
    let words = text.split_whitespace().count() as u64;
    words * 60_000 / u64::from(wpm)
}

/// A playback position derived from wall-clock extrapolation.
///
/// The platform never reports sub-utterance progress, so `is_exact` is
/// always `false` for positions produced by the controller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PositionEstimate {
    pub position_ms: u64,
    pub is_exact: bool,
}

impl PositionEstimate {
    pub fn approximate(position_ms: u64) -> Self {
        Self {
            position_ms,
            is_exact: false,
        }
    }
}

// ── Clock ──────────────────────────────────────────────

/// Monotonic millisecond clock.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

/// Backed by `tokio::time::Instant`, so it follows tokio's paused test clock.
pub struct SystemClock {
    origin: tokio::time::Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: tokio::time::Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

/// Hand-driven clock for deterministic tests and replays.
#[derive(Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }

    pub fn set(&self, ms: u64) {
        self.now.store(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}
