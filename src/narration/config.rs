use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::chunker::DEFAULT_MAX_CHUNK_CHARS;
use super::timing::{PlaybackRate, DEFAULT_WORDS_PER_MINUTE};
use crate::config::ConfigError;

// ── Narration Config ───────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarrationConfig {
    /// Character budget per utterance
    #[serde(default = "default_max_chunk_chars")]
    pub max_chunk_chars: usize,
    /// Baseline speed for duration estimates
    #[serde(default = "default_words_per_minute")]
    pub words_per_minute: u32,
    /// How often the published position is refreshed while playing
    #[serde(default = "default_position_tick_ms")]
    pub position_tick_ms: u64,
    /// How often preferences are saved while playing
    #[serde(default = "default_persist_interval_ms")]
    pub persist_interval_ms: u64,
    /// Arrow-key seek distance
    #[serde(default = "default_seek_step_ms")]
    pub seek_step_ms: u64,
    #[serde(default = "default_max_voice_options")]
    pub max_voice_options: usize,
    /// Rate used when nothing is stored for the content (0.75, 1, 1.25 or 1.5)
    #[serde(default = "default_rate_multiplier")]
    pub default_rate: f32,
    /// Preferences directory; the platform data dir when unset
    #[serde(default)]
    pub storage_dir: Option<PathBuf>,
}

fn default_max_chunk_chars() -> usize {
    DEFAULT_MAX_CHUNK_CHARS
}
fn default_words_per_minute() -> u32 {
    DEFAULT_WORDS_PER_MINUTE
}
fn default_position_tick_ms() -> u64 {
    1000
}
fn default_persist_interval_ms() -> u64 {
    5000
}
fn default_seek_step_ms() -> u64 {
    10_000
}
fn default_max_voice_options() -> usize {
    5
}
fn default_rate_multiplier() -> f32 {
    1.0
}

impl Default for NarrationConfig {
    fn default() -> Self {
        Self {
            max_chunk_chars: default_max_chunk_chars(),
            words_per_minute: default_words_per_minute(),
            position_tick_ms: default_position_tick_ms(),
            persist_interval_ms: default_persist_interval_ms(),
            seek_step_ms: default_seek_step_ms(),
            max_voice_options: default_max_voice_options(),
            default_rate: default_rate_multiplier(),
            storage_dir: None,
        }
    }
}

impl NarrationConfig {
    /// `default_rate` snapped to a supported multiplier (1x when it isn't one).
    pub fn default_rate(&self) -> PlaybackRate {
        PlaybackRate::from_multiplier(f64::from(self.default_rate)).unwrap_or_else(|| {
            tracing::warn!(rate = self.default_rate, "unsupported default rate, using 1x");
            PlaybackRate::Normal
        })
    }
}

/// Load narration config from a JSON file. Falls back to defaults if file is missing or invalid.
pub fn load_config(path: &Path) -> NarrationConfig {
    crate::config::load_json_config(path, "narration")
}

/// Save narration config to a JSON file.
pub fn save_config(path: &Path, config: &NarrationConfig) -> Result<(), ConfigError> {
    crate::config::save_json_config(path, config, "narration")
}
