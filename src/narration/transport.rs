//! Transport view-model: what the player renders for a given snapshot and how
//! user input maps onto narration commands.

use serde::Serialize;

use super::controller::{PlaybackSnapshot, PlaybackStatus};
use super::i18n::strings_for;
use super::interface::VoiceProfile;
use super::source::ContentLanguage;
use super::timing::PlaybackRate;
use super::voice_registry::VoiceRegistry;

/// User intents the transport forwards to the session.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportCommand {
    Toggle,
    Seek(u64),
    SeekBy(i64),
    SetRate(PlaybackRate),
    SetVoice(Option<String>),
    Stop,
}

// ── View Model ─────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ToggleAction {
    Play,
    Pause,
    Resume,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Icon {
    Play,
    Pause,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToggleButton {
    pub action: ToggleAction,
    pub label: &'static str,
    pub icon: Icon,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressBar {
    pub position_ms: u64,
    pub duration_ms: u64,
    /// 0.0..=1.0
    pub fraction: f64,
    pub elapsed_label: String,
    pub total_label: String,
    /// Always false: positions are wall-clock estimates.
    pub is_exact: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateOption {
    pub rate: PlaybackRate,
    pub label: &'static str,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VoiceOption {
    pub voice_id: String,
    pub name: String,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransportControls {
    pub title: &'static str,
    pub toggle: ToggleButton,
    pub progress: ProgressBar,
    pub speed_label: &'static str,
    pub rates: Vec<RateOption>,
    pub voice_label: &'static str,
    /// `None` when there are fewer than two voices to choose from.
    pub voices: Option<Vec<VoiceOption>>,
    pub rtl: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum TransportView {
    /// Nothing to narrate; the player is not shown.
    Hidden,
    Unsupported { message: &'static str },
    Controls(TransportControls),
}

/// Everything the transport needs to render.
pub struct TransportInput<'a> {
    pub snapshot: &'a PlaybackSnapshot,
    pub text_is_empty: bool,
    pub language: ContentLanguage,
    pub voices: &'a [VoiceProfile],
    pub max_voice_options: usize,
}

impl TransportView {
    pub fn render(input: &TransportInput<'_>) -> Self {
        let strings = strings_for(input.language);
        if input.text_is_empty {
            return TransportView::Hidden;
        }
        if !input.snapshot.supported {
            return TransportView::Unsupported {
                message: strings.unsupported,
            };
        }

        let snapshot = input.snapshot;
        let toggle = match snapshot.status {
            PlaybackStatus::Idle => ToggleButton {
                action: ToggleAction::Play,
                label: strings.play,
                icon: Icon::Play,
            },
            PlaybackStatus::Playing => ToggleButton {
                action: ToggleAction::Pause,
                label: strings.pause,
                icon: Icon::Pause,
            },
            PlaybackStatus::Paused => ToggleButton {
                action: ToggleAction::Resume,
                label: strings.resume,
                icon: Icon::Play,
            },
        };

        let rates = PlaybackRate::ALL
            .into_iter()
            .map(|rate| RateOption {
                rate,
                label: rate.label(),
                selected: rate == snapshot.rate,
            })
            .collect();

        TransportView::Controls(TransportControls {
            title: strings.title,
            toggle,
            progress: progress_bar(snapshot),
            speed_label: strings.speed,
            rates,
            voice_label: strings.voice,
            voices: voice_options(
                input.voices,
                input.language,
                snapshot.selected_voice_id.as_deref(),
                input.max_voice_options,
            ),
            rtl: input.language.is_rtl(),
        })
    }
}

fn progress_bar(snapshot: &PlaybackSnapshot) -> ProgressBar {
    let position_ms = snapshot.position.position_ms.min(snapshot.duration_ms);
    let fraction = if snapshot.duration_ms == 0 {
        0.0
    } else {
        position_ms as f64 / snapshot.duration_ms as f64
    };
    ProgressBar {
        position_ms,
        duration_ms: snapshot.duration_ms,
        fraction,
        elapsed_label: format_clock(position_ms),
        total_label: format_clock(snapshot.duration_ms),
        is_exact: snapshot.position.is_exact,
    }
}

/// Voice selector entries: content-language or English voices, capped at
/// `limit`. `None` when fewer than two candidates remain.
pub fn voice_options(
    voices: &[VoiceProfile],
    language: ContentLanguage,
    selected: Option<&str>,
    limit: usize,
) -> Option<Vec<VoiceOption>> {
    let registry = VoiceRegistry::from_profiles(voices.to_vec());
    let candidates = registry.candidates_for(language, limit);
    if candidates.len() < 2 {
        return None;
    }
    Some(
        candidates
            .into_iter()
            .map(|voice| VoiceOption {
                voice_id: voice.voice_id.clone(),
                name: voice.name.clone(),
                selected: selected == Some(voice.voice_id.as_str()),
            })
            .collect(),
    )
}

/// `m:ss` rendering of a millisecond offset.
pub fn format_clock(ms: u64) -> String {
    let total_secs = ms / 1000;
    format!("{}:{:02}", total_secs / 60, total_secs % 60)
}

/// Slider drag: map a 0.0..=1.0 fraction onto a seek target.
pub fn seek_from_fraction(fraction: f64, duration_ms: u64) -> TransportCommand {
    let fraction = if fraction.is_finite() {
        fraction.clamp(0.0, 1.0)
    } else {
        0.0
    };
    TransportCommand::Seek((fraction * duration_ms as f64).round() as u64)
}

// ── Keyboard ───────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Space,
    Enter,
    ArrowLeft,
    ArrowRight,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPress {
    pub key: Key,
    /// A text field has focus; shortcuts must not steal its keystrokes.
    pub text_input_focused: bool,
}

pub fn shortcut_for(press: KeyPress, seek_step_ms: u64) -> Option<TransportCommand> {
    if press.text_input_focused {
        return None;
    }
    let step = i64::try_from(seek_step_ms).unwrap_or(i64::MAX);
    match press.key {
        Key::Space | Key::Enter => Some(TransportCommand::Toggle),
        Key::ArrowLeft => Some(TransportCommand::SeekBy(-step)),
        Key::ArrowRight => Some(TransportCommand::SeekBy(step)),
        Key::Other => None,
    }
}
