use super::helpers::*;
use crate::narration::controller::PlaybackStatus;
use crate::narration::interface::{NarrationError, UtteranceEvent, VoiceProfile};
use crate::narration::store::PersistedPreferences;
use crate::narration::timing::PlaybackRate;

// ── Setup ───────────────────────────────────────────────────

#[test]
fn test_plan_and_duration() {
    let h = ControllerHarness::new(&five_sentences());
    assert_eq!(h.controller.plan().len(), 5);
    assert_eq!(h.controller.plan().total_chars(), 155);
    assert_eq!(h.controller.duration_ms(), 7_500);
    assert_eq!(h.controller.status(), PlaybackStatus::Idle);
    assert_eq!(h.position_ms(), 0);
}

#[test]
fn test_restore_seeds_position_rate_and_voice() {
    let mut h = ControllerHarness::new(&five_sentences());
    h.controller.restore(&PersistedPreferences {
        position_ms: 4_600,
        rate: PlaybackRate::Fast,
        voice_id: Some("en-2".to_string()),
    });
    assert_eq!(h.position_ms(), 4_600);
    assert_eq!(h.controller.current_chunk_index(), 3);
    assert_eq!(h.controller.rate(), PlaybackRate::Fast);
    assert_eq!(h.controller.selected_voice_id(), Some("en-2"));
}

#[test]
fn test_restore_clamps_past_the_end() {
    let mut h = ControllerHarness::new(&five_sentences());
    h.controller.restore(&PersistedPreferences {
        position_ms: 90_000,
        ..Default::default()
    });
    assert_eq!(h.position_ms(), 7_500);
    assert_eq!(h.controller.current_chunk_index(), 4);
}

// ── Play / position ─────────────────────────────────────────

#[test]
fn test_play_submits_first_chunk() {
    let mut h = ControllerHarness::new(&five_sentences());
    h.controller.play(None).unwrap();

    assert_eq!(h.controller.status(), PlaybackStatus::Playing);
    let spoken = h.engine.spoken();
    assert_eq!(spoken.len(), 1);
    assert_eq!(spoken[0].text, SENTENCE);
    assert_eq!(spoken[0].id.chunk_index, 0);
    assert_eq!(spoken[0].rate, PlaybackRate::Normal);
}

#[test]
fn test_position_extrapolates_and_caps() {
    let mut h = ControllerHarness::new(&five_sentences());
    h.controller.play(None).unwrap();

    h.clock.advance(700);
    let estimate = h.controller.position();
    assert_eq!(estimate.position_ms, 700);
    assert!(!estimate.is_exact, "wall-clock positions are never exact");

    h.clock.advance(100_000);
    assert_eq!(h.position_ms(), 7_500);
}

#[test]
fn test_play_while_playing_is_noop() {
    let mut h = ControllerHarness::new(&five_sentences());
    h.controller.play(None).unwrap();
    h.controller.play(None).unwrap();
    assert_eq!(h.engine.spoken_count(), 1);
}

#[test]
fn test_play_from_end_starts_over() {
    let mut h = ControllerHarness::new(&five_sentences());
    h.controller.restore(&PersistedPreferences {
        position_ms: 7_500,
        ..Default::default()
    });
    h.controller.play(None).unwrap();
    assert_eq!(h.engine.last().unwrap().id.chunk_index, 0);
    assert_eq!(h.position_ms(), 0);
}

#[test]
fn test_empty_text_never_speaks() {
    let mut h = ControllerHarness::new("   ");
    h.controller.play(None).unwrap();
    assert_eq!(h.engine.spoken_count(), 0);
    assert_eq!(h.controller.status(), PlaybackStatus::Idle);
}

// ── Stop / seek ─────────────────────────────────────────────

#[test]
fn test_stop_resets_to_start() {
    let mut h = ControllerHarness::new(&five_sentences());
    h.controller.play(Some(3_100)).unwrap();
    h.clock.advance(400);
    let cancels = h.engine.cancel_count();

    h.controller.stop();

    assert_eq!(h.engine.cancel_count(), cancels + 1);
    assert_eq!(h.controller.status(), PlaybackStatus::Idle);
    assert_eq!(h.controller.current_chunk_index(), 0);
    assert_eq!(h.position_ms(), 0);
    let persisted = h.controller.take_persist_request().expect("stop persists");
    assert_eq!(persisted.position_ms, 0);
}

#[test]
fn test_seek_while_idle_only_moves() {
    let mut h = ControllerHarness::new(&five_sentences());
    h.controller.seek(4_600).unwrap();

    assert_eq!(h.controller.status(), PlaybackStatus::Idle);
    assert_eq!(h.controller.current_chunk_index(), 3);
    assert_eq!(h.position_ms(), 4_600);
    assert_eq!(h.engine.spoken_count(), 0);
    assert!(h.controller.take_persist_request().is_some());
}

#[test]
fn test_seek_while_playing_restarts_at_chunk_boundary() {
    let mut h = ControllerHarness::new(&five_sentences());
    h.controller.play(None).unwrap();
    let first = h.engine.last().unwrap();

    h.controller.seek(3_100).unwrap();

    let second = h.engine.last().unwrap();
    assert_eq!(second.id.chunk_index, 2);
    assert_eq!(second.text, SENTENCE);
    assert!(second.id.generation > first.id.generation);
    assert_eq!(h.controller.status(), PlaybackStatus::Playing);
    assert_eq!(h.position_ms(), 3_100);
}

#[test]
fn test_seek_while_paused_stays_paused() {
    let mut h = ControllerHarness::new(&five_sentences());
    h.controller.play(None).unwrap();
    h.clock.advance(500);
    h.controller.pause();

    h.controller.seek(6_100).unwrap();
    assert_eq!(h.controller.status(), PlaybackStatus::Paused);
    assert_eq!(h.controller.current_chunk_index(), 4);
    assert_eq!(h.engine.spoken_count(), 1);

    // The old paused utterance is gone, so resume speaks the new chunk.
    h.controller.resume().unwrap();
    assert_eq!(h.engine.resume_count(), 0);
    assert_eq!(h.engine.last().unwrap().id.chunk_index, 4);
}

#[test]
fn test_seek_by_clamps_to_bounds() {
    let mut h = ControllerHarness::new(&five_sentences());
    h.controller.seek(500).unwrap();
    h.controller.seek_by(-10_000).unwrap();
    assert_eq!(h.position_ms(), 0);

    h.controller.seek_by(100_000).unwrap();
    assert_eq!(h.position_ms(), 7_500);
    assert_eq!(h.controller.current_chunk_index(), 4);
}

// ── Pause / resume ──────────────────────────────────────────

#[test]
fn test_pause_freezes_position() {
    let mut h = ControllerHarness::new(&five_sentences());
    h.controller.play(None).unwrap();
    h.clock.advance(500);
    h.controller.pause();

    assert_eq!(h.controller.status(), PlaybackStatus::Paused);
    assert_eq!(h.engine.pause_count(), 1);
    h.clock.advance(10_000);
    assert_eq!(h.position_ms(), 500);

    let persisted = h.controller.take_persist_request().expect("pause persists");
    assert_eq!(persisted.position_ms, 500);
}

#[test]
fn test_resume_continues_paused_utterance() {
    let mut h = ControllerHarness::new(&five_sentences());
    h.controller.play(None).unwrap();
    h.clock.advance(500);
    h.controller.pause();
    h.clock.advance(3_000);

    h.controller.resume().unwrap();
    assert_eq!(h.controller.status(), PlaybackStatus::Playing);
    assert_eq!(h.engine.resume_count(), 1);
    assert_eq!(h.engine.spoken_count(), 1);

    h.clock.advance(200);
    assert_eq!(h.position_ms(), 700);
}

#[test]
fn test_resume_restarts_when_platform_dropped_utterance() {
    let mut h = ControllerHarness::new(&five_sentences());
    h.controller.play(None).unwrap();
    h.clock.advance(1_600);
    h.controller.pause();
    h.engine.drop_paused_utterance();

    h.controller.resume().unwrap();

    assert_eq!(h.controller.status(), PlaybackStatus::Playing);
    assert_eq!(h.engine.resume_count(), 0);
    assert_eq!(h.engine.spoken_count(), 2);
    assert_eq!(h.engine.last().unwrap().id.chunk_index, 1);
    assert_eq!(h.position_ms(), 1_600);
}

#[test]
fn test_toggle_cycles_through_states() {
    let mut h = ControllerHarness::new(&five_sentences());
    h.controller.toggle().unwrap();
    assert_eq!(h.controller.status(), PlaybackStatus::Playing);
    h.controller.toggle().unwrap();
    assert_eq!(h.controller.status(), PlaybackStatus::Paused);
    h.controller.toggle().unwrap();
    assert_eq!(h.controller.status(), PlaybackStatus::Playing);
}

// ── Chunk sequencing ────────────────────────────────────────

#[test]
fn test_finished_chunk_advances() {
    let mut h = ControllerHarness::new(&five_sentences());
    h.controller.play(None).unwrap();
    h.finish_current();

    assert_eq!(h.controller.current_chunk_index(), 1);
    assert_eq!(h.engine.last().unwrap().id.chunk_index, 1);
    // Finished early: text progress wins over the clock.
    assert_eq!(h.position_ms(), 1_500);
}

#[test]
fn test_slow_chunk_keeps_wall_clock_estimate() {
    let mut h = ControllerHarness::new(&five_sentences());
    h.controller.play(None).unwrap();
    h.clock.advance(2_000);
    h.finish_current();
    assert_eq!(h.position_ms(), 2_000);
}

#[test]
fn test_finishing_last_chunk_returns_to_idle_at_start() {
    let mut h = ControllerHarness::new(&five_sentences());
    h.controller.play(None).unwrap();
    for _ in 0..5 {
        h.clock.advance(1_500);
        h.finish_current();
    }

    assert_eq!(h.engine.spoken_count(), 5);
    assert_eq!(h.controller.status(), PlaybackStatus::Idle);
    assert_eq!(h.controller.current_chunk_index(), 0);
    assert_eq!(h.position_ms(), 0);
    let persisted = h.controller.take_persist_request().unwrap();
    assert_eq!(persisted.position_ms, 0);
}

#[test]
fn test_stale_event_is_ignored() {
    let mut h = ControllerHarness::new(&five_sentences());
    h.controller.play(None).unwrap();
    let stale = h.engine.last().unwrap().id;

    h.controller.seek(3_100).unwrap();
    h.engine.emit(UtteranceEvent::Finished(stale));
    assert_eq!(h.pump(), 1);

    assert_eq!(h.controller.current_chunk_index(), 2);
    assert_eq!(h.engine.spoken_count(), 2);
}

#[test]
fn test_event_for_other_chunk_is_ignored() {
    let mut h = ControllerHarness::new(&five_sentences());
    h.controller.play(None).unwrap();
    let mut id = h.engine.last().unwrap().id;
    id.chunk_index = 3;
    h.engine.emit(UtteranceEvent::Finished(id));
    h.pump();
    assert_eq!(h.controller.current_chunk_index(), 0);
    assert_eq!(h.engine.spoken_count(), 1);
}

#[test]
fn test_event_after_stop_is_ignored() {
    let mut h = ControllerHarness::new(&five_sentences());
    h.controller.play(None).unwrap();
    h.controller.stop();
    h.finish_current();
    assert_eq!(h.controller.status(), PlaybackStatus::Idle);
    assert_eq!(h.engine.spoken_count(), 1);
}

// ── Rate / voice ────────────────────────────────────────────

#[test]
fn test_rate_change_applies_from_next_chunk() {
    let mut h = ControllerHarness::new(&five_sentences());
    h.controller.play(None).unwrap();
    h.clock.advance(300);
    h.controller.set_rate(PlaybackRate::Faster);
    assert_eq!(h.position_ms(), 300);
    h.controller.set_rate(PlaybackRate::Fast);

    assert_eq!(h.engine.spoken_count(), 1, "in-flight utterance is not interrupted");
    h.finish_current();

    let spoken = h.engine.spoken();
    assert_eq!(spoken[0].rate, PlaybackRate::Normal);
    assert_eq!(spoken[1].rate, PlaybackRate::Fast);
    let persisted = h.controller.take_persist_request().unwrap();
    assert_eq!(persisted.rate, PlaybackRate::Fast);
}

#[test]
fn test_voice_change_applies_from_next_chunk() {
    let mut h = ControllerHarness::new(&five_sentences());
    h.controller.play(None).unwrap();
    h.controller.set_voice(Some("en-2".to_string()));
    h.finish_current();

    let spoken = h.engine.spoken();
    assert_eq!(spoken[0].voice_id, None);
    assert_eq!(spoken[1].voice_id.as_deref(), Some("en-2"));
}

#[test]
fn test_unavailable_voice_falls_back_to_default() {
    let engine = MockSpeechEngine::with_voices(vec![VoiceProfile::new("en-1", "Samantha", "en-US")]);
    let mut h = ControllerHarness::with_engine(&five_sentences(), engine);
    h.controller.set_voice(Some("vanished".to_string()));
    h.controller.play(None).unwrap();

    assert_eq!(h.engine.last().unwrap().voice_id, None);
    // The selection itself is kept for when the voice comes back.
    assert_eq!(h.controller.selected_voice_id(), Some("vanished"));
}

// ── Failures ────────────────────────────────────────────────

#[test]
fn test_error_on_second_chunk_stops_sequence() {
    let mut h = ControllerHarness::new(&five_sentences());
    h.controller.play(None).unwrap();
    h.clock.advance(1_500);
    h.finish_current();
    h.clock.advance(300);
    let cancels = h.engine.cancel_count();

    h.fail_current("audio device lost");

    assert_eq!(h.controller.status(), PlaybackStatus::Idle);
    assert_eq!(h.engine.spoken_count(), 2, "no retry, no further chunks");
    assert_eq!(h.engine.cancel_count(), cancels + 1);
    assert_eq!(h.position_ms(), 1_800);
    assert!(h.controller.take_persist_request().is_some());

    // A late completion for the failed chunk changes nothing.
    h.finish_current();
    assert_eq!(h.engine.spoken_count(), 2);
}

#[test]
fn test_rejected_speak_aborts() {
    let mut h = ControllerHarness::new(&five_sentences());
    h.engine.reject_speak(true);
    h.controller.play(None).unwrap();
    assert_eq!(h.controller.status(), PlaybackStatus::Idle);
    assert_eq!(h.engine.spoken_count(), 0);
}

// ── Unsupported platform ────────────────────────────────────

#[test]
fn test_unsupported_platform_is_inert() {
    let mut h = ControllerHarness::with_engine(&five_sentences(), MockSpeechEngine::unsupported());

    assert!(matches!(h.controller.play(None), Err(NarrationError::Unsupported)));
    h.controller.pause();
    h.controller.stop();

    assert!(!h.controller.snapshot().supported);
    assert_eq!(h.engine.spoken_count(), 0);
    assert_eq!(h.engine.cancel_count(), 0);
    assert_eq!(h.engine.pause_count(), 0);
}

// ── Shutdown ────────────────────────────────────────────────

#[test]
fn test_shutdown_cancels_once_and_ignores_everything_after() {
    let mut h = ControllerHarness::new(&five_sentences());
    h.controller.play(None).unwrap();
    h.clock.advance(900);
    let cancels = h.engine.cancel_count();

    h.controller.shutdown();
    h.controller.shutdown();
    assert_eq!(h.engine.cancel_count(), cancels + 1);

    let persisted = h.controller.take_persist_request().unwrap();
    assert_eq!(persisted.position_ms, 900);

    h.finish_current();
    assert_eq!(h.engine.spoken_count(), 1);
    assert!(matches!(h.controller.play(None), Err(NarrationError::SessionClosed)));
    assert_eq!(h.controller.status(), PlaybackStatus::Idle);
}

#[test]
fn test_shutdown_on_unsupported_platform_never_cancels() {
    let mut h = ControllerHarness::with_engine(&five_sentences(), MockSpeechEngine::unsupported());
    h.controller.shutdown();
    assert_eq!(h.engine.cancel_count(), 0);
}
