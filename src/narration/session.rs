//! Narration session: one controller task per mounted player.
//!
//! The task owns the [`PlaybackController`] and consumes three inputs:
//! transport commands, utterance events from the speech engine, and two
//! timers (position refresh and periodic persistence). Everything that
//! touches playback state runs on that task, so no locking is involved and a
//! cancelled sequence is simply never resumed.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::config::NarrationConfig;
use super::controller::{ControllerOptions, PlaybackController, PlaybackSnapshot, PlaybackStatus};
use super::interface::{NarrationError, SpeechEngine, UtteranceEvent, UtteranceSink};
use super::source::NarrationSource;
use super::store::{PreferenceKeeper, PreferenceWriter, PreferencesStore};
use super::timing::{Clock, PlaybackRate, SystemClock};
use super::transport::TransportCommand;

enum SessionCommand {
    Play(Option<u64>),
    Pause,
    Resume,
    Toggle,
    Stop,
    Seek(u64),
    SeekBy(i64),
    SetRate(PlaybackRate),
    SetVoice(Option<String>),
    Snapshot(oneshot::Sender<PlaybackSnapshot>),
    Shutdown,
}

/// Handle to a mounted narration player.
pub struct NarrationSession {
    content_id: String,
    commands: mpsc::UnboundedSender<SessionCommand>,
    state: watch::Receiver<PlaybackSnapshot>,
    task: JoinHandle<()>,
}

impl NarrationSession {
    /// Mount a player for `source`: load stored preferences once, then start
    /// the controller task.
    pub async fn mount(
        source: NarrationSource,
        engine: Arc<dyn SpeechEngine>,
        store: Arc<dyn PreferencesStore>,
        config: &NarrationConfig,
    ) -> Self {
        Self::mount_with_clock(source, engine, store, config, Arc::new(SystemClock::new())).await
    }

    pub async fn mount_with_clock(
        source: NarrationSource,
        engine: Arc<dyn SpeechEngine>,
        store: Arc<dyn PreferencesStore>,
        config: &NarrationConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let keeper = PreferenceKeeper::new(store);
        let (sink, events) = UtteranceSink::channel();
        let options = ControllerOptions {
            max_chunk_chars: config.max_chunk_chars,
            words_per_minute: config.words_per_minute,
        };
        let mut controller = PlaybackController::new(&source.text, options, engine, clock, sink);
        controller.set_rate(config.default_rate());

        if controller.is_supported() {
            if let Some(prefs) = keeper.load(&source.content_id).await {
                tracing::debug!(
                    content_id = %source.content_id,
                    position_ms = prefs.position_ms,
                    "restoring narration preferences"
                );
                controller.restore(&prefs);
            }
        }
        // Seeding is not a user change.
        let _ = controller.take_persist_request();

        let (state_tx, state_rx) = watch::channel(controller.snapshot());
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        let task = SessionTask {
            content_id: source.content_id.clone(),
            controller,
            writer: PreferenceWriter::spawn(keeper, source.content_id.clone()),
            commands: command_rx,
            events,
            state: state_tx,
            position_tick: Duration::from_millis(config.position_tick_ms.max(1)),
            persist_interval: Duration::from_millis(config.persist_interval_ms.max(1)),
        };
        tracing::info!(content_id = %source.content_id, language = %source.language, "narration session mounted");

        Self {
            content_id: source.content_id,
            commands: command_tx,
            state: state_rx,
            task: tokio::spawn(task.run()),
        }
    }

    pub fn content_id(&self) -> &str {
        &self.content_id
    }

    pub fn play(&self, from_position_ms: Option<u64>) -> Result<(), NarrationError> {
        self.send(SessionCommand::Play(from_position_ms))
    }

    pub fn pause(&self) -> Result<(), NarrationError> {
        self.send(SessionCommand::Pause)
    }

    pub fn resume(&self) -> Result<(), NarrationError> {
        self.send(SessionCommand::Resume)
    }

    pub fn toggle(&self) -> Result<(), NarrationError> {
        self.send(SessionCommand::Toggle)
    }

    pub fn stop(&self) -> Result<(), NarrationError> {
        self.send(SessionCommand::Stop)
    }

    pub fn seek(&self, position_ms: u64) -> Result<(), NarrationError> {
        self.send(SessionCommand::Seek(position_ms))
    }

    pub fn seek_by(&self, delta_ms: i64) -> Result<(), NarrationError> {
        self.send(SessionCommand::SeekBy(delta_ms))
    }

    pub fn set_rate(&self, rate: PlaybackRate) -> Result<(), NarrationError> {
        self.send(SessionCommand::SetRate(rate))
    }

    pub fn set_voice(&self, voice_id: Option<String>) -> Result<(), NarrationError> {
        self.send(SessionCommand::SetVoice(voice_id))
    }

    /// Forward a transport intent (button, slider, selector or shortcut).
    pub fn dispatch(&self, command: TransportCommand) -> Result<(), NarrationError> {
        match command {
            TransportCommand::Toggle => self.toggle(),
            TransportCommand::Seek(position_ms) => self.seek(position_ms),
            TransportCommand::SeekBy(delta_ms) => self.seek_by(delta_ms),
            TransportCommand::SetRate(rate) => self.set_rate(rate),
            TransportCommand::SetVoice(voice_id) => self.set_voice(voice_id),
            TransportCommand::Stop => self.stop(),
        }
    }

    /// Last published snapshot (refreshed at least once per position tick).
    pub fn snapshot(&self) -> PlaybackSnapshot {
        self.state.borrow().clone()
    }

    /// Snapshot taken after every command sent so far has been applied.
    pub async fn current(&self) -> Result<PlaybackSnapshot, NarrationError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionCommand::Snapshot(tx))?;
        rx.await.map_err(|_| NarrationError::SessionClosed)
    }

    pub fn subscribe(&self) -> watch::Receiver<PlaybackSnapshot> {
        self.state.clone()
    }

    /// Cancel speech, flush pending preference writes (the final position
    /// last) and stop the controller task. No snapshot is published afterwards.
    pub async fn unmount(self) {
        let _ = self.commands.send(SessionCommand::Shutdown);
        if let Err(e) = self.task.await {
            tracing::warn!(content_id = %self.content_id, error = %e, "narration task ended abnormally");
        }
    }

    fn send(&self, command: SessionCommand) -> Result<(), NarrationError> {
        self.commands
            .send(command)
            .map_err(|_| NarrationError::SessionClosed)
    }
}

struct SessionTask {
    content_id: String,
    controller: PlaybackController,
    writer: PreferenceWriter,
    commands: mpsc::UnboundedReceiver<SessionCommand>,
    events: mpsc::UnboundedReceiver<UtteranceEvent>,
    state: watch::Sender<PlaybackSnapshot>,
    position_tick: Duration,
    persist_interval: Duration,
}

impl SessionTask {
    async fn run(mut self) {
        let mut position_tick = tokio::time::interval(self.position_tick);
        position_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut persist_tick = tokio::time::interval(self.persist_interval);
        persist_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // Intervals fire immediately on the first tick.
        position_tick.tick().await;
        persist_tick.tick().await;

        loop {
            tokio::select! {
                biased;

                Some(event) = self.events.recv() => self.controller.handle_event(event),
                _ = position_tick.tick() => {}
                _ = persist_tick.tick() => {
                    if self.controller.status() == PlaybackStatus::Playing {
                        self.writer.submit(self.controller.preferences());
                    }
                }
                command = self.commands.recv() => match command {
                    Some(SessionCommand::Shutdown) | None => break,
                    Some(command) => self.apply(command),
                },
            }

            if let Some(prefs) = self.controller.take_persist_request() {
                self.writer.submit(prefs);
            }
            self.publish();
        }

        self.controller.shutdown();
        if let Some(prefs) = self.controller.take_persist_request() {
            self.writer.submit(prefs);
        }
        self.writer.close().await;
        tracing::info!(content_id = %self.content_id, "narration session unmounted");
    }

    /// Wake subscribers only when the snapshot actually changed.
    fn publish(&self) {
        let snapshot = self.controller.snapshot();
        self.state.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });
    }

    fn apply(&mut self, command: SessionCommand) {
        let result = match command {
            SessionCommand::Play(from) => self.controller.play(from),
            SessionCommand::Pause => {
                self.controller.pause();
                Ok(())
            }
            SessionCommand::Resume => self.controller.resume(),
            SessionCommand::Toggle => self.controller.toggle(),
            SessionCommand::Stop => {
                self.controller.stop();
                Ok(())
            }
            SessionCommand::Seek(position_ms) => self.controller.seek(position_ms),
            SessionCommand::SeekBy(delta_ms) => self.controller.seek_by(delta_ms),
            SessionCommand::SetRate(rate) => {
                self.controller.set_rate(rate);
                Ok(())
            }
            SessionCommand::SetVoice(voice_id) => {
                self.controller.set_voice(voice_id);
                Ok(())
            }
            SessionCommand::Snapshot(reply) => {
                let _ = reply.send(self.controller.snapshot());
                Ok(())
            }
            SessionCommand::Shutdown => Ok(()),
        };
        if let Err(e) = result {
            tracing::debug!(content_id = %self.content_id, error = %e, "narration command ignored");
        }
    }
}
