//! The delivery engine: sends lines, owns the per-session timers, and keeps
//! the one live interactive message per chat consistent.

pub(crate) mod controls;
pub(crate) mod render;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use playbill_core::pacing;
use playbill_core::play::{DEFAULT_WORD_COUNT, Play};
use playbill_core::session::{DeliveryMode, LineRef, ScheduledWork, SessionStore};
use tracing::{debug, info, warn};

use crate::actions::AnnotationTarget;
use crate::narrator::Narrator;
use crate::telegram::{InlineKeyboardMarkup, TelegramClient};

/// Pause before the first line when a play has no description screen.
const OPENING_BEAT: Duration = Duration::from_millis(500);

/// Cheap to clone; timer tasks and handlers share the same inner state.
#[derive(Clone)]
pub(crate) struct Engine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    client: TelegramClient,
    plays: HashMap<String, Play>,
    sessions: SessionStore,
    narrator: Option<Narrator>,
    auto_pause_threshold: u32,
}

impl Engine {
    pub(crate) fn new(
        client: TelegramClient,
        plays: HashMap<String, Play>,
        narrator: Option<Narrator>,
        auto_pause_threshold: u32,
    ) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                client,
                plays,
                sessions: SessionStore::new(),
                narrator,
                auto_pause_threshold,
            }),
        }
    }

    fn client(&self) -> &TelegramClient {
        &self.inner.client
    }

    fn sessions(&self) -> &SessionStore {
        &self.inner.sessions
    }

    fn play(&self, play_id: &str) -> Option<&Play> {
        let play = self.inner.plays.get(play_id);
        if play.is_none() {
            warn!(play_id, "unknown play referenced");
        }
        play
    }

    /// Home screen: welcome text plus the play list. Navigation state is
    /// cleared; delivery mode and toggles survive.
    pub(crate) async fn start_menu(&self, chat_id: i64) {
        self.sessions().reset_navigation(chat_id).await;

        if self.inner.plays.is_empty() {
            self.send_text(chat_id, "🎭 *Playbill*\n\nNo plays available yet.")
                .await;
            return;
        }

        let keyboard = controls::play_list_keyboard(self.inner.plays.values());
        if let Err(err) = self
            .client()
            .send_message(chat_id, render::welcome_text(), Some(&keyboard))
            .await
        {
            warn!(%err, chat_id, "failed to send welcome");
        }
    }

    pub(crate) async fn list_plays(&self, chat_id: i64) {
        let keyboard = controls::play_list_keyboard(self.inner.plays.values());
        if let Err(err) = self
            .client()
            .send_message(chat_id, "🎭 *Available Plays*", Some(&keyboard))
            .await
        {
            warn!(%err, chat_id, "failed to send play list");
        }
    }

    pub(crate) async fn show_help(&self, chat_id: i64) {
        self.send_text(chat_id, render::help_text()).await;
    }

    /// Opens a play: title card, optional image and cast, then either the
    /// description screen with its own forward control or the first line.
    pub(crate) async fn begin_play(&self, chat_id: i64, play_id: &str) {
        let Some(play) = self.play(play_id) else {
            return;
        };

        self.sessions().reset_navigation(chat_id).await;
        self.sessions()
            .with(chat_id, |session| {
                session.play_id = Some(play.id.clone());
            })
            .await;

        self.send_text(chat_id, &render::title_card(play)).await;
        if let Some(image) = play.image.as_deref()
            && let Err(err) = self.client().send_photo(chat_id, image).await
        {
            debug!(%err, chat_id, "failed to send play image");
        }
        if !play.cast.is_empty() {
            self.send_text(chat_id, &render::cast_text(play)).await;
        }

        if let Some(description) = play.description.as_deref() {
            let keyboard = controls::intro_keyboard(play);
            match self
                .client()
                .send_message(chat_id, description, Some(&keyboard))
                .await
            {
                Ok(message_id) => {
                    self.sessions()
                        .with(chat_id, |session| {
                            session.last_interactive = Some(message_id);
                        })
                        .await;
                }
                Err(err) => warn!(%err, chat_id, "failed to send description"),
            }
        } else {
            tokio::time::sleep(OPENING_BEAT).await;
            self.send_line(chat_id, play_id, 0, true).await;
        }
    }

    /// A user-driven jump: cancel whatever was armed, then deliver.
    pub(crate) async fn manual_advance(&self, chat_id: i64, play_id: &str, index: usize) {
        self.sessions().cancel_scheduled(chat_id).await;
        self.send_line(chat_id, play_id, index, true).await;
    }

    /// Delivers the first visible line at or after `from_index`.
    ///
    /// This is the only place lines are sent from: button presses arrive
    /// here with `manual` set, timer callbacks with it clear.
    pub(crate) fn send_line<'a>(
        &'a self,
        chat_id: i64,
        play_id: &'a str,
        from_index: usize,
        manual: bool,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send + 'a>> {
        // Returns a concrete boxed future rather than an opaque `async fn` so
        // `schedule_next`'s spawned task can prove this future is `Send` —
        // the two are mutually recursive and the compiler cannot check
        // auto-traits across opaque types in the same defining scope.
        Box::pin(async move {
        let Some(play) = self.play(play_id) else {
            return;
        };
        let (adaptation, mode, audio) = self
            .sessions()
            .with(chat_id, |session| {
                (session.adaptation, session.mode, session.audio)
            })
            .await;

        let mut index = play.next_visible_line(from_index, adaptation);
        let (index, text) = loop {
            if index >= play.lines.len() {
                self.finish_play(chat_id, manual).await;
                return;
            }
            match render::format_line(play, &play.lines[index], adaptation) {
                Some(text) => break (index, text),
                None => {
                    warn!(play_id, line = index, "line resolved to no text; skipping");
                    index = play.next_visible_line(index + 1, adaptation);
                }
            }
        };
        let line = &play.lines[index];

        self.cleanup_previous(chat_id, manual).await;

        let next_index = play.next_visible_line(index + 1, adaptation);
        let is_last = next_index >= play.lines.len();
        let keyboard = controls::line_keyboard(play, index, next_index, is_last, mode);

        if let Some(image) = line.image.as_deref()
            && let Err(err) = self.client().send_photo(chat_id, image).await
        {
            debug!(%err, chat_id, "failed to send line image");
        }

        match self
            .client()
            .send_message(chat_id, &text, Some(&keyboard))
            .await
        {
            Ok(message_id) => {
                self.sessions()
                    .with(chat_id, |session| {
                        session.play_id = Some(play.id.clone());
                        session.position = Some(index);
                        session.last_interactive = Some(message_id);
                        session.message_map.insert(
                            message_id,
                            LineRef {
                                play_id: play.id.clone(),
                                line_index: index,
                            },
                        );
                    })
                    .await;
            }
            // Best-effort continuation: no message id is recorded, but the
            // position and scheduling still advance.
            Err(err) => warn!(%err, chat_id, play_id, line = index, "failed to deliver line"),
        }

        if audio {
            self.spawn_narration(chat_id, play_id, index, adaptation);
        }

        if is_last {
            return;
        }

        let threshold = self.inner.auto_pause_threshold;
        let paused = self
            .sessions()
            .with(chat_id, |session| {
                if manual {
                    session.auto_deliveries = 0;
                    return false;
                }
                session.auto_deliveries += 1;
                if session.mode == DeliveryMode::Active && session.auto_deliveries >= threshold {
                    session.auto_deliveries = 0;
                    return true;
                }
                false
            })
            .await;

        if paused {
            self.pause_playback(chat_id, play_id, next_index).await;
        } else {
            // Box the recursive call so its `Send`-ness is proven at a single
            // coercion point, breaking the cyclic auto-trait inference between
            // `send_line` and `schedule_next`.
            let next: std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>> =
                Box::pin(self.schedule_next(chat_id, play_id, next_index));
            next.await;
        }
        })
    }

    /// Arms the typing and delivery timers for the next visible line,
    /// replacing any armed pair. Manual mode and the past-end sentinel both
    /// leave the session with no timers.
    pub(crate) async fn schedule_next(&self, chat_id: i64, play_id: &str, next_index: usize) {
        let (mode, adaptation) = self
            .sessions()
            .with(chat_id, |session| {
                session.cancel_scheduled();
                (session.mode, session.adaptation)
            })
            .await;

        let Some(play) = self.play(play_id) else {
            return;
        };
        if mode == DeliveryMode::Manual {
            return;
        }
        let target = play.next_visible_line(next_index, adaptation);
        if target >= play.lines.len() {
            return;
        }

        let previous_words = target
            .checked_sub(1)
            .and_then(|index| play.line(index))
            .map_or(DEFAULT_WORD_COUNT, |line| line.word_count(adaptation));
        let Some(delay) = pacing::delivery_delay(mode, previous_words) else {
            return;
        };
        let lead = pacing::typing_lead(play.lines[target].word_count(adaptation), delay);

        debug!(
            chat_id,
            play_id,
            line = target,
            delay_ms = delay.as_millis() as u64,
            lead_ms = lead.as_millis() as u64,
            "arming delivery timers"
        );

        let typing = {
            let client = self.client().clone();
            tokio::spawn(async move {
                tokio::time::sleep(delay - lead).await;
                if let Err(err) = client.send_chat_action(chat_id).await {
                    debug!(%err, chat_id, "composing indicator failed");
                }
            })
            .abort_handle()
        };

        let delivery = {
            let engine = self.clone();
            let play_id = play_id.to_string();
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                // Clear our own handles first: aborting the armed pair from
                // inside the delivery task would cancel this very task.
                if let Some(work) = engine.sessions().take_scheduled(chat_id).await {
                    work.typing.abort();
                }
                engine.send_line(chat_id, &play_id, next_index, false).await;
            })
            .abort_handle()
        };

        self.sessions()
            .with(chat_id, |session| {
                session.cancel_scheduled();
                session.scheduled = Some(ScheduledWork { typing, delivery });
            })
            .await;
    }

    /// Auto-pause after a run of unattended active-mode deliveries: nothing
    /// further is armed and the live message offers resume instead.
    async fn pause_playback(&self, chat_id: i64, play_id: &str, next_index: usize) {
        info!(chat_id, play_id, "auto-pausing unattended playback");
        let (last_interactive, mode) = self
            .sessions()
            .with(chat_id, |session| (session.last_interactive, session.mode))
            .await;
        let Some(play) = self.play(play_id) else {
            return;
        };
        if let Some(message_id) = last_interactive {
            let keyboard = controls::paused_keyboard(play, next_index, mode);
            if let Err(err) = self
                .client()
                .edit_message_reply_markup(chat_id, message_id, &keyboard)
                .await
            {
                debug!(%err, chat_id, "failed to rewrite controls for pause");
            }
        }
    }

    /// Strips the previous turn's controls and, in manual flows, deletes the
    /// outstanding annotation. Annotations persist during unattended
    /// ambient/active playback where a reader may still be on them.
    async fn cleanup_previous(&self, chat_id: i64, manual: bool) {
        let (last_interactive, annotation) = self
            .sessions()
            .with(chat_id, |session| {
                let last = session.last_interactive.take();
                let annotation = if manual || session.mode == DeliveryMode::Manual {
                    session.last_annotation.take()
                } else {
                    None
                };
                (last, annotation)
            })
            .await;

        if let Some(message_id) = last_interactive
            && let Err(err) = self
                .client()
                .edit_message_reply_markup(chat_id, message_id, &InlineKeyboardMarkup::empty())
                .await
        {
            debug!(%err, chat_id, message_id, "failed to strip controls");
        }
        if let Some(message_id) = annotation
            && let Err(err) = self.client().delete_message(chat_id, message_id).await
        {
            debug!(%err, chat_id, message_id, "failed to delete annotation");
        }
    }

    /// The sole exit from the playback loop: the past-end sentinel.
    async fn finish_play(&self, chat_id: i64, manual: bool) {
        self.cleanup_previous(chat_id, manual).await;
        self.sessions()
            .with(chat_id, |session| {
                session.cancel_scheduled();
                session.auto_deliveries = 0;
            })
            .await;
        self.send_text(chat_id, render::finished_text()).await;
    }

    /// Acknowledgement of the terminal control.
    pub(crate) async fn send_closing(&self, chat_id: i64) {
        self.send_text(chat_id, render::closing_text()).await;
    }

    /// Advances the delivery mode, re-arms (or disarms) the timers for the
    /// embedded next index, and rebuilds the live message's controls so the
    /// mode button shows the new state.
    pub(crate) async fn cycle_mode(
        &self,
        chat_id: i64,
        query_id: &str,
        play_id: &str,
        next_index: usize,
    ) {
        let new_mode = self
            .sessions()
            .with(chat_id, |session| {
                session.mode = session.mode.next();
                session.mode
            })
            .await;

        // Acknowledge with the mode name before any downstream sends.
        if let Err(err) = self
            .client()
            .answer_callback_query(query_id, Some(&render::mode_feedback(new_mode)))
            .await
        {
            debug!(%err, chat_id, "failed to answer mode callback");
        }

        self.schedule_next(chat_id, play_id, next_index).await;

        let (last_interactive, position, adaptation) = self
            .sessions()
            .with(chat_id, |session| {
                (
                    session.last_interactive,
                    session.position,
                    session.adaptation,
                )
            })
            .await;
        let Some(play) = self.play(play_id) else {
            return;
        };
        if let (Some(message_id), Some(position)) = (last_interactive, position) {
            let next_visible = play.next_visible_line(position + 1, adaptation);
            let is_last = next_visible >= play.lines.len();
            if !is_last {
                let keyboard =
                    controls::line_keyboard(play, position, next_visible, is_last, new_mode);
                if let Err(err) = self
                    .client()
                    .edit_message_reply_markup(chat_id, message_id, &keyboard)
                    .await
                {
                    debug!(%err, chat_id, "failed to rewrite controls for mode change");
                }
            }
        }
    }

    /// Sends a line's (or the intro's) annotation as its own message and
    /// remembers it for later cleanup.
    pub(crate) async fn send_annotation(
        &self,
        chat_id: i64,
        play_id: &str,
        target: AnnotationTarget,
    ) {
        let Some(play) = self.play(play_id) else {
            return;
        };
        let annotation = match target {
            AnnotationTarget::Intro => play.annotation.as_deref(),
            AnnotationTarget::Line(index) => {
                play.line(index).and_then(|line| line.annotation.as_deref())
            }
        };
        let Some(annotation) = annotation else {
            debug!(chat_id, play_id, "annotation requested where none exists");
            return;
        };

        match self
            .client()
            .send_message(chat_id, &render::annotation_text(annotation), None)
            .await
        {
            Ok(message_id) => {
                self.sessions()
                    .with(chat_id, |session| {
                        session.last_annotation = Some(message_id);
                    })
                    .await;
            }
            Err(err) => warn!(%err, chat_id, "failed to send annotation"),
        }
    }

    /// A lone `?` reply: look the replied-to message up in the retroactive
    /// map. A tracked line without annotation gets an explicit notice, an
    /// untracked message is ignored.
    pub(crate) async fn annotation_reply(&self, chat_id: i64, replied_message_id: i64) {
        let entry = self
            .sessions()
            .with(chat_id, |session| {
                session.message_map.get(&replied_message_id).cloned()
            })
            .await;
        let Some(entry) = entry else {
            return;
        };

        let has_annotation = self
            .inner
            .plays
            .get(&entry.play_id)
            .and_then(|play| play.line(entry.line_index))
            .is_some_and(|line| line.annotation.is_some());

        if has_annotation {
            self.send_annotation(
                chat_id,
                &entry.play_id,
                AnnotationTarget::Line(entry.line_index),
            )
            .await;
        } else {
            self.send_text(chat_id, render::no_annotation_text()).await;
        }
    }

    /// Flips adaptation mode. Turning it on for a play with no adaptation
    /// content reverts the flag and says so instead.
    pub(crate) async fn toggle_adaptation(&self, chat_id: i64) {
        let play_id = self
            .sessions()
            .with(chat_id, |session| session.play_id.clone())
            .await;
        let Some(play_id) = play_id else {
            self.send_text(chat_id, "Choose a play first — /plays.").await;
            return;
        };

        let enabled = self
            .sessions()
            .with(chat_id, |session| {
                session.adaptation = !session.adaptation;
                session.adaptation
            })
            .await;

        if enabled
            && let Some(play) = self.play(&play_id)
            && !play.has_adaptation()
        {
            self.sessions()
                .with(chat_id, |session| session.adaptation = false)
                .await;
            self.send_text(chat_id, "This play has no adaptation text.")
                .await;
            return;
        }

        let notice = if enabled {
            "📖 Adaptation on — adapted text where available."
        } else {
            "📜 Adaptation off — original text."
        };
        self.send_text(chat_id, notice).await;
    }

    /// Flips audio narration. Enabling it without a configured synthesizer
    /// reverts the flag and says so instead.
    pub(crate) async fn toggle_audio(&self, chat_id: i64) {
        let enabled = self
            .sessions()
            .with(chat_id, |session| {
                session.audio = !session.audio;
                session.audio
            })
            .await;

        if enabled && self.inner.narrator.is_none() {
            self.sessions()
                .with(chat_id, |session| session.audio = false)
                .await;
            self.send_text(chat_id, "Audio narration is not configured on this server.")
                .await;
            return;
        }

        let notice = if enabled {
            "🔊 Audio narration on."
        } else {
            "🔇 Audio narration off."
        };
        self.send_text(chat_id, notice).await;
    }

    pub(crate) async fn show_cast(&self, chat_id: i64) {
        let play_id = self
            .sessions()
            .with(chat_id, |session| session.play_id.clone())
            .await;
        let Some(play) = play_id.as_deref().and_then(|id| self.inner.plays.get(id)) else {
            self.send_text(chat_id, "Choose a play first — /plays.").await;
            return;
        };
        if play.cast.is_empty() {
            self.send_text(chat_id, "No cast list for this play.").await;
            return;
        }
        self.send_text(chat_id, &render::cast_text(play)).await;
    }

    pub(crate) async fn show_scenes(&self, chat_id: i64) {
        let play_id = self
            .sessions()
            .with(chat_id, |session| session.play_id.clone())
            .await;
        let Some(play) = play_id.as_deref().and_then(|id| self.inner.plays.get(id)) else {
            self.send_text(chat_id, "Choose a play first — /plays.").await;
            return;
        };
        if play.scenes.is_empty() {
            self.send_text(chat_id, "No scene index for this play.").await;
            return;
        }
        let keyboard = controls::scene_keyboard(play);
        if let Err(err) = self
            .client()
            .send_message(chat_id, "🎭 *Acts & Scenes*", Some(&keyboard))
            .await
        {
            warn!(%err, chat_id, "failed to send scene list");
        }
    }

    pub(crate) async fn answer_callback(&self, query_id: &str) {
        if let Err(err) = self.client().answer_callback_query(query_id, None).await {
            debug!(%err, "failed to answer callback query");
        }
    }

    /// Audio never blocks or delays the text path.
    fn spawn_narration(&self, chat_id: i64, play_id: &str, line_index: usize, adaptation: bool) {
        let engine = self.clone();
        let play_id = play_id.to_string();
        tokio::spawn(async move {
            let Some(narrator) = engine.inner.narrator.as_ref() else {
                return;
            };
            let Some(play) = engine.inner.plays.get(&play_id) else {
                return;
            };
            if let Err(err) = narrator
                .deliver(&engine.inner.client, chat_id, play, line_index, adaptation)
                .await
            {
                warn!(%err, chat_id, play_id = %play_id, line = line_index, "audio narration failed");
            }
        });
    }

    /// Plain send with failures logged and swallowed; the next action
    /// re-derives correct state regardless.
    async fn send_text(&self, chat_id: i64, text: &str) {
        if let Err(err) = self.client().send_message(chat_id, text, None).await {
            warn!(%err, chat_id, "failed to send message");
        }
    }
}
