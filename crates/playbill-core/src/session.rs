//! Per-chat playback state.
//!
//! One session per chat, created lazily and kept for the process lifetime.
//! Sessions are addressed by chat id and never shared across chats, so the
//! store's mutex only has to serialize accesses within a single chat.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::AbortHandle;

/// How the next line reaches the reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryMode {
    /// User-paced: the reader taps forward themselves.
    #[default]
    Manual,
    /// Slow randomized pacing, a line every 10-60 minutes.
    Ambient,
    /// Near reading-pace delivery.
    Active,
}

impl DeliveryMode {
    /// Advances along the fixed cycle manual -> ambient -> active -> manual.
    pub fn next(self) -> Self {
        match self {
            Self::Manual => Self::Ambient,
            Self::Ambient => Self::Active,
            Self::Active => Self::Manual,
        }
    }

    pub fn emoji(self) -> &'static str {
        match self {
            Self::Manual => "👆",
            Self::Ambient => "🕯️",
            Self::Active => "⚡",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Manual => "Manual",
            Self::Ambient => "Ambient",
            Self::Active => "Active",
        }
    }
}

/// The pair of live timers armed for a session, owned as one value so
/// cancellation is a single operation rather than two nullable fields.
#[derive(Debug)]
pub struct ScheduledWork {
    pub typing: AbortHandle,
    pub delivery: AbortHandle,
}

impl ScheduledWork {
    pub fn cancel(self) {
        self.typing.abort();
        self.delivery.abort();
    }
}

/// Where a previously sent message points back into the content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineRef {
    pub play_id: String,
    pub line_index: usize,
}

#[derive(Debug, Default)]
pub struct Session {
    /// Active play, if any.
    pub play_id: Option<String>,
    /// Current line position; `None` means the intro/description screen.
    pub position: Option<usize>,
    pub mode: DeliveryMode,
    pub adaptation: bool,
    pub audio: bool,
    /// The one live interactive message, whose controls get stripped on the
    /// next delivery.
    pub last_interactive: Option<i64>,
    pub last_annotation: Option<i64>,
    /// Sent message id -> line, for retroactive annotation lookups.
    pub message_map: HashMap<i64, LineRef>,
    /// Consecutive unattended deliveries since the last manual advance.
    pub auto_deliveries: u32,
    pub scheduled: Option<ScheduledWork>,
}

impl Session {
    /// Cancels any armed timers. Arming must always go through here first so
    /// at most one timer of each kind is ever outstanding.
    pub fn cancel_scheduled(&mut self) {
        if let Some(work) = self.scheduled.take() {
            work.cancel();
        }
    }
}

/// Repository of per-chat sessions. Cheap to clone; an engine owns one
/// instance and hands clones to its timer tasks.
#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<Mutex<HashMap<i64, Session>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f` against the chat's session, creating a fresh default session
    /// on first access. The closure runs under the store lock and must not
    /// block.
    pub async fn with<R>(&self, chat_id: i64, f: impl FnOnce(&mut Session) -> R) -> R {
        let mut sessions = self.inner.lock().await;
        f(sessions.entry(chat_id).or_default())
    }

    /// Takes the session's armed timers without cancelling them, for a timer
    /// callback clearing its own handle.
    pub async fn take_scheduled(&self, chat_id: i64) -> Option<ScheduledWork> {
        self.with(chat_id, |session| session.scheduled.take()).await
    }

    /// Cancels any armed timers for the chat.
    pub async fn cancel_scheduled(&self, chat_id: i64) {
        self.with(chat_id, Session::cancel_scheduled).await;
    }

    /// Clears navigation state on returning to the home screen: play,
    /// position, annotation pointer, and the retroactive-annotation map.
    /// Delivery mode and toggles survive deliberately.
    pub async fn reset_navigation(&self, chat_id: i64) {
        self.with(chat_id, |session| {
            session.cancel_scheduled();
            session.play_id = None;
            session.position = None;
            session.last_annotation = None;
            session.message_map.clear();
            session.auto_deliveries = 0;
        })
        .await;
    }
}
