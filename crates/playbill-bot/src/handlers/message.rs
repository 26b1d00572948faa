//! Inbound text messages: commands and the retroactive `?` reply.

use tracing::debug;

use crate::commands::{self, BotCommand};
use crate::engine::Engine;
use crate::telegram::Message;

/// A lone query glyph replying to a tracked message asks for that line's
/// annotation after the fact.
const QUERY_MARKER: &str = "?";

pub(crate) async fn handle_message(engine: &Engine, message: Message) {
    if !message.chat.is_private() {
        debug!(chat_id = message.chat.id, "ignoring non-DM chat");
        return;
    }
    if message.from.as_ref().is_some_and(|user| user.is_bot) {
        return;
    }

    let chat_id = message.chat.id;
    let Some(text) = message.text.as_deref() else {
        return;
    };

    if text.trim() == QUERY_MARKER
        && let Some(replied) = message.reply_to_message.as_deref()
    {
        engine.annotation_reply(chat_id, replied.message_id).await;
        return;
    }

    match commands::parse_command(text) {
        Some(BotCommand::Start) => engine.start_menu(chat_id).await,
        Some(BotCommand::Help) => engine.show_help(chat_id).await,
        Some(BotCommand::Plays) => engine.list_plays(chat_id).await,
        Some(BotCommand::Cast) => engine.show_cast(chat_id).await,
        Some(BotCommand::Scenes) => engine.show_scenes(chat_id).await,
        Some(BotCommand::Adaptation) => engine.toggle_adaptation(chat_id).await,
        Some(BotCommand::Audio) => engine.toggle_audio(chat_id).await,
        None => debug!(chat_id, "ignoring free-form message"),
    }
}
