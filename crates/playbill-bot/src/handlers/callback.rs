//! Inbound button presses, decoded once into typed actions.

use tracing::debug;

use crate::actions::Action;
use crate::engine::Engine;
use crate::telegram::CallbackQuery;

pub(crate) async fn handle_callback(engine: &Engine, query: CallbackQuery) {
    let Some(chat_id) = query.message.as_ref().map(|message| message.chat.id) else {
        engine.answer_callback(&query.id).await;
        return;
    };
    let Some(action) = query.data.as_deref().and_then(Action::parse) else {
        debug!(chat_id, data = ?query.data, "ignoring undecodable callback");
        engine.answer_callback(&query.id).await;
        return;
    };

    match action {
        Action::SelectPlay { play_id } => {
            engine.answer_callback(&query.id).await;
            engine.begin_play(chat_id, &play_id).await;
        }
        Action::Advance {
            play_id,
            line_index,
        } => {
            engine.answer_callback(&query.id).await;
            engine.manual_advance(chat_id, &play_id, line_index).await;
        }
        Action::ShowAnnotation { play_id, target } => {
            engine.answer_callback(&query.id).await;
            engine.send_annotation(chat_id, &play_id, target).await;
        }
        Action::CycleMode {
            play_id,
            next_index,
        } => {
            // cycle_mode acknowledges with mode-name feedback itself.
            engine
                .cycle_mode(chat_id, &query.id, &play_id, next_index)
                .await;
        }
        Action::SceneJump {
            play_id,
            line_index,
        } => {
            engine.answer_callback(&query.id).await;
            engine.manual_advance(chat_id, &play_id, line_index).await;
        }
        Action::Finish => {
            engine.answer_callback(&query.id).await;
            engine.send_closing(chat_id).await;
        }
    }
}
