//! Interactive control rows.
//!
//! Every keyboard is a deterministic function of the content and session
//! mode, so a rebuilt keyboard after a mode change always matches what a
//! fresh delivery would have produced.

use playbill_core::play::Play;
use playbill_core::session::DeliveryMode;

use crate::actions::{Action, AnnotationTarget};
use crate::engine::render;
use crate::telegram::{InlineKeyboardButton, InlineKeyboardMarkup};

fn button(text: impl Into<String>, action: &Action) -> InlineKeyboardButton {
    InlineKeyboardButton::new(text, action.encode())
}

/// The single control row under a delivered line: mode cycle (absent on the
/// terminal line), annotation when present, then forward or finished.
pub(crate) fn line_keyboard(
    play: &Play,
    line_index: usize,
    next_index: usize,
    is_last: bool,
    mode: DeliveryMode,
) -> InlineKeyboardMarkup {
    let mut row = Vec::new();

    if !is_last {
        row.push(button(
            mode.emoji(),
            &Action::CycleMode {
                play_id: play.id.clone(),
                next_index,
            },
        ));
    }

    if play
        .line(line_index)
        .is_some_and(|line| line.annotation.is_some())
    {
        row.push(button(
            "?",
            &Action::ShowAnnotation {
                play_id: play.id.clone(),
                target: AnnotationTarget::Line(line_index),
            },
        ));
    }

    if is_last {
        row.push(button("✅ Fin", &Action::Finish));
    } else {
        row.push(button(
            "Next ▶️",
            &Action::Advance {
                play_id: play.id.clone(),
                line_index: next_index,
            },
        ));
    }

    InlineKeyboardMarkup::single_row(row)
}

/// Controls under the intro/description screen: annotation when the play
/// carries one, plus a forward control into the first line.
pub(crate) fn intro_keyboard(play: &Play) -> InlineKeyboardMarkup {
    let mut row = Vec::new();
    if play.annotation.is_some() {
        row.push(button(
            "?",
            &Action::ShowAnnotation {
                play_id: play.id.clone(),
                target: AnnotationTarget::Intro,
            },
        ));
    }
    row.push(button(
        "Next ▶️",
        &Action::Advance {
            play_id: play.id.clone(),
            line_index: 0,
        },
    ));
    InlineKeyboardMarkup::single_row(row)
}

/// Replaces the live controls after an auto-pause: resuming is a manual
/// advance, which also resets the unattended-delivery counter.
pub(crate) fn paused_keyboard(
    play: &Play,
    next_index: usize,
    mode: DeliveryMode,
) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::single_row(vec![
        button(
            mode.emoji(),
            &Action::CycleMode {
                play_id: play.id.clone(),
                next_index,
            },
        ),
        button(
            "⏸️ Resume ▶️",
            &Action::Advance {
                play_id: play.id.clone(),
                line_index: next_index,
            },
        ),
    ])
}

/// One play per row, sorted by title.
pub(crate) fn play_list_keyboard<'a>(
    plays: impl Iterator<Item = &'a Play>,
) -> InlineKeyboardMarkup {
    let mut plays: Vec<&Play> = plays.collect();
    plays.sort_by(|a, b| a.title.cmp(&b.title));

    InlineKeyboardMarkup {
        inline_keyboard: plays
            .into_iter()
            .map(|play| {
                vec![button(
                    format!("{} {}", render::play_emoji(play), play.title),
                    &Action::SelectPlay {
                        play_id: play.id.clone(),
                    },
                )]
            })
            .collect(),
    }
}

/// One scene boundary per row.
pub(crate) fn scene_keyboard(play: &Play) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup {
        inline_keyboard: play
            .scenes
            .iter()
            .map(|scene| {
                vec![button(
                    scene.label.clone(),
                    &Action::SceneJump {
                        play_id: play.id.clone(),
                        line_index: scene.line_index,
                    },
                )]
            })
            .collect(),
    }
}
