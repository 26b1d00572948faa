//! Message text rendering.

use playbill_core::play::{Line, LineKind, Play};

const STAGE_AVATAR: &str = "📍";
const DIALOGUE_AVATAR: &str = "🎭";
const PLAY_EMOJI: &str = "🎭";

/// Renders a line as a chat bubble, or `None` when no text resolves under
/// the given adaptation mode — the caller skips rather than sending an
/// empty bubble.
pub(crate) fn format_line(play: &Play, line: &Line, adaptation: bool) -> Option<String> {
    let text = line.resolved_text(adaptation)?;
    let rendered = match line.kind {
        LineKind::Stage => {
            let avatar = line.avatar.as_deref().unwrap_or(STAGE_AVATAR);
            format!("{avatar} *Stage*\n_{text}_")
        }
        LineKind::Dialogue => {
            let sender = line.sender.as_deref().unwrap_or("—");
            let avatar = line
                .avatar
                .as_deref()
                .or_else(|| {
                    play.character(sender)
                        .and_then(|character| character.avatar.as_deref())
                })
                .unwrap_or(DIALOGUE_AVATAR);
            format!("{avatar} *{sender}*\n{text}")
        }
    };
    Some(rendered)
}

pub(crate) fn play_emoji(play: &Play) -> &str {
    play.emoji.as_deref().unwrap_or(PLAY_EMOJI)
}

pub(crate) fn title_card(play: &Play) -> String {
    format!("{} *{}*\n_{}_", play_emoji(play), play.title, play.author)
}

pub(crate) fn cast_text(play: &Play) -> String {
    let mut text = format!("🎭 *Cast — {}*\n", play.title);
    for entry in &play.cast {
        text.push('\n');
        text.push_str(entry);
    }
    text
}

pub(crate) fn annotation_text(annotation: &str) -> String {
    format!("📍 *Annotation*\n\n{annotation}")
}

pub(crate) fn mode_feedback(mode: playbill_core::session::DeliveryMode) -> String {
    format!("{} {} mode", mode.emoji(), mode.label())
}

pub(crate) fn welcome_text() -> &'static str {
    "🎭 *Playbill*\n\nClassic plays, delivered line by line.\n\nChoose a play to begin:\n\n_Tip: Type /start anytime to return to this menu_"
}

pub(crate) fn help_text() -> &'static str {
    "🎭 *Playbill — Help*\n\n\
     • Press *Next ▶️* to advance\n\
     • Press *?* on any line for its annotation\n\
     • Reply to any line with *?* to get its annotation later\n\
     • Press the mode button to cycle delivery:\n\
     \u{2003}👆 Manual — tap Next yourself\n\
     \u{2003}🕯️ Ambient — next line arrives in 10–60 min\n\
     \u{2003}⚡ Active — next line arrives at reading pace\n\n\
     /start — Choose a play\n\
     /plays — List plays\n\
     /cast — Cast of the current play\n\
     /scenes — Jump to an act or scene\n\
     /adaptation — Toggle the adapted text\n\
     /audio — Toggle audio narration"
}

pub(crate) fn closing_text() -> &'static str {
    "🎭 *Fin*\n\nThank you for reading!\n\n/plays for another."
}

pub(crate) fn finished_text() -> &'static str {
    "🎭 *Fin*\n\nThe curtain falls. /plays for another."
}

pub(crate) fn no_annotation_text() -> &'static str {
    "_No annotation for this line._"
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use playbill_core::play::{Character, Line, LineKind, Play};

    use super::format_line;

    fn play() -> Play {
        let mut characters = HashMap::new();
        characters.insert(
            "HAMLET".to_string(),
            Character {
                avatar: Some("🖤".to_string()),
                voice: None,
            },
        );
        Play {
            id: "hamlet".to_string(),
            title: "Hamlet".to_string(),
            author: "William Shakespeare".to_string(),
            emoji: None,
            image: None,
            description: None,
            annotation: None,
            default_voice: None,
            characters,
            cast: Vec::new(),
            lines: Vec::new(),
            scenes: Vec::new(),
        }
    }

    fn dialogue(sender: &str, text: &str) -> Line {
        Line {
            kind: LineKind::Dialogue,
            sender: Some(sender.to_string()),
            text: Some(text.to_string()),
            adaptation: None,
            adaptation_only: false,
            annotation: None,
            image: None,
            avatar: None,
        }
    }

    #[test]
    fn stage_lines_render_italicized_with_default_glyph() {
        let line = Line {
            kind: LineKind::Stage,
            sender: None,
            text: Some("Enter GHOST.".to_string()),
            adaptation: None,
            adaptation_only: false,
            annotation: None,
            image: None,
            avatar: None,
        };
        assert_eq!(
            format_line(&play(), &line, false).as_deref(),
            Some("📍 *Stage*\n_Enter GHOST._")
        );
    }

    #[test]
    fn dialogue_uses_character_avatar_from_the_table() {
        let line = dialogue("HAMLET", "To be, or not to be.");
        assert_eq!(
            format_line(&play(), &line, false).as_deref(),
            Some("🖤 *HAMLET*\nTo be, or not to be.")
        );
    }

    #[test]
    fn dialogue_falls_back_to_default_avatar() {
        let line = dialogue("OSRIC", "A hit, a very palpable hit.");
        assert_eq!(
            format_line(&play(), &line, false).as_deref(),
            Some("🎭 *OSRIC*\nA hit, a very palpable hit.")
        );
    }

    #[test]
    fn unrenderable_line_fails_closed() {
        let line = Line {
            kind: LineKind::Dialogue,
            sender: Some("HAMLET".to_string()),
            text: Some("   ".to_string()),
            adaptation: None,
            adaptation_only: false,
            annotation: None,
            image: None,
            avatar: None,
        };
        assert_eq!(format_line(&play(), &line, false), None);
    }

    #[test]
    fn adaptation_mode_renders_the_adapted_text() {
        let mut line = dialogue("HAMLET", "To be, or not to be.");
        line.adaptation = Some("Should I exist, or not?".to_string());
        assert_eq!(
            format_line(&play(), &line, true).as_deref(),
            Some("🖤 *HAMLET*\nShould I exist, or not?")
        );
    }
}
