use crate::telegram::BotCommandSpec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BotCommand {
    Start,
    Help,
    Plays,
    Cast,
    Scenes,
    Adaptation,
    Audio,
}

#[derive(Debug, Clone, Copy)]
struct CommandDef {
    command: BotCommand,
    patterns: &'static [&'static str],
    description: &'static str,
}

const COMMAND_DEFS: &[CommandDef] = &[
    CommandDef {
        command: BotCommand::Start,
        patterns: &["/start"],
        description: "Choose a play",
    },
    CommandDef {
        command: BotCommand::Help,
        patterns: &["/help"],
        description: "How the bot works",
    },
    CommandDef {
        command: BotCommand::Plays,
        patterns: &["/plays"],
        description: "List available plays",
    },
    CommandDef {
        command: BotCommand::Cast,
        patterns: &["/cast"],
        description: "Cast of the current play",
    },
    CommandDef {
        command: BotCommand::Scenes,
        patterns: &["/scenes"],
        description: "Jump to an act or scene",
    },
    CommandDef {
        command: BotCommand::Adaptation,
        patterns: &["/adaptation"],
        description: "Toggle the adapted text",
    },
    CommandDef {
        command: BotCommand::Audio,
        patterns: &["/audio"],
        description: "Toggle audio narration",
    },
];

pub(crate) fn telegram_command_specs() -> Vec<BotCommandSpec<'static>> {
    COMMAND_DEFS
        .iter()
        .map(|def| BotCommandSpec {
            command: def.patterns[0].trim_start_matches('/'),
            description: def.description,
        })
        .collect()
}

pub(crate) fn parse_command(text: &str) -> Option<BotCommand> {
    let trimmed = text.trim();

    COMMAND_DEFS.iter().find_map(|def| {
        def.patterns
            .iter()
            .any(|pattern| command_matches(trimmed, pattern))
            .then_some(def.command)
    })
}

fn command_matches(trimmed_text: &str, command: &str) -> bool {
    if trimmed_text == command {
        return true;
    }

    trimmed_text
        .strip_prefix(command)
        .is_some_and(|stripped| stripped.starts_with('@'))
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::{BotCommand, command_matches, parse_command, telegram_command_specs};

    #[test]
    fn parses_known_commands() {
        assert_eq!(parse_command("/start"), Some(BotCommand::Start));
        assert_eq!(parse_command(" /plays "), Some(BotCommand::Plays));
        assert_eq!(
            parse_command("/adaptation@playbill_bot"),
            Some(BotCommand::Adaptation)
        );
        assert_eq!(parse_command("/audio"), Some(BotCommand::Audio));
    }

    #[test]
    fn rejects_non_commands() {
        assert_eq!(parse_command("hello"), None);
        assert_eq!(parse_command("/start over"), None);
        assert_eq!(parse_command("/castle"), None);
    }

    #[test]
    fn command_matcher_accepts_bot_mentions_only() {
        assert!(command_matches("/scenes", "/scenes"));
        assert!(command_matches("/scenes@playbill_bot", "/scenes"));
        assert!(!command_matches("/scenes now", "/scenes"));
    }

    #[test]
    fn telegram_command_specs_are_unique_and_non_empty() {
        let specs = telegram_command_specs();
        assert!(!specs.is_empty());

        let mut names = HashSet::new();
        for spec in specs {
            assert!(!spec.command.trim().is_empty());
            assert!(!spec.description.trim().is_empty());
            assert!(names.insert(spec.command));
        }
    }
}
