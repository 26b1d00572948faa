//! In-memory play documents: ordered lines, characters, scenes, cast.
//!
//! Plays are loaded once at startup from a directory of JSON documents and
//! are read-only afterwards.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;
use serde::Deserialize;
use tracing::info;

/// Word count assumed for a line whose text cannot be resolved, so pacing
/// math never divides against an empty line.
pub const DEFAULT_WORD_COUNT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineKind {
    Stage,
    Dialogue,
}

/// One atomic unit of content: a piece of dialogue or a stage direction.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Line {
    #[serde(rename = "type")]
    pub kind: LineKind,
    #[serde(default)]
    pub sender: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    /// Alternate phrasing shown in adaptation mode.
    #[serde(default)]
    pub adaptation: Option<String>,
    /// Line exists only in the adaptation variant.
    #[serde(default)]
    pub adaptation_only: bool,
    #[serde(default)]
    pub annotation: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
}

impl Line {
    /// Whether the line should be shown under the given adaptation mode.
    pub fn visible_in(&self, adaptation: bool) -> bool {
        if adaptation {
            self.adaptation_only || self.adaptation.is_some()
        } else {
            !self.adaptation_only
        }
    }

    /// Resolves the text to render under the given adaptation mode.
    ///
    /// Adaptation mode prefers adaptation text with primary text as the
    /// fallback; original mode is the reverse. Whitespace-only text resolves
    /// to `None` so callers never render an empty bubble.
    pub fn resolved_text(&self, adaptation: bool) -> Option<&str> {
        let (preferred, fallback) = if adaptation {
            (self.adaptation.as_deref(), self.text.as_deref())
        } else {
            (self.text.as_deref(), self.adaptation.as_deref())
        };
        preferred
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .or_else(|| fallback.map(str::trim).filter(|text| !text.is_empty()))
    }

    /// Word count of the resolved text, defaulting when nothing resolves.
    pub fn word_count(&self, adaptation: bool) -> usize {
        self.resolved_text(adaptation)
            .map(|text| text.split_whitespace().count())
            .filter(|count| *count > 0)
            .unwrap_or(DEFAULT_WORD_COUNT)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Character {
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub voice: Option<String>,
}

/// An act/scene boundary detected in the stage directions.
#[derive(Debug, Clone)]
pub struct Scene {
    pub label: String,
    pub line_index: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Play {
    /// Derived from the document's file stem, not the document itself.
    #[serde(skip)]
    pub id: String,
    pub title: String,
    pub author: String,
    #[serde(default)]
    pub emoji: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Annotation attached to the intro/description screen.
    #[serde(default)]
    pub annotation: Option<String>,
    /// Voice used for dialogue when a character has none assigned.
    #[serde(default)]
    pub default_voice: Option<String>,
    #[serde(default)]
    pub characters: HashMap<String, Character>,
    #[serde(default)]
    pub cast: Vec<String>,
    #[serde(default)]
    pub lines: Vec<Line>,
    #[serde(skip)]
    pub scenes: Vec<Scene>,
}

impl Play {
    pub fn line(&self, index: usize) -> Option<&Line> {
        self.lines.get(index)
    }

    /// First visible line index at or after `from`, or `lines.len()` when
    /// none remains. The past-end sentinel is the sole "play finished"
    /// signal.
    pub fn next_visible_line(&self, from: usize, adaptation: bool) -> usize {
        let mut index = from;
        while index < self.lines.len() {
            if self.lines[index].visible_in(adaptation) {
                return index;
            }
            index += 1;
        }
        self.lines.len()
    }

    /// Whether any line carries adaptation content at all.
    pub fn has_adaptation(&self) -> bool {
        self.lines
            .iter()
            .any(|line| line.adaptation.is_some() || line.adaptation_only)
    }

    pub fn character(&self, name: &str) -> Option<&Character> {
        self.characters.get(name)
    }
}

static SCENE_HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(act|scene|prologue|epilogue)\b").expect("scene heading pattern")
});

const MAX_SCENE_LABEL_LEN: usize = 48;

/// Scans stage directions for act/scene headings and records their positions.
fn index_scenes(lines: &[Line]) -> Vec<Scene> {
    lines
        .iter()
        .enumerate()
        .filter(|(_, line)| line.kind == LineKind::Stage)
        .filter_map(|(index, line)| {
            let text = line.text.as_deref()?.trim();
            if !SCENE_HEADING.is_match(text) {
                return None;
            }
            Some(Scene {
                label: scene_label(text),
                line_index: index,
            })
        })
        .collect()
}

fn scene_label(text: &str) -> String {
    let first_line = text.lines().next().unwrap_or(text).trim();
    if first_line.chars().count() <= MAX_SCENE_LABEL_LEN {
        return first_line.to_string();
    }
    let truncated: String = first_line.chars().take(MAX_SCENE_LABEL_LEN).collect();
    format!("{}…", truncated.trim_end())
}

/// Loads every `*.json` play document in `dir`. Performed once at startup;
/// a malformed document fails the load with the offending path in context.
pub fn load_all(dir: &Path) -> Result<HashMap<String, Play>> {
    let mut plays = HashMap::new();
    if !dir.exists() {
        info!(dir = %dir.display(), "plays directory does not exist; no plays loaded");
        return Ok(plays);
    }

    let entries = fs::read_dir(dir)
        .with_context(|| format!("Failed to read plays directory {}", dir.display()))?;
    for entry in entries {
        let entry = entry
            .with_context(|| format!("Failed to read plays directory {}", dir.display()))?;
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
            continue;
        }
        let Some(id) = path.file_stem().and_then(|stem| stem.to_str()) else {
            continue;
        };

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read play from {}", path.display()))?;
        let mut play: Play = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse play from {}", path.display()))?;
        play.id = id.to_string();
        play.scenes = index_scenes(&play.lines);
        info!(id = %play.id, title = %play.title, lines = play.lines.len(), "loaded play");
        plays.insert(play.id.clone(), play);
    }

    info!(count = plays.len(), "plays loaded");
    Ok(plays)
}

#[cfg(test)]
mod tests {
    use super::{DEFAULT_WORD_COUNT, Line, LineKind, Play, load_all};

    fn line(kind: LineKind, text: Option<&str>) -> Line {
        Line {
            kind,
            sender: None,
            text: text.map(str::to_string),
            adaptation: None,
            adaptation_only: false,
            annotation: None,
            image: None,
            avatar: None,
        }
    }

    fn play_with_lines(lines: Vec<Line>) -> Play {
        Play {
            id: "test".to_string(),
            title: "Test".to_string(),
            author: "Nobody".to_string(),
            emoji: None,
            image: None,
            description: None,
            annotation: None,
            default_voice: None,
            characters: std::collections::HashMap::new(),
            cast: Vec::new(),
            lines,
            scenes: Vec::new(),
        }
    }

    #[test]
    fn adaptation_only_lines_are_hidden_in_original_mode() {
        let mut hidden = line(LineKind::Dialogue, None);
        hidden.adaptation = Some("modern phrasing".to_string());
        hidden.adaptation_only = true;

        assert!(!hidden.visible_in(false));
        assert!(hidden.visible_in(true));
    }

    #[test]
    fn plain_lines_are_hidden_in_adaptation_mode() {
        let plain = line(LineKind::Dialogue, Some("original only"));
        assert!(plain.visible_in(false));
        assert!(!plain.visible_in(true));
    }

    #[test]
    fn next_visible_line_returns_sentinel_past_end() {
        let play = play_with_lines(vec![
            line(LineKind::Stage, Some("Enter GHOST.")),
            line(LineKind::Dialogue, Some("Who's there?")),
        ]);

        assert_eq!(play.next_visible_line(0, false), 0);
        assert_eq!(play.next_visible_line(1, false), 1);
        assert_eq!(play.next_visible_line(2, false), 2);
        assert_eq!(play.next_visible_line(99, false), 2);
    }

    #[test]
    fn next_visible_line_is_idempotent() {
        let mut extra = line(LineKind::Dialogue, None);
        extra.adaptation = Some("aside".to_string());
        extra.adaptation_only = true;
        let play = play_with_lines(vec![
            line(LineKind::Dialogue, Some("one")),
            extra,
            line(LineKind::Dialogue, Some("two")),
        ]);

        let first = play.next_visible_line(1, false);
        assert_eq!(first, play.next_visible_line(1, false));
        assert_eq!(first, 2);
    }

    #[test]
    fn resolved_text_prefers_mode_then_falls_back() {
        let mut both = line(LineKind::Dialogue, Some("thee"));
        both.adaptation = Some("you".to_string());

        assert_eq!(both.resolved_text(false), Some("thee"));
        assert_eq!(both.resolved_text(true), Some("you"));

        let only_adaptation = Line {
            text: None,
            ..both.clone()
        };
        assert_eq!(only_adaptation.resolved_text(false), Some("you"));

        let empty = line(LineKind::Dialogue, Some("   "));
        assert_eq!(empty.resolved_text(false), None);
    }

    #[test]
    fn word_count_defaults_when_unresolvable() {
        let blank = line(LineKind::Stage, None);
        assert_eq!(blank.word_count(false), DEFAULT_WORD_COUNT);

        let spoken = line(LineKind::Dialogue, Some("to be or not to be"));
        assert_eq!(spoken.word_count(false), 6);
    }

    #[test]
    fn scene_index_matches_stage_headings_only() {
        let play_lines = vec![
            line(LineKind::Stage, Some("ACT I, Scene 1. Elsinore.")),
            line(LineKind::Dialogue, Some("Act naturally, please.")),
            line(LineKind::Stage, Some("Enter HAMLET.")),
            line(LineKind::Stage, Some("Scene 2. A room of state.")),
        ];
        let scenes = super::index_scenes(&play_lines);
        assert_eq!(scenes.len(), 2);
        assert_eq!(scenes[0].line_index, 0);
        assert_eq!(scenes[0].label, "ACT I, Scene 1. Elsinore.");
        assert_eq!(scenes[1].line_index, 3);
    }

    #[test]
    fn load_all_reads_documents_and_derives_ids() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(
            dir.path().join("hamlet.json"),
            r#"{
                "title": "Hamlet",
                "author": "William Shakespeare",
                "lines": [
                    {"type": "stage", "text": "ACT I. Elsinore."},
                    {"type": "dialogue", "sender": "BERNARDO", "text": "Who's there?",
                     "adaptation": "Who goes there?", "annotation": "The opening challenge."}
                ]
            }"#,
        )
        .expect("write");
        std::fs::write(dir.path().join("notes.txt"), "ignored").expect("write");

        let plays = load_all(dir.path()).expect("load");
        assert_eq!(plays.len(), 1);
        let play = &plays["hamlet"];
        assert_eq!(play.id, "hamlet");
        assert_eq!(play.lines.len(), 2);
        assert_eq!(play.scenes.len(), 1);
        assert!(play.has_adaptation());
    }

    #[test]
    fn load_all_rejects_malformed_documents() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("broken.json"), "{").expect("write");
        assert!(load_all(dir.path()).is_err());
    }
}
