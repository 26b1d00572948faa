//! Typed callback payloads.
//!
//! Button presses carry a compact `kind:play:index` string; it is decoded
//! exactly once here, at the router boundary, into a closed set of actions.

/// What an annotation request points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AnnotationTarget {
    /// The play's intro/description screen.
    Intro,
    Line(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Action {
    /// Open a play from the menu.
    SelectPlay { play_id: String },
    /// Advance to the line at (or after) the embedded index.
    Advance { play_id: String, line_index: usize },
    ShowAnnotation {
        play_id: String,
        target: AnnotationTarget,
    },
    /// Cycle the delivery mode; carries the next line index for re-arming.
    CycleMode { play_id: String, next_index: usize },
    /// Jump to a scene boundary.
    SceneJump { play_id: String, line_index: usize },
    /// The terminal control on the last line.
    Finish,
}

const INTRO_TARGET: &str = "intro";

impl Action {
    pub(crate) fn encode(&self) -> String {
        match self {
            Self::SelectPlay { play_id } => format!("select:{play_id}"),
            Self::Advance {
                play_id,
                line_index,
            } => format!("next:{play_id}:{line_index}"),
            Self::ShowAnnotation { play_id, target } => match target {
                AnnotationTarget::Intro => format!("annotate:{play_id}:{INTRO_TARGET}"),
                AnnotationTarget::Line(index) => format!("annotate:{play_id}:{index}"),
            },
            Self::CycleMode {
                play_id,
                next_index,
            } => format!("mode:{play_id}:{next_index}"),
            Self::SceneJump {
                play_id,
                line_index,
            } => format!("scene:{play_id}:{line_index}"),
            Self::Finish => "fin".to_string(),
        }
    }

    pub(crate) fn parse(data: &str) -> Option<Self> {
        if data == "fin" {
            return Some(Self::Finish);
        }

        let (kind, rest) = data.split_once(':')?;
        match kind {
            "select" if !rest.is_empty() => Some(Self::SelectPlay {
                play_id: rest.to_string(),
            }),
            "next" => {
                let (play_id, line_index) = split_indexed(rest)?;
                Some(Self::Advance {
                    play_id,
                    line_index,
                })
            }
            "annotate" => {
                let (play_id, target) = rest.rsplit_once(':')?;
                if play_id.is_empty() {
                    return None;
                }
                let target = if target == INTRO_TARGET {
                    AnnotationTarget::Intro
                } else {
                    AnnotationTarget::Line(target.parse().ok()?)
                };
                Some(Self::ShowAnnotation {
                    play_id: play_id.to_string(),
                    target,
                })
            }
            "mode" => {
                let (play_id, next_index) = split_indexed(rest)?;
                Some(Self::CycleMode {
                    play_id,
                    next_index,
                })
            }
            "scene" => {
                let (play_id, line_index) = split_indexed(rest)?;
                Some(Self::SceneJump {
                    play_id,
                    line_index,
                })
            }
            _ => None,
        }
    }
}

fn split_indexed(rest: &str) -> Option<(String, usize)> {
    let (play_id, index) = rest.rsplit_once(':')?;
    if play_id.is_empty() {
        return None;
    }
    Some((play_id.to_string(), index.parse().ok()?))
}

#[cfg(test)]
mod tests {
    use super::{Action, AnnotationTarget};

    #[test]
    fn round_trips_every_action_kind() {
        let actions = [
            Action::SelectPlay {
                play_id: "hamlet".to_string(),
            },
            Action::Advance {
                play_id: "hamlet".to_string(),
                line_index: 12,
            },
            Action::ShowAnnotation {
                play_id: "hamlet".to_string(),
                target: AnnotationTarget::Line(3),
            },
            Action::ShowAnnotation {
                play_id: "hamlet".to_string(),
                target: AnnotationTarget::Intro,
            },
            Action::CycleMode {
                play_id: "hamlet".to_string(),
                next_index: 5,
            },
            Action::SceneJump {
                play_id: "hamlet".to_string(),
                line_index: 40,
            },
            Action::Finish,
        ];

        for action in actions {
            assert_eq!(Action::parse(&action.encode()), Some(action));
        }
    }

    #[test]
    fn rejects_malformed_payloads() {
        for data in [
            "",
            "unknown:hamlet:1",
            "next:hamlet",
            "next:hamlet:one",
            "next::3",
            "select:",
            "annotate:hamlet",
            "mode:hamlet:",
            "finish",
        ] {
            assert_eq!(Action::parse(data), None, "{data:?}");
        }
    }
}
