//! Script sections and parsing.
//!
//! The canonical script carries three labeled sections: `HOOK:`, `BODY:`,
//! `CTA:`. Labels are matched case-insensitively; unlabeled text falls back
//! to blank-line-separated blocks assigned positionally (first block is the
//! hook, last the call to action, anything between is the body).

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Maximum characters per section after clamping.
pub const SECTION_CHAR_LIMIT: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Hook,
    Body,
    Cta,
}

const LABELS: [(&str, Section); 3] = [
    ("hook:", Section::Hook),
    ("body:", Section::Body),
    ("cta:", Section::Cta),
];

/// A parsed script: hook, body, call to action.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub struct ScriptSections {
    pub hook: String,
    pub body: String,
    pub cta: String,
}

impl ScriptSections {
    /// Parse free text into sections.
    ///
    /// Accepts labeled lines in any case with arbitrary surrounding
    /// whitespace; continuation lines attach to the open section. When no
    /// label is present at all, blocks split on blank lines are assigned
    /// positionally.
    pub fn parse(text: &str) -> Self {
        let mut hook: Vec<&str> = Vec::new();
        let mut body: Vec<&str> = Vec::new();
        let mut cta: Vec<&str> = Vec::new();
        let mut current: Option<Section> = None;
        let mut saw_label = false;

        for line in text.lines() {
            if let Some((section, rest)) = match_label(line) {
                saw_label = true;
                current = Some(section);
                if !rest.is_empty() {
                    section_lines(section, &mut hook, &mut body, &mut cta).push(rest);
                }
            } else if let Some(section) = current {
                let trimmed = line.trim();
                if !trimmed.is_empty() {
                    section_lines(section, &mut hook, &mut body, &mut cta).push(trimmed);
                }
            }
        }

        if saw_label {
            return Self {
                hook: hook.join("\n"),
                body: body.join("\n"),
                cta: cta.join("\n"),
            };
        }

        Self::from_blocks(blank_line_blocks(text))
    }

    /// Assign blank-line-separated blocks positionally.
    fn from_blocks(blocks: Vec<String>) -> Self {
        match blocks.len() {
            0 => Self::default(),
            1 => Self {
                hook: blocks.into_iter().next().unwrap(),
                ..Self::default()
            },
            2 => {
                let mut it = blocks.into_iter();
                Self {
                    hook: it.next().unwrap(),
                    body: String::new(),
                    cta: it.next().unwrap(),
                }
            }
            _ => {
                let mut blocks = blocks;
                let cta = blocks.pop().unwrap();
                let hook = blocks.remove(0);
                Self {
                    hook,
                    body: blocks.join("\n\n"),
                    cta,
                }
            }
        }
    }

    /// Canonical labeled form.
    pub fn serialize(&self) -> String {
        format!("HOOK: {}\nBODY: {}\nCTA: {}", self.hook, self.body, self.cta)
    }

    /// Label-free narration for TTS and captions: non-empty sections joined
    /// with blank lines.
    pub fn plain_narration(&self) -> String {
        [&self.hook, &self.body, &self.cta]
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// All three sections present.
    pub fn is_complete(&self) -> bool {
        !self.hook.trim().is_empty() && !self.body.trim().is_empty() && !self.cta.trim().is_empty()
    }

    /// Clamp every section to `max` characters, cutting on a word boundary
    /// with a trailing ellipsis.
    pub fn clamped(&self, max: usize) -> Self {
        Self {
            hook: clamp_section(&self.hook, max),
            body: clamp_section(&self.body, max),
            cta: clamp_section(&self.cta, max),
        }
    }
}

fn section_lines<'a, 'b>(
    section: Section,
    hook: &'b mut Vec<&'a str>,
    body: &'b mut Vec<&'a str>,
    cta: &'b mut Vec<&'a str>,
) -> &'b mut Vec<&'a str> {
    match section {
        Section::Hook => hook,
        Section::Body => body,
        Section::Cta => cta,
    }
}

/// Match a `LABEL:` prefix case-insensitively, returning the remainder.
fn match_label(line: &str) -> Option<(Section, &str)> {
    let trimmed = line.trim_start();
    for (label, section) in LABELS {
        if let Some(prefix) = trimmed.get(..label.len()) {
            if prefix.eq_ignore_ascii_case(label) {
                return Some((section, trimmed[label.len()..].trim()));
            }
        }
    }
    None
}

/// Split text into trimmed, non-empty blocks separated by blank lines.
fn blank_line_blocks(text: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                blocks.push(current.join("\n"));
                current.clear();
            }
        } else {
            current.push(line.trim());
        }
    }
    if !current.is_empty() {
        blocks.push(current.join("\n"));
    }
    blocks
}

/// Clamp to at most `max` characters, cutting at the last word boundary
/// before the limit and appending an ellipsis.
fn clamp_section(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }

    let limit = max.saturating_sub(3);
    let mut cut: String = text.chars().take(limit).collect();
    if let Some(pos) = cut.rfind(char::is_whitespace) {
        cut.truncate(pos);
    }
    let cut = cut.trim_end();
    format!("{}...", cut)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_labeled() {
        let script = ScriptSections::parse(
            "HOOK: A cat stares at the ocean.\nBODY: It grabs a board.\nCTA: Follow for part two!",
        );
        assert_eq!(script.hook, "A cat stares at the ocean.");
        assert_eq!(script.body, "It grabs a board.");
        assert_eq!(script.cta, "Follow for part two!");
        assert!(script.is_complete());
    }

    #[test]
    fn test_parse_case_insensitive_with_whitespace() {
        let script = ScriptSections::parse("  hook:   First.\n\nBody: Second.\n cta:Third.");
        assert_eq!(script.hook, "First.");
        assert_eq!(script.body, "Second.");
        assert_eq!(script.cta, "Third.");
    }

    #[test]
    fn test_parse_continuation_lines() {
        let script = ScriptSections::parse("HOOK: One.\nstill the hook.\nBODY: Two.\nCTA: Three.");
        assert_eq!(script.hook, "One.\nstill the hook.");
    }

    #[test]
    fn test_parse_positional_fallback() {
        let script = ScriptSections::parse("First block.\n\nMiddle one.\nMore middle.\n\nLast block.");
        assert_eq!(script.hook, "First block.");
        assert_eq!(script.body, "Middle one.\nMore middle.");
        assert_eq!(script.cta, "Last block.");

        let two = ScriptSections::parse("Opening.\n\nClosing.");
        assert_eq!(two.hook, "Opening.");
        assert_eq!(two.body, "");
        assert_eq!(two.cta, "Closing.");
    }

    #[test]
    fn test_round_trip_preserves_sections() {
        let original = ScriptSections {
            hook: "A cat learns to surf.".into(),
            body: "It wipes out, then rides a wave.".into(),
            cta: "Follow for more.".into(),
        };
        let reparsed = ScriptSections::parse(&original.serialize());
        assert_eq!(reparsed, original);
    }

    #[test]
    fn test_plain_narration_label_free() {
        let script = ScriptSections::parse("HOOK: One.\nBODY: Two.\nCTA: Three.");
        let narration = script.plain_narration();
        assert_eq!(narration, "One.\n\nTwo.\n\nThree.");
        for label in ["HOOK:", "BODY:", "CTA:"] {
            assert!(!narration.contains(label));
        }
    }

    #[test]
    fn test_plain_narration_omits_empty_sections() {
        let script = ScriptSections {
            hook: "Only hook.".into(),
            body: String::new(),
            cta: "And cta.".into(),
        };
        assert_eq!(script.plain_narration(), "Only hook.\n\nAnd cta.");
    }

    #[test]
    fn test_clamp_on_word_boundary() {
        let long = "word ".repeat(60);
        let clamped = clamp_section(&long, SECTION_CHAR_LIMIT);
        assert!(clamped.chars().count() <= SECTION_CHAR_LIMIT);
        assert!(clamped.ends_with("..."));
        // No mid-word cut: the text before the ellipsis ends a full word
        assert!(clamped.trim_end_matches("...").ends_with("word"));
    }

    #[test]
    fn test_clamp_noop_for_short_text() {
        assert_eq!(clamp_section("short", SECTION_CHAR_LIMIT), "short");
    }
}
