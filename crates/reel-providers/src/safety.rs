//! Prompt hygiene: meta-text stripping, sanitization, softening.
//!
//! All transforms are deterministic and idempotent so retries and
//! re-invocations never compound their edits.

use std::sync::OnceLock;

use regex::Regex;

/// Fixed header prepended to every image prompt.
pub const SAFE_PROMPT_HEADER: &str =
    "wholesome, family-friendly, safe-for-work, suitable for all ages";

/// Suffix appended by softening, exactly once.
pub const WHOLESOME_SUFFIX: &str =
    "wholesome, gentle, bright daylight, cinematic, family friendly";

/// Model self-reference and apology phrases stripped from LLM output.
const META_PATTERNS: [&str; 8] = [
    r"(?i)\bas an ai(?: language model)?[,:]?\s*",
    r"(?i)\bas a language model[,:]?\s*",
    r"(?i)\bi(?:'m| am)(?: just)? an ai[^.!?\n]*[.!?]?\s*",
    r"(?i)\bi apologi[sz]e[^.!?\n]*[.!?]?\s*",
    r"(?i)\bi(?:'m| am) sorry[^.!?\n]*[.!?]?\s*",
    r"(?im)^(?:sure|certainly|of course|absolutely)[,!.]?\s+",
    r"(?im)^here(?:'s| is)[^:\n]*:\s*",
    r"(?i)\bi hope this helps[^.!?\n]*[.!?]?\s*",
];

/// Tokens that trip image-provider safety filters.
const BANNED_TOKENS: [&str; 36] = [
    "blood", "bloody", "gore", "gory", "gun", "guns", "knife", "knives", "weapon", "weapons",
    "kill", "killing", "murder", "dead", "death", "corpse", "war", "battle", "violence", "violent",
    "naked", "nude", "nudity", "sexy", "seductive", "lingerie", "drug", "drugs", "terror",
    "terrorist", "hostage", "explosion", "bomb", "torture", "abuse", "hostile",
];

/// Adjectives that keep tripping filters even after the nouns are gone.
const EDGY_ADJECTIVES: [&str; 10] = [
    "dark", "sinister", "grim", "creepy", "scary", "disturbing", "menacing", "horrifying",
    "brutal", "gritty",
];

fn meta_regexes() -> &'static Vec<Regex> {
    static REGEXES: OnceLock<Vec<Regex>> = OnceLock::new();
    REGEXES.get_or_init(|| {
        META_PATTERNS
            .iter()
            .map(|p| Regex::new(p).expect("valid meta pattern"))
            .collect()
    })
}

fn banned_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        let pattern = format!(
            r"(?i)\b(?:{}|{})\b",
            BANNED_TOKENS.join("|"),
            EDGY_ADJECTIVES.join("|")
        );
        Regex::new(&pattern).expect("valid banned-token pattern")
    })
}

/// Remove model-self-reference phrases and apologetic meta-text.
///
/// Idempotent: stripping an already-clean script returns it unchanged.
pub fn strip_meta(text: &str) -> String {
    let mut out = text.to_string();
    for regex in meta_regexes() {
        out = regex.replace_all(&out, "").into_owned();
    }
    tidy_whitespace(&out)
}

/// Prepend the fixed safe-for-work header, once.
pub fn sanitize_prompt(prompt: &str) -> String {
    if prompt
        .trim_start()
        .to_lowercase()
        .starts_with(SAFE_PROMPT_HEADER)
    {
        return prompt.to_string();
    }
    format!("{}, {}", SAFE_PROMPT_HEADER, prompt.trim())
}

/// Remove banned-or-edgy tokens and append the wholesome suffix once.
///
/// Returns the input unchanged iff nothing was removed and the suffix is
/// already present, which makes the transform idempotent.
pub fn soften_prompt(prompt: &str) -> String {
    let cleaned = tidy_whitespace(&banned_regex().replace_all(prompt, ""));

    let has_suffix = cleaned.to_lowercase().contains(WHOLESOME_SUFFIX);
    if cleaned == prompt && has_suffix {
        return prompt.to_string();
    }

    if has_suffix {
        cleaned
    } else {
        let base = cleaned.trim_end_matches([' ', ',', '.']);
        if base.is_empty() {
            WHOLESOME_SUFFIX.to_string()
        } else {
            format!("{}, {}", base, WHOLESOME_SUFFIX)
        }
    }
}

/// Recognize policy-rejection variants in provider error text.
pub fn is_content_policy_violation(message: &str) -> bool {
    let lower = message.to_lowercase();
    [
        "content policy",
        "content_policy",
        "safety system",
        "safety filter",
        "safety guidelines",
        "nsfw",
        "moderation",
        "invalid prompt",
        "rejected as a result",
        "flagged",
    ]
    .iter()
    .any(|marker| lower.contains(marker))
}

/// Collapse doubled separators left behind by phrase removal.
fn tidy_whitespace(text: &str) -> String {
    static SPACES: OnceLock<Regex> = OnceLock::new();
    static COMMA_RUNS: OnceLock<Regex> = OnceLock::new();
    static SPACE_BEFORE_PUNCT: OnceLock<Regex> = OnceLock::new();

    let spaces = SPACES.get_or_init(|| Regex::new(r"[ \t]{2,}").unwrap());
    let comma_runs = COMMA_RUNS.get_or_init(|| Regex::new(r"(?:\s*,){2,}").unwrap());
    let space_before = SPACE_BEFORE_PUNCT.get_or_init(|| Regex::new(r"\s+([,.!?])").unwrap());

    let out = spaces.replace_all(text, " ");
    let out = comma_runs.replace_all(&out, ",");
    let out = space_before.replace_all(&out, "$1");
    out.trim()
        .trim_start_matches([',', ' '])
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_meta_removes_self_reference() {
        let input = "Sure, here's your script:\nHOOK: A cat stares at the sea.";
        let stripped = strip_meta(input);
        assert!(stripped.starts_with("HOOK:"));
        assert!(!stripped.to_lowercase().contains("here's"));
    }

    #[test]
    fn test_strip_meta_idempotent() {
        let input = "As an AI language model, I cannot surf. HOOK: A cat can.";
        let once = strip_meta(input);
        assert_eq!(strip_meta(&once), once);
    }

    #[test]
    fn test_strip_meta_preserves_clean_text() {
        let clean = "HOOK: A cat learns to surf.\nBODY: It rides a wave.\nCTA: Follow!";
        assert_eq!(strip_meta(clean), clean);
    }

    #[test]
    fn test_sanitize_prepends_header_once() {
        let sanitized = sanitize_prompt("a cat on a surfboard");
        assert!(sanitized.starts_with(SAFE_PROMPT_HEADER));
        assert_eq!(sanitize_prompt(&sanitized), sanitized);
    }

    #[test]
    fn test_soften_removes_banned_tokens() {
        let softened = soften_prompt("a dark pirate with a bloody knife");
        let lower = softened.to_lowercase();
        assert!(!lower.contains("bloody"));
        assert!(!lower.contains("knife"));
        assert!(!lower.contains("dark"));
        assert!(lower.contains(WHOLESOME_SUFFIX));
    }

    #[test]
    fn test_soften_idempotent() {
        let once = soften_prompt("a gritty war scene with guns");
        assert_eq!(soften_prompt(&once), once);
    }

    #[test]
    fn test_soften_changes_iff_tokens_changed() {
        // Clean prompt without the suffix gains it (tokens added)
        let clean = "a cat on a sunny beach";
        let softened = soften_prompt(clean);
        assert_ne!(softened, clean);

        // Already-softened prompt is returned unchanged
        assert_eq!(soften_prompt(&softened), softened);
    }

    #[test]
    fn test_policy_violation_classifier() {
        assert!(is_content_policy_violation(
            "Your request was rejected as a result of our safety system."
        ));
        assert!(is_content_policy_violation("Prompt flagged by moderation"));
        assert!(!is_content_policy_violation("connection reset by peer"));
    }
}
