//! Caption synthesis and conversion.
//!
//! Captions are generated from narration text with duration-weighted
//! timing: each sentence gets a share of the audio duration proportional
//! to its length. Exact ASR alignment is out of scope; this is
//! deterministic and close enough for sub-minute clips.

use std::fmt::Write as _;

/// Shortest cue a viewer can read.
pub const MIN_CUE_SECONDS: f64 = 1.2;
/// Maximum characters per caption line.
pub const MAX_LINE_CHARS: usize = 42;
/// Maximum lines per cue.
pub const MAX_LINES: usize = 2;

/// Build SRT content from narration text and the probed audio duration.
///
/// Sentences are split on `.`, `!`, `?` in order; each cue starts where
/// the previous ended; the last cue is extended to exactly the total
/// duration. Sentences that do not fit two 42-character lines are re-split
/// at the middle word boundary.
pub fn build_captions(narration: &str, total_duration: f64) -> String {
    let chunks = caption_chunks(narration);
    if chunks.is_empty() || total_duration <= 0.0 {
        return String::new();
    }

    let total_chars: usize = chunks.iter().map(|c| c.chars().count()).sum();
    let mut out = String::new();
    let mut cursor = 0.0_f64;

    for (i, chunk) in chunks.iter().enumerate() {
        let share = total_duration * chunk.chars().count() as f64 / total_chars as f64;
        let start = cursor;
        let mut end = start + share.max(MIN_CUE_SECONDS);
        if i == chunks.len() - 1 && total_duration > start {
            end = total_duration;
        }
        cursor = end;

        let lines = wrap_lines(chunk, MAX_LINE_CHARS);
        let _ = write!(
            out,
            "{}\n{} --> {}\n{}\n\n",
            i + 1,
            format_timestamp(start),
            format_timestamp(end),
            lines.join("\n")
        );
    }

    out
}

/// SRT timestamp: `HH:MM:SS,mmm`.
pub fn format_timestamp(seconds: f64) -> String {
    let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let ms = total_ms % 1000;
    let total_secs = total_ms / 1000;
    let h = total_secs / 3600;
    let m = (total_secs % 3600) / 60;
    let s = total_secs % 60;
    format!("{:02}:{:02}:{:02},{:03}", h, m, s, ms)
}

/// Sentences expanded until every piece wraps into at most two lines.
fn caption_chunks(narration: &str) -> Vec<String> {
    split_sentences(narration)
        .into_iter()
        .flat_map(|s| chunk_sentence(s))
        .collect()
}

/// Split on sentence terminators, preserving order and the terminator.
fn split_sentences(text: &str) -> Vec<String> {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut sentences = Vec::new();
    let mut current = String::new();

    for ch in flat.chars() {
        current.push(ch);
        if matches!(ch, '.' | '!' | '?') {
            let trimmed = current.trim();
            if trimmed.chars().any(|c| c.is_alphanumeric()) {
                sentences.push(trimmed.to_string());
            }
            current.clear();
        }
    }
    let tail = current.trim();
    if tail.chars().any(|c| c.is_alphanumeric()) {
        sentences.push(tail.to_string());
    }
    sentences
}

/// Re-split a sentence at the middle word boundary until it fits the cue.
fn chunk_sentence(sentence: String) -> Vec<String> {
    if wrap_lines(&sentence, MAX_LINE_CHARS).len() <= MAX_LINES {
        return vec![sentence];
    }
    match split_middle(&sentence) {
        Some((left, right)) => {
            let mut chunks = chunk_sentence(left);
            chunks.extend(chunk_sentence(right));
            chunks
        }
        None => vec![sentence],
    }
}

/// Greedy word wrap to `width` characters per line.
fn wrap_lines(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if current.is_empty() {
            current = word.to_string();
        } else if current.chars().count() + 1 + word.chars().count() <= width {
            current.push(' ');
            current.push_str(word);
        } else {
            lines.push(std::mem::take(&mut current));
            current = word.to_string();
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Split at the word boundary nearest the character midpoint.
fn split_middle(text: &str) -> Option<(String, String)> {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() < 2 {
        return None;
    }

    let total: usize = words.iter().map(|w| w.chars().count()).sum::<usize>() + words.len() - 1;
    let half = total / 2;

    let mut best_split = 1;
    let mut best_distance = usize::MAX;
    let mut prefix_len = 0usize;
    for (i, word) in words.iter().enumerate().take(words.len() - 1) {
        prefix_len += word.chars().count() + if i > 0 { 1 } else { 0 };
        let distance = prefix_len.abs_diff(half);
        if distance < best_distance {
            best_distance = distance;
            best_split = i + 1;
        }
    }

    Some((
        words[..best_split].join(" "),
        words[best_split..].join(" "),
    ))
}

/// Check whether caption content is WebVTT rather than SRT.
pub fn is_webvtt(content: &str) -> bool {
    content
        .trim_start_matches('\u{feff}')
        .trim_start()
        .starts_with("WEBVTT")
}

/// Convert WebVTT content to SRT: strip the header, turn `HH:MM:SS.mmm`
/// into `HH:MM:SS,mmm`, drop cue settings, and re-number cues from 1.
pub fn vtt_to_srt(vtt: &str) -> String {
    let content = vtt.trim_start_matches('\u{feff}');
    let mut out = String::new();
    let mut cue_number = 0u32;

    for block in content.split("\n\n") {
        let lines: Vec<&str> = block
            .lines()
            .map(|l| l.trim_end_matches('\r'))
            .filter(|l| !l.trim().is_empty())
            .collect();
        if lines.is_empty() {
            continue;
        }
        let first = lines[0].trim_start();
        if first.starts_with("WEBVTT")
            || first.starts_with("NOTE")
            || first.starts_with("STYLE")
            || first.starts_with("REGION")
        {
            continue;
        }

        let Some(timing_idx) = lines.iter().position(|l| l.contains("-->")) else {
            continue;
        };
        let Some((start_raw, end_raw)) = lines[timing_idx].split_once("-->") else {
            continue;
        };
        let text_lines = &lines[timing_idx + 1..];
        if text_lines.is_empty() {
            continue;
        }

        cue_number += 1;
        let _ = write!(
            out,
            "{}\n{} --> {}\n{}\n\n",
            cue_number,
            vtt_timestamp_to_srt(start_raw),
            vtt_timestamp_to_srt(end_raw),
            text_lines.join("\n")
        );
    }

    out
}

/// Convert one WebVTT timestamp, dropping trailing cue settings.
fn vtt_timestamp_to_srt(raw: &str) -> String {
    let token = raw.trim().split_whitespace().next().unwrap_or("");
    let mut ts = token.replace('.', ",");

    // Short form MM:SS,mmm gains the hour field
    if ts.chars().filter(|c| *c == ':').count() == 1 {
        ts = format!("00:{}", ts);
    }
    if !ts.contains(',') {
        ts.push_str(",000");
    }
    ts
}
