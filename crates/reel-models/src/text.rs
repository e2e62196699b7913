//! Overlay text helpers.

/// Hard cap on overlay text length, in characters.
pub const MAX_OVERLAY_CHARS: usize = 60;

/// Overlay text used when nothing else can be produced.
pub const FALLBACK_OVERLAY_TEXT: &str = "Video clip";

const ELLIPSIS: &str = "...";

/// Truncate text to at most `max_chars` characters, marking the cut with
/// an ellipsis. Counts characters, not bytes.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let ellipsis_len = ELLIPSIS.chars().count();
    if max_chars <= ellipsis_len {
        return text.chars().take(max_chars).collect();
    }

    let head: String = text.chars().take(max_chars - ellipsis_len).collect();
    format!("{}{}", head.trim_end(), ELLIPSIS)
}

/// Truncate text to the overlay cap.
pub fn truncate_overlay(text: &str) -> String {
    truncate_chars(text, MAX_OVERLAY_CHARS)
}

/// Join the first `count` whitespace-separated tokens of `text`.
pub fn first_words(text: &str, count: usize) -> String {
    text.split_whitespace()
        .take(count)
        .collect::<Vec<_>>()
        .join(" ")
}
