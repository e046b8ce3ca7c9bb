use crate::document::{DocumentSurface, TextSegment};

/// Terms the adhd profile emphasizes. Matched case-insensitively as
/// whole words.
pub const KEYWORDS: [&str; 7] = [
    "important",
    "note",
    "warning",
    "attention",
    "focus",
    "key",
    "critical",
];

/// Wrap every keyword occurrence in a highlight marker. One-shot:
/// there is no reverse pass, and running it again re-wraps the text
/// inside existing markers.
pub fn apply_keyword_highlighting(document: &mut dyn DocumentSurface) {
    document.rewrite_text_nodes(&segment_keywords);
}

/// Split `text` into plain and highlighted runs. Returns `None` when no
/// keyword matches, so untouched nodes stay untouched.
pub fn segment_keywords(text: &str) -> Option<Vec<TextSegment>> {
    let lowered = text.to_ascii_lowercase();
    let mut ranges: Vec<(usize, usize)> = Vec::new();

    for keyword in KEYWORDS {
        for (start, _) in lowered.match_indices(keyword) {
            let end = start + keyword.len();
            if is_word_bounded(&lowered, start, end) {
                ranges.push((start, end));
            }
        }
    }

    if ranges.is_empty() {
        return None;
    }
    ranges.sort_unstable();

    let mut segments = Vec::new();
    let mut cursor = 0;
    for (start, end) in ranges {
        // Whole-word matches of distinct keywords cannot overlap.
        if start > cursor {
            segments.push(TextSegment::plain(&text[cursor..start]));
        }
        segments.push(TextSegment::highlighted(&text[start..end]));
        cursor = end;
    }
    if cursor < text.len() {
        segments.push(TextSegment::plain(&text[cursor..]));
    }

    Some(segments)
}

fn is_word_bounded(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].chars().next_back();
    let after = text[end..].chars().next();
    !before.is_some_and(is_word_char) && !after.is_some_and(is_word_char)
}

fn is_word_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_'
}
