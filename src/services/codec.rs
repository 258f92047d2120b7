// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Pure mappings between internal task categories and the marks planbridge
//! leaves on remote Google objects.
//!
//! Three signals identify our objects on the remote side:
//! - the event color id (written on every pushed event),
//! - a title glyph prefix (emoji today; a bracketed letter form predates it
//!   and must still be recognized on read),
//! - a delimited tag in a remote task's notes carrying the internal task id.
//!
//! When color and glyph disagree, color wins.

use crate::models::Category;

/// Fixed category <-> Google Calendar color table.
const COLOR_TABLE: [(Category, &str); 4] = [
    (Category::Focus, "9"),
    (Category::Meeting, "11"),
    (Category::Admin, "5"),
    (Category::Break, "10"),
];

/// Emoji glyphs, the current write form.
const EMOJI_TABLE: [(Category, &str); 4] = [
    (Category::Focus, "🎯"),
    (Category::Meeting, "🤝"),
    (Category::Admin, "📋"),
    (Category::Break, "☕"),
];

/// Bracketed glyphs written by older clients; read-only.
const BRACKET_TABLE: [(Category, &str); 4] = [
    (Category::Focus, "[F]"),
    (Category::Meeting, "[M]"),
    (Category::Admin, "[A]"),
    (Category::Break, "[B]"),
];

/// Notes-tag delimiters: `[pb-task:<internal id>]`.
const TAG_PREFIX: &str = "[pb-task:";
const TAG_SUFFIX: &str = "]";

/// Calendar color id for a category.
pub fn category_to_color(category: Category) -> &'static str {
    COLOR_TABLE
        .iter()
        .find(|(c, _)| *c == category)
        .map(|(_, color)| *color)
        .unwrap_or("9")
}

/// Category for a calendar color id, if it is one of ours.
pub fn color_to_category(color_id: &str) -> Option<Category> {
    COLOR_TABLE
        .iter()
        .find(|(_, color)| *color == color_id)
        .map(|(c, _)| *c)
}

/// Title prefix written on pushed objects (emoji form).
pub fn category_to_glyph(category: Category) -> String {
    let emoji = EMOJI_TABLE
        .iter()
        .find(|(c, _)| *c == category)
        .map(|(_, e)| *e)
        .unwrap_or("🎯");
    format!("{} ", emoji)
}

/// Detect a category from a title's leading glyph. Recognizes both the
/// emoji form and the legacy bracketed form.
pub fn glyph_to_category(title: &str) -> Option<Category> {
    let trimmed = title.trim_start();
    for (category, emoji) in EMOJI_TABLE {
        if trimmed.starts_with(emoji) {
            return Some(category);
        }
    }
    for (category, bracket) in BRACKET_TABLE {
        if trimmed.starts_with(bracket) {
            return Some(category);
        }
    }
    None
}

/// Remove a recognized leading glyph for display.
pub fn strip_glyph(title: &str) -> &str {
    let trimmed = title.trim_start();
    for (_, emoji) in EMOJI_TABLE {
        if let Some(rest) = trimmed.strip_prefix(emoji) {
            return rest.trim_start();
        }
    }
    for (_, bracket) in BRACKET_TABLE {
        if let Some(rest) = trimmed.strip_prefix(bracket) {
            return rest.trim_start();
        }
    }
    title
}

/// Build the notes content marking a remote task as ours, preserving any
/// user-visible notes above the tag.
pub fn embed_internal_id(internal_id: &str, notes: Option<&str>) -> String {
    let tag = format!("{}{}{}", TAG_PREFIX, internal_id, TAG_SUFFIX);
    match notes {
        Some(body) if !body.is_empty() => format!("{}\n\n{}", body, tag),
        _ => tag,
    }
}

/// Extract the internal task id from a remote task's notes. Anything without
/// a well-formed tag is treated as externally authored.
pub fn extract_internal_id(notes: &str) -> Option<&str> {
    let start = notes.find(TAG_PREFIX)? + TAG_PREFIX.len();
    let rest = &notes[start..];
    let end = rest.find(TAG_SUFFIX)?;
    let id = &rest[..end];
    if id.is_empty() {
        return None;
    }
    Some(id)
}

/// Classify by color first, falling back to glyph. Color is the newer, more
/// reliable signal and wins on disagreement.
pub fn classify(color_id: Option<&str>, title: &str) -> Option<Category> {
    color_id
        .and_then(color_to_category)
        .or_else(|| glyph_to_category(title))
}
