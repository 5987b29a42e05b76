//! Text clean-up applied to payload fields before they reach the template.
//!
//! Generated text tends to arrive with markdown decoration, numbered headings
//! and repeated section titles. Everything here is pure string work.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
    static ref MD_HEADING: Regex = Regex::new(r"(?m)^[ \t]{0,3}#{1,6}[ \t]+").unwrap();
    static ref MD_BOLD_STARS: Regex = Regex::new(r"\*\*(.+?)\*\*").unwrap();
    static ref MD_BOLD_UNDERSCORES: Regex = Regex::new(r"__(.+?)__").unwrap();
    static ref MD_BULLET: Regex = Regex::new(r"(?m)^[ \t]*[*-][ \t]+").unwrap();
    static ref MD_QUOTE: Regex = Regex::new(r"(?m)^[ \t]*>[ \t]+").unwrap();
    static ref INLINE_SPACES: Regex = Regex::new(r"[ \t]+").unwrap();
    static ref CHAPTER_LABEL: Regex =
        Regex::new(r"(?i)^(глава|раздел)\s*[0-9]+(\.[0-9]+)*\s*[.)-]?\s*").unwrap();
    static ref NUMERIC_PREFIX: Regex = Regex::new(r"^[0-9]+(\.[0-9]+)*\s*[.)-]?\s*").unwrap();
    static ref TRAILING_PERIOD: Regex = Regex::new(r"\.\s*$").unwrap();
    static ref COMPARE_MARKERS: Regex = Regex::new(r"[#!*_`]").unwrap();
    static ref COMPARE_PUNCT: Regex = Regex::new(r"[^\p{L}\p{N}\s]").unwrap();
    static ref LEADING_NUMBER: Regex =
        Regex::new(r"^\s*(?:#{1,6}\s*)?([0-9]+(?:\.[0-9]+)+|[0-9]+)(?-u:\b)").unwrap();
}

fn unify_newlines(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

/// Collapses every whitespace run (newlines included) to one space and trims.
pub fn normalize_single_line(value: &str) -> String {
    WHITESPACE.replace_all(value, " ").trim().to_string()
}

/// Removes heading markers, bold/underline emphasis, bullets and blockquote
/// markers. Paragraph breaks survive; trailing whitespace on each line does not.
pub fn strip_markdown_artifacts(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let normalized = unify_newlines(text);
    let stripped = MD_HEADING.replace_all(&normalized, "");
    let stripped = MD_BOLD_STARS.replace_all(&stripped, "$1");
    let stripped = MD_BOLD_UNDERSCORES.replace_all(&stripped, "$1");
    let stripped = stripped.replace("**", "").replace("__", "");
    let stripped = MD_BULLET.replace_all(&stripped, "");
    let stripped = MD_QUOTE.replace_all(&stripped, "");

    stripped
        .split('\n')
        .map(|line| INLINE_SPACES.replace_all(line, " ").trim_end().to_string())
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// "Глава 1. Основы" -> "Основы"; "2.1) Итоги." -> "Итоги".
pub fn normalize_chapter_title(title: &str) -> String {
    let normalized = normalize_single_line(title);
    let without_label = CHAPTER_LABEL.replace(&normalized, "");
    let without_number = NUMERIC_PREFIX.replace(&without_label, "");
    TRAILING_PERIOD
        .replace(&without_number, "")
        .trim()
        .to_string()
}

pub fn normalize_section_title(title: &str) -> String {
    let normalized = normalize_single_line(title);
    let without_number = NUMERIC_PREFIX.replace(&normalized, "");
    TRAILING_PERIOD
        .replace(&without_number, "")
        .trim()
        .to_string()
}

/// Comparison key for headings. Only used to decide equality, never stored.
pub fn normalize_heading_for_compare(value: &str) -> String {
    let lowered = value.to_lowercase();
    let unmarked = COMPARE_MARKERS.replace_all(&lowered, "");
    let without_label = CHAPTER_LABEL.replace(&unmarked, "");
    let without_number = NUMERIC_PREFIX.replace(&without_label, "");
    let letters_only = COMPARE_PUNCT.replace_all(&without_number, " ");
    normalize_single_line(&letters_only)
}

fn leading_number_id(value: &str) -> Option<&str> {
    LEADING_NUMBER
        .captures(value)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Drops the first non-blank line of `text` when it repeats the section
/// heading: a markdown heading, the same title after normalization, or the
/// same leading number (`1.2`). One blank line after it goes too.
pub fn strip_duplicate_leading_heading(text: &str, expected_title: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let normalized = unify_newlines(text);
    let mut lines: Vec<&str> = normalized.split('\n').collect();
    let Some(first) = lines.iter().position(|line| !line.trim().is_empty()) else {
        return normalized.trim().to_string();
    };

    let first_line = lines[first];
    let first_trimmed = first_line.trim();
    let is_markdown_heading = MD_HEADING.is_match(first_line);

    let expected_key = normalize_heading_for_compare(expected_title);
    let line_key = normalize_heading_for_compare(first_trimmed);
    let same_title = !line_key.is_empty() && !expected_key.is_empty() && line_key == expected_key;
    let same_number = match (leading_number_id(first_trimmed), leading_number_id(expected_title)) {
        (Some(line_id), Some(expected_id)) => line_id == expected_id && !line_key.is_empty(),
        _ => false,
    };

    if is_markdown_heading || same_title || same_number {
        lines.remove(first);
        if lines.get(first).is_some_and(|line| line.trim().is_empty()) {
            lines.remove(first);
        }
    }

    lines.join("\n").trim().to_string()
}
