use std::collections::{BTreeMap, BTreeSet};

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static SECTION_START_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<!-- SECTION:(?P<id>[^:]+):START -->").expect("valid regex"));

/// Extract every `<!-- SECTION:id:START -->…<!-- SECTION:id:END -->` span,
/// keyed by id, including the delimiter comments themselves. A start
/// marker with no matching end marker is skipped (the section is
/// considered not yet closed, e.g. a draft still being streamed).
#[must_use]
pub fn extract_sections(text: &str) -> BTreeMap<String, String> {
    let mut sections = BTreeMap::new();
    for capture in SECTION_START_RE.captures_iter(text) {
        let whole = capture.get(0).expect("group 0 always matches");
        let id = &capture["id"];
        let end_marker = format!("<!-- SECTION:{id}:END -->");
        let Some(end_idx) = text[whole.end()..].find(&end_marker) else {
            continue;
        };
        let end = whole.end() + end_idx + end_marker.len();
        sections.insert(id.to_string(), text[whole.start()..end].to_string());
    }
    sections
}

fn section_inner(section_text: &str, id: &str) -> String {
    section_text
        .replace(&format!("<!-- SECTION:{id}:START -->"), "")
        .replace(&format!("<!-- SECTION:{id}:END -->"), "")
        .trim()
        .to_string()
}

/// Merge a revised draft back into the original, section by section.
///
/// A blank `revised` leaves `original` untouched. If `revised` has no
/// section markers at all, it's returned verbatim (the reviewer rewrote
/// the whole document rather than per-section). If `original` has no
/// section markers either, there's nothing to merge into, so `revised` is
/// again returned verbatim. Otherwise, every revised section whose inner
/// content is non-empty and doesn't say "content unchanged" replaces its
/// counterpart in `original` by direct substring replacement — stable
/// because section ids are unique, so each original segment appears once.
#[must_use]
pub fn merge_revised_markdown(original: &str, revised: &str) -> String {
    if revised.trim().is_empty() {
        return original.to_string();
    }
    let revised_sections = extract_sections(revised);
    if revised_sections.is_empty() {
        return revised.to_string();
    }
    let original_sections = extract_sections(original);
    if original_sections.is_empty() {
        return revised.to_string();
    }

    let mut updated = original.to_string();
    for (id, section_text) in &revised_sections {
        let Some(original_section) = original_sections.get(id) else {
            continue;
        };
        let inner = section_inner(section_text, id);
        if inner.is_empty() || inner.to_lowercase().contains("content unchanged") {
            continue;
        }
        updated = updated.replace(original_section.as_str(), section_text);
    }
    updated
}

/// Section ids whose content is a placeholder: either still says "content
/// unchanged" (the reviewer declined to touch it) or literally contains
/// the word "placeholder" (the writer left a stub).
#[must_use]
pub fn find_placeholder_sections(markdown: &str) -> BTreeSet<String> {
    let mut placeholders = BTreeSet::new();
    for (id, section_text) in extract_sections(markdown) {
        let inner = section_inner(&section_text, &id).to_lowercase();
        if inner.contains("content unchanged") || inner.contains("placeholder") {
            placeholders.insert(id);
        }
    }
    placeholders
}

/// Parse free-form review guidance (a JSON blob, or plain text) into a
/// flattened guidance string plus the set of section ids it calls out.
///
/// Any `section_id` key at any nesting depth contributes to the section
/// set rather than the text; every other scalar value is flattened into
/// a line of the guidance text in encounter order.
#[must_use]
pub fn parse_review_guidance(raw: &str) -> (String, BTreeSet<String>) {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return (String::new(), BTreeSet::new());
    }

    let parsed: Value = serde_json::from_str(trimmed).unwrap_or_else(|_| Value::String(trimmed.to_string()));

    let mut lines = Vec::new();
    let mut sections = BTreeSet::new();
    collect_guidance(None, &parsed, &mut lines, &mut sections);

    let guidance_text = lines.join("\n").trim().to_string();
    if guidance_text.is_empty() {
        (serde_json::to_string(&parsed).unwrap_or_default(), sections)
    } else {
        (guidance_text, sections)
    }
}

fn collect_guidance(key: Option<&str>, value: &Value, lines: &mut Vec<String>, sections: &mut BTreeSet<String>) {
    match value {
        Value::String(s) => {
            if key == Some("section_id") {
                sections.insert(s.clone());
            } else {
                lines.push(s.clone());
            }
        }
        Value::Number(n) => {
            if key == Some("section_id") {
                sections.insert(n.to_string());
            } else {
                lines.push(n.to_string());
            }
        }
        Value::Bool(_) | Value::Null => {}
        Value::Object(map) => {
            for (k, v) in map {
                collect_guidance(Some(k), v, lines, sections);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_guidance(key.or(Some("item")), item, lines, sections);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORIGINAL: &str = "intro\n<!-- SECTION:s1:START -->\nold body\n<!-- SECTION:s1:END -->\noutro";
    const REVISED: &str = "intro\n<!-- SECTION:s1:START -->\nnew body\n<!-- SECTION:s1:END -->\noutro";

    #[test]
    fn merge_replaces_revised_section_content() {
        let merged = merge_revised_markdown(ORIGINAL, REVISED);
        assert!(merged.contains("new body"));
        assert!(!merged.contains("old body"));
    }

    #[test]
    fn merge_skips_content_unchanged_sentinel() {
        let revised = "intro\n<!-- SECTION:s1:START -->\ncontent unchanged\n<!-- SECTION:s1:END -->\noutro";
        let merged = merge_revised_markdown(ORIGINAL, revised);
        assert!(merged.contains("old body"));
    }

    #[test]
    fn blank_revised_returns_original_unchanged() {
        assert_eq!(merge_revised_markdown(ORIGINAL, "   "), ORIGINAL);
    }

    #[test]
    fn revised_without_markers_is_returned_verbatim() {
        let revised = "a plain rewrite with no section markers";
        assert_eq!(merge_revised_markdown(ORIGINAL, revised), revised);
    }

    #[test]
    fn original_without_markers_falls_back_to_revised_verbatim() {
        let original = "plain text, no sections";
        assert_eq!(merge_revised_markdown(original, REVISED), REVISED);
    }

    #[test]
    fn find_placeholder_sections_flags_unchanged_and_placeholder_markers() {
        let markdown = "\
<!-- SECTION:a:START -->\ncontent unchanged\n<!-- SECTION:a:END -->\n\
<!-- SECTION:b:START -->\nTODO placeholder text\n<!-- SECTION:b:END -->\n\
<!-- SECTION:c:START -->\nreal content\n<!-- SECTION:c:END -->";
        let placeholders = find_placeholder_sections(markdown);
        assert_eq!(placeholders, BTreeSet::from(["a".to_string(), "b".to_string()]));
    }

    #[test]
    fn parse_review_guidance_extracts_section_ids_and_flattens_text() {
        let raw = r#"{"section_id": "s1", "issue": "missing citation", "nested": {"note": "tighten prose"}}"#;
        let (text, sections) = parse_review_guidance(raw);
        assert_eq!(sections, BTreeSet::from(["s1".to_string()]));
        assert!(text.contains("missing citation"));
        assert!(text.contains("tighten prose"));
    }

    #[test]
    fn parse_review_guidance_handles_plain_text() {
        let (text, sections) = parse_review_guidance("just tighten the prose");
        assert_eq!(text, "just tighten the prose");
        assert!(sections.is_empty());
    }
}
