//! Bridges the review sub-scheduler's persisted per-agent artifacts —
//! `review.json`/`style.json`/`cohesion.json`, each an object keyed by
//! section id (see [`scrivener_review::merge_batch_result`]) — to the
//! flattened guidance text and section-id sets the `verify` and
//! `rewrite` stages consume. This shape is distinct from the verifier's
//! raw result, which already matches [`scrivener_draft::parse_review_guidance`]'s
//! "array of objects, optionally carrying `section_id`" schema directly.

use std::collections::BTreeSet;

use serde_json::Value;

/// Parse one agent's combined artifact into a flattened guidance string
/// and the set of section ids that have any issue, suggestion, or
/// summary text recorded against them.
#[must_use]
pub fn guidance_from_accumulated(raw: &str) -> (String, BTreeSet<String>) {
    let Ok(parsed) = serde_json::from_str::<Value>(raw) else {
        return (String::new(), BTreeSet::new());
    };
    let mut sections = BTreeSet::new();
    let mut lines = Vec::new();

    if let Some(Value::Object(section_map)) = parsed.get("sections") {
        for (id, entry) in section_map {
            let mut touched = false;
            for key in ["issues", "suggestions"] {
                if let Some(items) = entry.get(key).and_then(Value::as_array) {
                    for item in items {
                        if let Some(text) = item.as_str() {
                            lines.push(format!("{id}: {text}"));
                            touched = true;
                        }
                    }
                }
            }
            if let Some(summary) = entry.get("summary").and_then(Value::as_str) {
                if !summary.trim().is_empty() {
                    lines.push(format!("{id}: {summary}"));
                    touched = true;
                }
            }
            if touched {
                sections.insert(id.clone());
            }
        }
    }

    (lines.join("\n"), sections)
}

/// Parse the verifier's raw `{"contradictions": [...]}` result into
/// whether any contradiction was reported, the section ids it names, and
/// flattened guidance text describing them.
#[must_use]
pub fn contradiction_sections_and_text(raw: &str) -> (bool, BTreeSet<String>, String) {
    let has_contradictions = serde_json::from_str::<Value>(raw)
        .ok()
        .and_then(|v| v.get("contradictions").and_then(Value::as_array).map(|a| !a.is_empty()))
        .unwrap_or(false);
    let (text, sections) = scrivener_draft::parse_review_guidance(raw);
    (has_contradictions, sections, text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_touched_sections_and_flattens_issue_text() {
        let raw = r#"{"sections": {"s1": {"issues": ["tighten intro"], "suggestions": []}, "s2": {}}}"#;
        let (text, sections) = guidance_from_accumulated(raw);
        assert_eq!(sections, BTreeSet::from(["s1".to_string()]));
        assert!(text.contains("s1: tighten intro"));
    }

    #[test]
    fn malformed_json_yields_empty_guidance() {
        let (text, sections) = guidance_from_accumulated("not json");
        assert!(text.is_empty());
        assert!(sections.is_empty());
    }

    #[test]
    fn contradiction_text_reports_whether_any_were_found() {
        let raw = r#"{"contradictions": [{"section_id": "s1", "issue": "dates disagree"}]}"#;
        let (has, sections, text) = contradiction_sections_and_text(raw);
        assert!(has);
        assert_eq!(sections, BTreeSet::from(["s1".to_string()]));
        assert!(text.contains("dates disagree"));
    }

    #[test]
    fn empty_contradictions_array_reports_false() {
        let (has, sections, _) = contradiction_sections_and_text(r#"{"contradictions": []}"#);
        assert!(!has);
        assert!(sections.is_empty());
    }
}
