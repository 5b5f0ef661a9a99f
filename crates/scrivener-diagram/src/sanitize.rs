use once_cell::sync::Lazy;
use regex::Regex;

static FENCE_LINE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^[ \t]*```.*$\n?").expect("valid regex"));
static DIAGRAM_ID_LINE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?im)^[ \t]*(?:'|//|#)[ \t]*diagram_id[ \t]*:[ \t]*[A-Za-z0-9_.\-]+[ \t]*\n?").expect("valid regex"));


/// Strip stray markdown fences and `diagram_id` comment lines, normalize
/// line endings to `\n`, and ensure the body starts with `@startuml` and
/// ends with `@enduml`, inserting/appending them if absent.
#[must_use]
pub fn sanitize_body(raw: &str) -> String {
    let normalized = raw.replace("\r\n", "\n").replace('\r', "\n");
    let without_fences = FENCE_LINE_RE.replace_all(&normalized, "");
    let without_id_comment = DIAGRAM_ID_LINE_RE.replace_all(&without_fences, "");
    let trimmed = without_id_comment.trim();

    let mut body = trimmed.to_string();
    if !body.to_ascii_lowercase().starts_with("@startuml") {
        body = format!("@startuml\n{body}");
    }
    if !body.to_ascii_lowercase().trim_end().ends_with("@enduml") {
        body = format!("{}\n@enduml", body.trim_end());
    }
    body
}

/// Validate a sanitized body per §4.11: must start with `@startuml`, end
/// with `@enduml`, contain no leftover Markdown fence, no Mermaid source
/// (`@startmermaid` or a fenced `` ```mermaid `` block), and be non-empty.
/// Returns the list of violated invariants, empty when valid.
#[must_use]
pub fn validate_body(body: &str) -> Vec<String> {
    let mut issues = Vec::new();
    let trimmed = body.trim();

    if trimmed.is_empty() {
        issues.push("diagram body is empty after sanitization".to_string());
        return issues;
    }
    let lower = trimmed.to_ascii_lowercase();
    if !lower.starts_with("@startuml") {
        issues.push("diagram body does not start with @startuml".to_string());
    }
    if !lower.ends_with("@enduml") {
        issues.push("diagram body does not end with @enduml".to_string());
    }
    if trimmed.contains("```") {
        issues.push("diagram body contains a Markdown fence".to_string());
    }
    if lower.contains("@startmermaid") || lower.contains("```mermaid") {
        issues.push("diagram body contains Mermaid instead of PlantUML".to_string());
    }
    issues
}
