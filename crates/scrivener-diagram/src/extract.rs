use once_cell::sync::Lazy;
use regex::Regex;

static FENCED_PLANTUML_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)```[ \t]*plantuml[ \t]*\r?\n(?P<body>.*?)```").expect("valid regex"));
static STRAY_STARTUML_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)@startuml.*?@enduml").expect("valid regex"));
static DIAGRAM_ID_COMMENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?im)^[ \t]*(?:'|//|#)[ \t]*diagram_id[ \t]*:[ \t]*([A-Za-z0-9_.\-]+)").expect("valid regex"));

/// One PlantUML region found in a draft: its raw text (fence included,
/// for fenced blocks) and whichever `diagram_id` comment it carried, if
/// any.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedDiagram {
    pub raw_block: String,
    pub body: String,
    pub id_hint: Option<String>,
}

/// Parse the `' diagram_id: X` / `// diagram_id: X` / `# diagram_id: X`
/// comment out of a block's raw text, if present.
#[must_use]
pub fn parse_id_hint(raw_block: &str) -> Option<String> {
    DIAGRAM_ID_COMMENT_RE.captures(raw_block).map(|c| c[1].to_string())
}

/// Extract every fenced `plantuml` block, plus any stray
/// `@startuml...@enduml` region not already covered by a fenced match,
/// in document order.
#[must_use]
pub fn extract_diagrams(draft: &str) -> Vec<ExtractedDiagram> {
    let mut spans: Vec<(usize, usize)> = Vec::new();
    let mut found: Vec<(usize, ExtractedDiagram)> = Vec::new();

    for m in FENCED_PLANTUML_RE.captures_iter(draft) {
        let whole = m.get(0).expect("group 0 always matches");
        spans.push((whole.start(), whole.end()));
        let body = m.name("body").map(|b| b.as_str()).unwrap_or_default();
        found.push((
            whole.start(),
            ExtractedDiagram {
                raw_block: whole.as_str().to_string(),
                id_hint: parse_id_hint(whole.as_str()),
                body: body.to_string(),
            },
        ));
    }

    for m in STRAY_STARTUML_RE.find_iter(draft) {
        let overlaps = spans.iter().any(|(s, e)| m.start() < *e && *s < m.end());
        if overlaps {
            continue;
        }
        found.push((
            m.start(),
            ExtractedDiagram {
                raw_block: m.as_str().to_string(),
                id_hint: parse_id_hint(m.as_str()),
                body: m.as_str().to_string(),
            },
        ));
    }

    found.sort_by_key(|(start, _)| *start);
    found.into_iter().map(|(_, diagram)| diagram).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_fenced_plantuml_block_and_its_id_comment() {
        let draft = "text\n```plantuml\n' diagram_id: flow1\n@startuml\nAlice -> Bob\n@enduml\n```\nmore text";
        let diagrams = extract_diagrams(draft);
        assert_eq!(diagrams.len(), 1);
        assert_eq!(diagrams[0].id_hint.as_deref(), Some("flow1"));
        assert!(diagrams[0].body.contains("Alice -> Bob"));
    }

    #[test]
    fn stray_startuml_block_is_captured_when_not_fenced() {
        let draft = "prose\n@startuml\nA -> B\n@enduml\nmore prose";
        let diagrams = extract_diagrams(draft);
        assert_eq!(diagrams.len(), 1);
    }

    #[test]
    fn fenced_block_is_not_double_counted_as_a_stray_region() {
        let draft = "```plantuml\n@startuml\nA -> B\n@enduml\n```";
        let diagrams = extract_diagrams(draft);
        assert_eq!(diagrams.len(), 1);
    }

    #[test]
    fn multiple_blocks_are_returned_in_document_order() {
        let draft = "```plantuml\n' diagram_id: a\n@startuml\nX\n@enduml\n```\ntext\n```plantuml\n' diagram_id: b\n@startuml\nY\n@enduml\n```";
        let diagrams = extract_diagrams(draft);
        assert_eq!(diagrams.len(), 2);
        assert_eq!(diagrams[0].id_hint.as_deref(), Some("a"));
        assert_eq!(diagrams[1].id_hint.as_deref(), Some("b"));
    }

    #[test]
    fn stray_region_before_a_fenced_block_sorts_first() {
        let draft = "@startuml\n' diagram_id: early\nX\n@enduml\ntext\n```plantuml\n' diagram_id: late\n@startuml\nY\n@enduml\n```";
        let diagrams = extract_diagrams(draft);
        assert_eq!(diagrams.len(), 2);
        assert_eq!(diagrams[0].id_hint.as_deref(), Some("early"));
        assert_eq!(diagrams[1].id_hint.as_deref(), Some("late"));
    }
}
