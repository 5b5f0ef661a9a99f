use once_cell::sync::Lazy;
use regex::Regex;

static HEADING_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(?P<hashes>#{1,6})\s+(?P<text>.+?)\s*$").expect("valid regex"));
static HEADING_NUMBER_PREFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+(\.\d+)*\.?\s+").expect("valid regex"));
static CODE_FENCE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*```").expect("valid regex"));
static SLUG_INVALID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9\- ]").expect("valid regex"));
static SLUG_SEP_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\s\-]+").expect("valid regex"));

/// Delimiter comments bracketing the title page block, skipped by both
/// heading numbering and TOC insertion. Public so callers that build the
/// title page (the `write` stage, on a fresh draft) can bracket it with
/// the same markers.
pub const TITLE_PAGE_START: &str = "<!-- TITLE_PAGE_START -->";
pub const TITLE_PAGE_END: &str = "<!-- TITLE_PAGE_END -->";
const TOC_START: &str = "<!-- TOC:START -->";
const TOC_END: &str = "<!-- TOC:END -->";

struct HeadingLine {
    level: usize,
    text: String,
}

fn parse_heading(line: &str) -> Option<HeadingLine> {
    let captures = HEADING_RE.captures(line)?;
    let level = captures["hashes"].len();
    let text = captures["text"].to_string();
    Some(HeadingLine { level, text })
}

/// Number every heading outside code fences and the title-page block, in
/// place, with a per-level counter (`1`, `1.1`, `1.2`, `2`, …). Any
/// existing numbering prefix on a heading is stripped before renumbering,
/// so the function is idempotent across repeated calls.
#[must_use]
pub fn number_markdown_headings(markdown: &str) -> String {
    let mut counters = [0u32; 6];
    let mut in_code_fence = false;
    let mut in_title_page = false;
    let ends_with_newline = markdown.ends_with('\n');

    let mut lines: Vec<String> = Vec::new();
    for line in markdown.lines() {
        if CODE_FENCE_RE.is_match(line) {
            in_code_fence = !in_code_fence;
            lines.push(line.to_string());
            continue;
        }
        if in_code_fence {
            lines.push(line.to_string());
            continue;
        }
        if line.trim() == TITLE_PAGE_START {
            in_title_page = true;
            lines.push(line.to_string());
            continue;
        }
        if line.trim() == TITLE_PAGE_END {
            in_title_page = false;
            lines.push(line.to_string());
            continue;
        }
        if in_title_page {
            lines.push(line.to_string());
            continue;
        }

        if let Some(heading) = parse_heading(line) {
            let level = heading.level;
            counters[level - 1] += 1;
            for counter in counters.iter_mut().skip(level) {
                *counter = 0;
            }
            for counter in counters.iter_mut().take(level - 1) {
                if *counter == 0 {
                    *counter = 1;
                }
            }
            let number = counters[..level]
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(".");
            let stripped_text = HEADING_NUMBER_PREFIX_RE.replace(&heading.text, "").to_string();
            let hashes = "#".repeat(level);
            lines.push(format!("{hashes} {number} {stripped_text}"));
        } else {
            lines.push(line.to_string());
        }
    }

    let mut result = lines.join("\n");
    if ends_with_newline {
        result.push('\n');
    }
    result
}

/// Slugify a heading's text for use as a Markdown anchor: strip anything
/// outside `[a-z0-9 -]`, lowercase, collapse runs of whitespace/hyphens
/// into a single hyphen, trim leading/trailing hyphens. Falls back to
/// `"section"` when nothing survives (e.g. an emoji-only heading).
#[must_use]
pub fn slugify_heading(text: &str) -> String {
    let lowered = text.to_lowercase();
    let cleaned = SLUG_INVALID_RE.replace_all(&lowered, "");
    let slug = SLUG_SEP_RE.replace_all(cleaned.trim(), "-").trim_matches('-').to_string();
    if slug.is_empty() {
        "section".to_string()
    } else {
        slug
    }
}

/// Build and insert a table of contents listing every heading outside
/// code fences and the title-page block. H2 headings sit at the TOC's top
/// level; each level below H2 gets two additional spaces of indent (H1
/// headings, typically just the document title, are excluded from the
/// listing itself but still consume numbering). The TOC is inserted
/// immediately after the title-page block if one exists, otherwise
/// prepended to the document. A document with no eligible headings is
/// returned unchanged.
#[must_use]
pub fn insert_table_of_contents(markdown: &str) -> String {
    let mut in_code_fence = false;
    let mut in_title_page = false;
    let mut entries = Vec::new();

    for line in markdown.lines() {
        if CODE_FENCE_RE.is_match(line) {
            in_code_fence = !in_code_fence;
            continue;
        }
        if in_code_fence {
            continue;
        }
        if line.trim() == TITLE_PAGE_START {
            in_title_page = true;
            continue;
        }
        if line.trim() == TITLE_PAGE_END {
            in_title_page = false;
            continue;
        }
        if in_title_page {
            continue;
        }
        if let Some(heading) = parse_heading(line) {
            if heading.level < 2 {
                continue;
            }
            let display_text = HEADING_NUMBER_PREFIX_RE.replace(&heading.text, "").to_string();
            let slug = slugify_heading(&display_text);
            entries.push((heading.level, display_text, slug));
        }
    }

    if entries.is_empty() {
        return markdown.to_string();
    }

    let mut toc = String::new();
    toc.push_str(TOC_START);
    toc.push('\n');
    toc.push_str("## Table of Contents\n\n");
    for (level, text, slug) in &entries {
        let indent = "  ".repeat(level.saturating_sub(2));
        toc.push_str(&format!("{indent}- [{text}](#{slug})\n"));
    }
    toc.push_str(TOC_END);
    toc.push('\n');

    if let Some(end_idx) = markdown.find(TITLE_PAGE_END) {
        let insert_at = end_idx + TITLE_PAGE_END.len();
        let mut result = markdown[..insert_at].to_string();
        result.push('\n');
        result.push_str(&toc);
        result.push_str(&markdown[insert_at..]);
        result
    } else {
        format!("{toc}\n{markdown}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_nested_headings_with_per_level_counters() {
        let markdown = "# Title\n\n## Intro\n\n### Background\n\n## Methods\n";
        let numbered = number_markdown_headings(markdown);
        assert!(numbered.contains("# 1 Title"));
        assert!(numbered.contains("## 1.1 Intro"));
        assert!(numbered.contains("### 1.1.1 Background"));
        assert!(numbered.contains("## 1.2 Methods"));
    }

    #[test]
    fn renumbering_is_idempotent() {
        let markdown = "# Title\n\n## Intro\n";
        let once = number_markdown_headings(markdown);
        let twice = number_markdown_headings(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn skips_headings_inside_code_fences() {
        let markdown = "# Title\n\n```\n# not a heading\n```\n\n## Real Section\n";
        let numbered = number_markdown_headings(markdown);
        assert!(numbered.contains("# not a heading"));
        assert!(numbered.contains("## 1.1 Real Section"));
    }

    #[test]
    fn skips_headings_inside_title_page_block() {
        let markdown = "<!-- TITLE_PAGE_START -->\n# Doc Title\n<!-- TITLE_PAGE_END -->\n\n## First Section\n";
        let numbered = number_markdown_headings(markdown);
        assert!(numbered.contains("# Doc Title"));
        assert!(numbered.contains("## 1.1 First Section"));
    }

    #[test]
    fn slugify_strips_invalid_characters_and_lowercases() {
        assert_eq!(slugify_heading("Hello, World! 2.0"), "hello-world-20");
        assert_eq!(slugify_heading("!!!"), "section");
    }

    #[test]
    fn inserts_toc_after_title_page_block() {
        let markdown = "<!-- TITLE_PAGE_START -->\n# Doc\n<!-- TITLE_PAGE_END -->\n\n## Intro\n\n### Details\n";
        let with_toc = insert_table_of_contents(markdown);
        let toc_pos = with_toc.find(TOC_START).unwrap();
        let title_end_pos = with_toc.find(TITLE_PAGE_END).unwrap();
        assert!(toc_pos > title_end_pos);
        assert!(with_toc.contains("[Intro](#intro)"));
        assert!(with_toc.contains("  - [Details](#details)"));
    }

    #[test]
    fn prepends_toc_when_no_title_page_block() {
        let markdown = "## Intro\n";
        let with_toc = insert_table_of_contents(markdown);
        assert!(with_toc.starts_with(TOC_START));
    }

    #[test]
    fn document_with_no_headings_is_returned_unchanged() {
        let markdown = "just a paragraph, no headings here";
        assert_eq!(insert_table_of_contents(markdown), markdown);
    }
}
