use scrivener_draft::extract_sections;

/// Replace section `id`'s content in `draft` with `new_body`, keeping its
/// `SECTION:id:START/END` marker comments. If `draft` has no such section
/// yet (the writer never produced it, e.g. it was dropped as a
/// placeholder), the new section is appended at the end instead.
#[must_use]
pub fn splice_section(draft: &str, id: &str, new_body: &str) -> String {
    let start = format!("<!-- SECTION:{id}:START -->");
    let end = format!("<!-- SECTION:{id}:END -->");
    let replacement = format!("{start}\n{}\n{end}", new_body.trim());

    let sections = extract_sections(draft);
    match sections.get(id) {
        Some(existing) => draft.replacen(existing.as_str(), &replacement, 1),
        None => format!("{}\n\n{replacement}\n", draft.trim_end()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splice_replaces_an_existing_section_in_place() {
        let draft = "<!-- SECTION:s1:START -->\nold text\n<!-- SECTION:s1:END -->\n<!-- SECTION:s2:START -->\nkeep\n<!-- SECTION:s2:END -->";
        let spliced = splice_section(draft, "s1", "new text");
        assert!(spliced.contains("<!-- SECTION:s1:START -->\nnew text\n<!-- SECTION:s1:END -->"));
        assert!(spliced.contains("keep"));
    }

    #[test]
    fn splice_appends_a_missing_section_at_the_end() {
        let draft = "<!-- SECTION:s1:START -->\nbody\n<!-- SECTION:s1:END -->";
        let spliced = splice_section(draft, "s2", "fresh body");
        assert!(spliced.ends_with("<!-- SECTION:s2:START -->\nfresh body\n<!-- SECTION:s2:END -->\n"));
    }
}
