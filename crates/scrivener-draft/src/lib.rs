//! The Markdown draft model: section delimiter comments, merging a
//! reviewer's revision back into a draft, placeholder detection, review
//! guidance parsing, heading numbering, and table-of-contents insertion.

mod headings;
mod sections;

pub use headings::{insert_table_of_contents, number_markdown_headings, slugify_heading, TITLE_PAGE_END, TITLE_PAGE_START};
pub use sections::{extract_sections, find_placeholder_sections, merge_revised_markdown, parse_review_guidance};
