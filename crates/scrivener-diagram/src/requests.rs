use std::collections::HashSet;

use scrivener_types::Plan;
use serde::{Deserialize, Serialize};

use crate::extract::extract_diagrams;
use crate::ids::{assign_diagram_id, slugify};
use crate::sanitize::{sanitize_body, validate_body};

/// A render job for one extracted diagram, targeting its sanitized
/// PlantUML source at `diagrams/<slug>.puml` and the eventual rendered
/// bitmap at `images/<slug>.<fmt>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagramRequest {
    pub diagram_id: String,
    pub source_path: String,
    pub format: String,
    pub blob_path: String,
    pub alt_text: String,
}

/// The outcome of rendering one [`DiagramRequest`]. `blob_path`/
/// `relative_path` are `None` and `error` is set when the render failed
/// after every retry; `finalize` skips substituting such an entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagramResult {
    pub diagram_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blob_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relative_path: Option<String>,
    pub code_block: String,
    pub format: String,
    pub alt_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A diagram extracted, sanitized, validated, and id-assigned, ready to
/// be written to its source path and turned into a [`DiagramRequest`].
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedDiagram {
    pub request: DiagramRequest,
    pub sanitized_body: String,
    pub original_block: String,
}

/// Run the full `diagram_prep` pipeline over a draft: extract, sanitize,
/// validate, and assign ids/paths. Returns every validation issue found
/// (across every block) as `Err` rather than the first one, so an
/// operator sees the whole picture in one `DIAGRAM_FAILED` event; the
/// stage must not enqueue `diagram_render` when this returns `Err`.
pub fn prepare_diagrams(draft: &str, plan: &Plan) -> Result<Vec<PreparedDiagram>, Vec<String>> {
    let extracted = extract_diagrams(draft);
    let mut claimed: HashSet<String> = HashSet::new();
    let mut issues = Vec::new();
    let mut prepared = Vec::new();

    for (index, diagram) in extracted.iter().enumerate() {
        let sanitized = sanitize_body(&diagram.body);
        let problems = validate_body(&sanitized);
        if !problems.is_empty() {
            for problem in problems {
                issues.push(format!("block {} ({}): {problem}", index + 1, diagram.id_hint.as_deref().unwrap_or("unnamed")));
            }
            continue;
        }

        let id = assign_diagram_id(index, diagram.id_hint.as_deref(), &plan.diagram_specs, &mut claimed);
        let slug = slugify(&id);
        let spec = plan.diagram_specs.iter().find(|s| s.diagram_id.as_deref() == Some(id.as_str()));
        let alt_text = spec
            .and_then(|s| s.title.clone())
            .unwrap_or_else(|| format!("Diagram {id}"));

        prepared.push(PreparedDiagram {
            request: DiagramRequest {
                diagram_id: id,
                source_path: format!("diagrams/{slug}.puml"),
                format: "png".to_string(),
                blob_path: format!("images/{slug}.png"),
                alt_text,
            },
            sanitized_body: sanitized,
            original_block: diagram.raw_block.clone(),
        });
    }

    if !issues.is_empty() {
        return Err(issues);
    }
    Ok(prepared)
}

/// Replace every fenced block named in `results` with its rendered
/// image link (`![alt](relative_path)`), leaving failed (no
/// `relative_path`) entries' blocks untouched in the finalized document.
#[must_use]
pub fn apply_diagram_results(draft: &str, results: &[DiagramResult]) -> String {
    let mut out = draft.to_string();
    for result in results {
        let Some(relative_path) = &result.relative_path else { continue };
        if !out.contains(&result.code_block) {
            continue;
        }
        let image = format!("![{}]({relative_path})", result.alt_text);
        out = out.replacen(&result.code_block, &image, 1);
    }
    out
}
