use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use scrivener_types::DiagramSpec;

static SLUG_INVALID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9_.\-]+").expect("valid regex"));

/// Lowercase, replace any run of characters outside `[a-z0-9_.-]` with a
/// single `-`, trim leading/trailing `-`, default to `"diagram"` when
/// nothing survives.
#[must_use]
pub fn slugify(id: &str) -> String {
    let lowered = id.to_lowercase();
    let collapsed = SLUG_INVALID_RE.replace_all(&lowered, "-");
    let slug = collapsed.trim_matches('-').to_string();
    if slug.is_empty() {
        "diagram".to_string()
    } else {
        slug
    }
}

/// Assign a stable diagram id to an extracted block at outline position
/// `index` (0-based): prefer its own `diagram_id` comment; otherwise
/// match the plan's `diagram_specs` by id first, then take the first
/// spec not yet claimed by an earlier block; otherwise synthesize
/// `diagram_<n>` (1-based).
#[must_use]
pub fn assign_diagram_id(index: usize, id_hint: Option<&str>, specs: &[DiagramSpec], claimed: &mut HashSet<String>) -> String {
    if let Some(hint) = id_hint {
        if !hint.is_empty() {
            claimed.insert(hint.to_string());
            return hint.to_string();
        }
    }

    for spec in specs {
        if let Some(spec_id) = &spec.diagram_id {
            if !claimed.contains(spec_id) && specs.iter().any(|s| s.diagram_id.as_deref() == Some(spec_id.as_str())) {
                claimed.insert(spec_id.clone());
                return spec_id.clone();
            }
        }
    }

    let synthesized = format!("diagram_{}", index + 1);
    claimed.insert(synthesized.clone());
    synthesized
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_lowercases_and_collapses_invalid_runs() {
        assert_eq!(slugify("Flow #1!!"), "flow-1");
        assert_eq!(slugify("   "), "diagram");
    }

    #[test]
    fn id_hint_wins_over_plan_specs() {
        let mut claimed = HashSet::new();
        let id = assign_diagram_id(0, Some("explicit"), &[], &mut claimed);
        assert_eq!(id, "explicit");
    }

    #[test]
    fn falls_back_to_first_unclaimed_spec_then_synthesizes() {
        let specs = vec![
            DiagramSpec {
                diagram_id: Some("spec_a".to_string()),
                ..Default::default()
            },
            DiagramSpec {
                diagram_id: Some("spec_b".to_string()),
                ..Default::default()
            },
        ];
        let mut claimed = HashSet::new();
        let first = assign_diagram_id(0, None, &specs, &mut claimed);
        assert_eq!(first, "spec_a");
        let second = assign_diagram_id(1, None, &specs, &mut claimed);
        assert_eq!(second, "spec_b");
        let third = assign_diagram_id(2, None, &specs, &mut claimed);
        assert_eq!(third, "diagram_3");
    }
}
