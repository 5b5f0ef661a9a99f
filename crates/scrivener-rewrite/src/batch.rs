use std::collections::BTreeSet;

use scrivener_types::Plan;

/// The next `batch_size` affected sections not yet in `rewritten`, in
/// outline order (stable and deterministic across re-entries into the
/// `rewrite` queue).
#[must_use]
pub fn next_rewrite_batch(plan: &Plan, affected: &BTreeSet<String>, rewritten: &BTreeSet<String>, batch_size: usize) -> Vec<String> {
    plan.section_ids()
        .into_iter()
        .filter(|id| affected.contains(id) && !rewritten.contains(id))
        .take(batch_size)
        .collect()
}

/// Every affected section has been rewritten; the stage can advance the
/// cycle counter and route onward.
#[must_use]
pub fn is_rewrite_done(affected: &BTreeSet<String>, rewritten: &BTreeSet<String>) -> bool {
    affected.iter().all(|id| rewritten.contains(id))
}

/// Concatenate style and cohesion guidance for the writer's `extra_guidance`
/// input, dropping whichever half is blank.
#[must_use]
pub fn combine_extra_guidance(style_guidance: &str, cohesion_guidance: &str) -> String {
    [style_guidance, cohesion_guidance]
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use scrivener_types::OutlineSection;

    fn plan() -> Plan {
        Plan {
            title: "T".into(),
            audience: "A".into(),
            length_pages: 60,
            outline: ["s1", "s2", "s3"]
                .into_iter()
                .map(|id| OutlineSection {
                    id: id.to_string(),
                    title: id.to_string(),
                    goals: vec![],
                    key_points: vec![],
                    dependencies: Default::default(),
                })
                .collect(),
            glossary: Default::default(),
            global_style: Default::default(),
            diagram_specs: vec![],
        }
    }

    #[test]
    fn batches_in_outline_order_skipping_already_rewritten() {
        let affected = BTreeSet::from(["s1".to_string(), "s2".to_string(), "s3".to_string()]);
        let rewritten = BTreeSet::from(["s2".to_string()]);
        let batch = next_rewrite_batch(&plan(), &affected, &rewritten, 1);
        assert_eq!(batch, vec!["s1".to_string()]);
    }

    #[test]
    fn done_once_every_affected_section_is_rewritten() {
        let affected = BTreeSet::from(["s1".to_string(), "s2".to_string()]);
        assert!(!is_rewrite_done(&affected, &BTreeSet::from(["s1".to_string()])));
        assert!(is_rewrite_done(&affected, &BTreeSet::from(["s1".to_string(), "s2".to_string()])));
    }

    #[test]
    fn combine_extra_guidance_drops_blank_halves() {
        assert_eq!(combine_extra_guidance("tighten tone", ""), "tighten tone");
        assert_eq!(combine_extra_guidance("", "fix transitions"), "fix transitions");
        assert_eq!(combine_extra_guidance("a", "b"), "a\n\nb");
        assert_eq!(combine_extra_guidance("  ", "  "), "");
    }
}
