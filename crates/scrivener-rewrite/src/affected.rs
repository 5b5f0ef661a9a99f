use std::collections::BTreeSet;

use scrivener_types::Plan;

/// Compute the rewrite stage's affected-section set per §4.7.7:
/// contradiction sections ∪ style/cohesion guidance sections ∪
/// placeholder sections. When that union is empty but some guidance text
/// exists globally (not tied to a specific section), fall back to every
/// outline section rather than rewriting nothing.
#[must_use]
pub fn affected_sections(
    plan: &Plan,
    contradiction_sections: &BTreeSet<String>,
    style_guidance_sections: &BTreeSet<String>,
    cohesion_guidance_sections: &BTreeSet<String>,
    placeholder_sections: &BTreeSet<String>,
    has_global_guidance: bool,
) -> BTreeSet<String> {
    let mut affected = BTreeSet::new();
    affected.extend(contradiction_sections.iter().cloned());
    affected.extend(style_guidance_sections.iter().cloned());
    affected.extend(cohesion_guidance_sections.iter().cloned());
    affected.extend(placeholder_sections.iter().cloned());

    if affected.is_empty() && has_global_guidance {
        affected.extend(plan.section_ids());
    }
    affected
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
            outline: vec![
                OutlineSection {
                    id: "s1".into(),
                    title: "One".into(),
                    goals: vec![],
                    key_points: vec![],
                    dependencies: Default::default(),
                },
                OutlineSection {
                    id: "s2".into(),
                    title: "Two".into(),
                    goals: vec![],
                    key_points: vec![],
                    dependencies: Default::default(),
                },
            ],
            glossary: Default::default(),
            global_style: Default::default(),
            diagram_specs: vec![],
        }
    }

    #[test]
    fn unions_every_source_of_affected_sections() {
        let affected = affected_sections(
            &plan(),
            &BTreeSet::from(["s1".to_string()]),
            &BTreeSet::from(["s2".to_string()]),
            &BTreeSet::new(),
            &BTreeSet::new(),
            false,
        );
        assert_eq!(affected, BTreeSet::from(["s1".to_string(), "s2".to_string()]));
    }

    #[test]
    fn falls_back_to_every_section_when_union_empty_but_guidance_is_global() {
        let affected = affected_sections(&plan(), &BTreeSet::new(), &BTreeSet::new(), &BTreeSet::new(), &BTreeSet::new(), true);
        assert_eq!(affected, BTreeSet::from(["s1".to_string(), "s2".to_string()]));
    }

    #[test]
    fn stays_empty_when_union_empty_and_no_guidance_at_all() {
        let affected = affected_sections(&plan(), &BTreeSet::new(), &BTreeSet::new(), &BTreeSet::new(), &BTreeSet::new(), false);
        assert!(affected.is_empty());
    }
}
