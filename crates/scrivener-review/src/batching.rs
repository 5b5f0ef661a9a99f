use std::collections::{BTreeMap, BTreeSet};

use once_cell::sync::Lazy;
use scrivener_deps::DependencyGraph;
use scrivener_draft::{extract_sections, merge_revised_markdown};
use scrivener_errors::CycleError;
use scrivener_types::Plan;
use serde_json::{Map, Value};
use tiktoken_rs::{cl100k_base, get_bpe_from_model, CoreBPE};

use crate::progress::{AgentProgress, ReviewAgentKind};

/// `cl100k_base`, falling back to the `gpt-4o-mini` encoding if that one
/// can't be loaded (mirrors `_estimate_tokens`'s `tiktoken.get_encoding`/
/// `encoding_for_model` fallback pair). `None` only if neither loads.
static ENCODING: Lazy<Option<CoreBPE>> = Lazy::new(|| cl100k_base().or_else(|_| get_bpe_from_model("gpt-4o-mini")).ok());

/// Best-effort token estimate for a composed prompt: the real byte-pair
/// encoding is the common case; `len / 3` is the true exception fallback,
/// used only when neither encoding could be loaded at all.
#[must_use]
pub fn estimate_tokens(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }
    match ENCODING.as_ref() {
        Some(encoding) => encoding.encode_ordinary(text).len(),
        None => (text.len() / 3).max(1),
    }
}

/// One dispatch's worth of work: the section ids selected and the
/// composed prompt to send to the agent.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewBatch {
    pub section_ids: Vec<String>,
    pub prompt: String,
}

fn dependency_stub(dep_id: &str, plan: &Plan, dependency_summaries: &BTreeMap<String, String>) -> String {
    let title = plan.section(dep_id).map(|s| s.title.as_str()).unwrap_or(dep_id);
    let summary = dependency_summaries
        .get(dep_id)
        .map(String::as_str)
        .filter(|s| !s.trim().is_empty())
        .unwrap_or("(no summary recorded yet)");
    format!("Dependency {dep_id} ({title}) summary: {summary}")
}

/// Compute the next section batch for one agent's dispatch (§4.8).
///
/// Greedily packs the topological order's unprocessed prefix until either
/// `batch_size` sections are selected or the composed prompt would exceed
/// `max_prompt_tokens`. At least one section is always included once any
/// remain, even if it alone exceeds the token cap, so a single oversized
/// section can't stall the agent forever.
///
/// Returns `None` once every section in `sections_done` is empty... i.e.
/// nothing remains to batch, which the caller takes as "this agent is
/// effectively at the draft's current section set" (termination is
/// judged against the full outline by [`is_agent_done`], not this
/// function, since the draft may not yet contain every outline section).
pub fn next_batch(
    draft: &str,
    plan: &Plan,
    sections_done: &BTreeSet<String>,
    dependency_summaries: &BTreeMap<String, String>,
    batch_size: usize,
    max_prompt_tokens: u32,
) -> Result<Option<ReviewBatch>, CycleError> {
    let draft_sections = extract_sections(draft);
    let graph = DependencyGraph::from_outline(&plan.outline);
    let order = graph.topological_order()?;
    let restricted: Vec<String> = order.into_iter().filter(|id| draft_sections.contains_key(id)).collect();

    let remaining: Vec<String> = restricted.into_iter().filter(|id| !sections_done.contains(id)).collect();
    if remaining.is_empty() {
        return Ok(None);
    }

    let mut selected: Vec<String> = Vec::new();
    for id in &remaining {
        if selected.len() >= batch_size {
            break;
        }
        let mut candidate = selected.clone();
        candidate.push(id.clone());
        let prompt = compose_prompt(&candidate, plan, &draft_sections, dependency_summaries);
        if !selected.is_empty() && estimate_tokens(&prompt) > max_prompt_tokens as usize {
            break;
        }
        selected = candidate;
    }

    let prompt = compose_prompt(&selected, plan, &draft_sections, dependency_summaries);
    Ok(Some(ReviewBatch {
        section_ids: selected,
        prompt,
    }))
}

fn compose_prompt(
    batched_ids: &[String],
    plan: &Plan,
    draft_sections: &BTreeMap<String, String>,
    dependency_summaries: &BTreeMap<String, String>,
) -> String {
    let batched_set: BTreeSet<&String> = batched_ids.iter().collect();
    let mut external_deps: BTreeSet<String> = BTreeSet::new();
    for id in batched_ids {
        if let Some(section) = plan.section(id) {
            for dep in &section.dependencies {
                if !batched_set.contains(dep) {
                    external_deps.insert(dep.clone());
                }
            }
        }
    }

    let mut parts = Vec::new();
    for dep_id in &external_deps {
        parts.push(dependency_stub(dep_id, plan, dependency_summaries));
    }
    for id in batched_ids {
        if let Some(text) = draft_sections.get(id) {
            parts.push(text.clone());
        }
    }
    parts.join("\n\n")
}

/// True once every outline section id has been marked done for this
/// agent — the actual termination condition (§4.8 "Termination"), judged
/// against the plan's full outline rather than just what's currently in
/// the draft.
#[must_use]
pub fn is_agent_done(sections_done: &BTreeSet<String>, plan: &Plan) -> bool {
    plan.outline.iter().all(|s| sections_done.contains(&s.id))
}

/// Merge one batch's agent result into its [`AgentProgress`].
///
/// Parses `raw_result` as JSON with a top-level `sections[]` array; each
/// entry's `issues`/`suggestions` are appended under its `section_id` key
/// in `accumulated`, and — for the general agent — any per-section
/// `revised_markdown` is folded into `accumulated["revised_markdown"]`
/// via [`merge_revised_markdown`]. Every batched id is marked done
/// regardless of whether the parse produced a matching entry (a
/// malformed or empty response must not loop the stage forever).
pub fn merge_batch_result(progress: &mut AgentProgress, kind: ReviewAgentKind, batched_ids: &[String], raw_result: &str) {
    let parsed: Option<Value> = serde_json::from_str(raw_result).ok();
    let entries: Vec<Value> = parsed
        .as_ref()
        .and_then(|v| v.get("sections"))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    for entry in &entries {
        let Some(section_id) = entry.get("section_id").and_then(Value::as_str) else {
            continue;
        };
        let bucket = progress
            .accumulated
            .entry("sections".to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(sections_map) = bucket {
            let section_entry = sections_map.entry(section_id.to_string()).or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(section_obj) = section_entry {
                if let Some(issues) = entry.get("issues") {
                    append_into_array(section_obj, "issues", issues);
                }
                if let Some(suggestions) = entry.get("suggestions") {
                    append_into_array(section_obj, "suggestions", suggestions);
                }
                if let Some(summary) = entry.get("summary").and_then(Value::as_str) {
                    section_obj.insert("summary".to_string(), Value::String(summary.to_string()));
                }
            }
        }

        if kind == ReviewAgentKind::General {
            if let Some(revised) = entry.get("revised_markdown").and_then(Value::as_str) {
                let existing = progress
                    .accumulated
                    .get("revised_markdown")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                let merged = if existing.is_empty() {
                    revised.to_string()
                } else {
                    merge_revised_markdown(existing, revised)
                };
                progress.accumulated.insert("revised_markdown".to_string(), Value::String(merged));
            }
        }
    }

    for id in batched_ids {
        progress.sections_done.insert(id.clone());
    }
}

fn append_into_array(object: &mut Map<String, Value>, key: &str, value: &Value) {
    let entry = object.entry(key.to_string()).or_insert_with(|| Value::Array(Vec::new()));
    if let Value::Array(items) = entry {
        match value {
            Value::Array(new_items) => items.extend(new_items.iter().cloned()),
            other => items.push(other.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scrivener_types::OutlineSection;

    fn plan_with_sections(ids: &[&str]) -> Plan {
        Plan {
            title: "T".into(),
            audience: "A".into(),
            length_pages: 60,
            outline: ids
                .iter()
                .enumerate()
                .map(|(i, id)| OutlineSection {
                    id: (*id).to_string(),
                    title: format!("Section {id}"),
                    goals: vec![],
                    key_points: vec![],
                    dependencies: if i == 0 {
                        Default::default()
                    } else {
                        [ids[i - 1].to_string()].into_iter().collect()
                    },
                })
                .collect(),
            glossary: Default::default(),
            global_style: Default::default(),
            diagram_specs: vec![],
        }
    }

    fn draft_with_sections(ids: &[&str]) -> String {
        ids.iter()
            .map(|id| format!("<!-- SECTION:{id}:START -->\nbody of {id}\n<!-- SECTION:{id}:END -->"))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    #[test]
    fn estimate_tokens_of_empty_text_is_zero() {
        assert_eq!(estimate_tokens(""), 0);
    }

    #[test]
    fn estimate_tokens_of_nonempty_text_is_positive_and_bounded_by_length() {
        let text = "the quick brown fox jumps over the lazy dog";
        let tokens = estimate_tokens(text);
        assert!(tokens > 0);
        assert!(tokens <= text.len(), "a token is never shorter than a single byte");
    }

    #[test]
    fn batches_respect_the_configured_count_cap() {
        let ids = ["s1", "s2", "s3", "s4", "s5", "s6", "s7"];
        let plan = plan_with_sections(&ids);
        let draft = draft_with_sections(&ids);
        let batch = next_batch(&draft, &plan, &BTreeSet::new(), &BTreeMap::new(), 3, 15_000)
            .unwrap()
            .unwrap();
        assert_eq!(batch.section_ids, vec!["s1", "s2", "s3"]);
    }

    #[test]
    fn batching_follows_topological_order_not_draft_order() {
        let plan = plan_with_sections(&["s1", "s2"]);
        let draft = draft_with_sections(&["s2", "s1"]);
        let batch = next_batch(&draft, &plan, &BTreeSet::new(), &BTreeMap::new(), 5, 15_000)
            .unwrap()
            .unwrap();
        assert_eq!(batch.section_ids, vec!["s1", "s2"]);
    }

    #[test]
    fn next_batch_returns_none_once_everything_is_done() {
        let ids = ["s1", "s2"];
        let plan = plan_with_sections(&ids);
        let draft = draft_with_sections(&ids);
        let done: BTreeSet<String> = ids.iter().map(|s| s.to_string()).collect();
        assert!(next_batch(&draft, &plan, &done, &BTreeMap::new(), 3, 15_000).unwrap().is_none());
    }

    #[test]
    fn a_single_oversized_section_is_still_included_alone() {
        let plan = plan_with_sections(&["s1"]);
        let draft = draft_with_sections(&["s1"]);
        let batch = next_batch(&draft, &plan, &BTreeSet::new(), &BTreeMap::new(), 3, 1).unwrap().unwrap();
        assert_eq!(batch.section_ids, vec!["s1"]);
    }

    #[test]
    fn merge_batch_result_marks_batched_ids_done_even_on_malformed_response() {
        let mut progress = AgentProgress::default();
        merge_batch_result(&mut progress, ReviewAgentKind::Style, &["s1".to_string()], "not json");
        assert!(progress.sections_done.contains("s1"));
    }

    #[test]
    fn merge_batch_result_accumulates_issues_across_batches() {
        let mut progress = AgentProgress::default();
        merge_batch_result(
            &mut progress,
            ReviewAgentKind::Style,
            &["s1".to_string()],
            r#"{"sections":[{"section_id":"s1","issues":["passive voice"]}]}"#,
        );
        merge_batch_result(
            &mut progress,
            ReviewAgentKind::Style,
            &["s1".to_string()],
            r#"{"sections":[{"section_id":"s1","issues":["run-on sentence"]}]}"#,
        );
        let issues = progress.accumulated["sections"]["s1"]["issues"].as_array().unwrap();
        assert_eq!(issues.len(), 2);
    }

    #[test]
    fn is_agent_done_requires_every_outline_section() {
        let plan = plan_with_sections(&["s1", "s2"]);
        let mut done = BTreeSet::new();
        done.insert("s1".to_string());
        assert!(!is_agent_done(&done, &plan));
        done.insert("s2".to_string());
        assert!(is_agent_done(&done, &plan));
    }

    proptest::proptest! {
        #[test]
        fn sections_done_is_a_growing_prefix_of_topological_order(batch_size in 1usize..6) {
            let ids = ["s1", "s2", "s3", "s4", "s5"];
            let plan = plan_with_sections(&ids);
            let draft = draft_with_sections(&ids);
            let order = DependencyGraph::from_outline(&plan.outline).topological_order().unwrap();

            let mut done: BTreeSet<String> = BTreeSet::new();
            let mut previous_len = 0;
            loop {
                let Some(batch) = next_batch(&draft, &plan, &done, &BTreeMap::new(), batch_size, 15_000).unwrap() else {
                    break;
                };
                for id in &batch.section_ids {
                    done.insert(id.clone());
                }
                let prefix = &order[..done.len()];
                let prefix_set: BTreeSet<String> = prefix.iter().cloned().collect();
                assert_eq!(prefix_set, done, "sections_done must always equal a prefix of the topological order");
                assert!(done.len() > previous_len, "batching must make forward progress");
                previous_len = done.len();
            }
        }
    }
}
