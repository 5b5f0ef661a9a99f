//! Deterministic stand-ins for every collaborator interface. Used by
//! integration tests and by the CLI's `--stub-agents` local-run mode,
//! where no real LLM provider or PlantUML server is configured.

use async_trait::async_trait;
use futures::stream;
use futures::StreamExt;
use scrivener_errors::StageError;
use scrivener_types::{OutlineSection, Plan};
use std::collections::BTreeMap;

use crate::diagram_renderer::{DiagramFormat, DiagramRenderer};
use crate::interviewer::{InterviewQuestion, InterviewerAgent};
use crate::planner::PlannerAgent;
use crate::reviewer::{BatchReviewAgent, ReviewerAgent};
use crate::summarizer::SummarizerAgent;
use crate::verifier::VerifierAgent;
use crate::writer::{SectionFragmentStream, WriterAgent};

/// Proposes a fixed, title-agnostic intake question set.
pub struct StubInterviewer;

#[async_trait]
impl InterviewerAgent for StubInterviewer {
    async fn propose_questions(&self, title: &str) -> Result<Vec<InterviewQuestion>, StageError> {
        Ok(vec![
            InterviewQuestion {
                id: "tone".to_string(),
                q: format!("What tone should \"{title}\" take?"),
                sample: Some("Professional but approachable".to_string()),
            },
            InterviewQuestion {
                id: "pov".to_string(),
                q: "What point of view should the document use?".to_string(),
                sample: Some("Second person".to_string()),
            },
        ])
    }
}

/// Builds a minimal three-section outline so callers have a plan to
/// drive the rest of the pipeline with in tests.
pub struct StubPlanner;

#[async_trait]
impl PlannerAgent for StubPlanner {
    async fn plan(&self, title: &str, audience: &str, length_pages: u32) -> Result<Plan, StageError> {
        Ok(Plan {
            title: title.to_string(),
            audience: audience.to_string(),
            length_pages: length_pages.max(60),
            outline: vec![
                OutlineSection {
                    id: "s1".to_string(),
                    title: "Introduction".to_string(),
                    goals: vec!["orient the reader".to_string()],
                    key_points: vec![],
                    dependencies: Default::default(),
                },
                OutlineSection {
                    id: "s2".to_string(),
                    title: "Details".to_string(),
                    goals: vec!["cover the core material".to_string()],
                    key_points: vec![],
                    dependencies: ["s1".to_string()].into_iter().collect(),
                },
                OutlineSection {
                    id: "s3".to_string(),
                    title: "Conclusion".to_string(),
                    goals: vec!["summarize and close".to_string()],
                    key_points: vec![],
                    dependencies: ["s2".to_string()].into_iter().collect(),
                },
            ],
            glossary: Default::default(),
            global_style: Default::default(),
            diagram_specs: vec![],
        })
    }
}

/// Emits the section title and goals as a single fragment.
pub struct StubWriter;

impl WriterAgent for StubWriter {
    fn write_section(
        &self,
        _plan: &Plan,
        section: &OutlineSection,
        dep_context: &str,
        extra_guidance: Option<&str>,
    ) -> SectionFragmentStream {
        let mut body = format!("## {}\n\n", section.title);
        if !dep_context.is_empty() {
            body.push_str(&format!("_Building on: {dep_context}_\n\n"));
        }
        if let Some(guidance) = extra_guidance {
            if !guidance.is_empty() {
                body.push_str(&format!("_Revision guidance applied: {guidance}_\n\n"));
            }
        }
        for goal in &section.goals {
            body.push_str(&format!("- {goal}\n"));
        }
        stream::iter(vec![Ok(body)]).boxed()
    }
}

/// Returns empty findings for every requested section — "nothing to
/// report" is a valid, terminating review result.
pub struct StubBatchReviewer;

#[async_trait]
impl BatchReviewAgent for StubBatchReviewer {
    async fn review_batch(&self, _plan: &Plan, _prompt: &str, sections: &[String]) -> Result<String, StageError> {
        let entries: Vec<serde_json::Value> = sections
            .iter()
            .map(|id| serde_json::json!({ "section_id": id, "issues": [], "suggestions": [] }))
            .collect();
        Ok(serde_json::json!({ "sections": entries }).to_string())
    }
}

#[async_trait]
impl ReviewerAgent for StubBatchReviewer {
    async fn review(&self, _plan: &Plan, _draft: &str) -> Result<String, StageError> {
        Ok(serde_json::json!({ "sections": [] }).to_string())
    }
}

/// Reports no contradictions.
pub struct StubVerifier;

#[async_trait]
impl VerifierAgent for StubVerifier {
    async fn verify(&self, _dependency_summaries: &BTreeMap<String, String>, _draft: &str) -> Result<String, StageError> {
        Ok(serde_json::json!({ "contradictions": [] }).to_string())
    }
}

/// Echoes the first line of the section as its one-bullet summary.
pub struct StubSummarizer;

#[async_trait]
impl SummarizerAgent for StubSummarizer {
    async fn summarize_section(&self, markdown: &str) -> Result<String, StageError> {
        let first_line = markdown.lines().find(|l| !l.trim().is_empty()).unwrap_or("(empty section)");
        Ok(format!("- {}", first_line.trim_start_matches('#').trim()))
    }
}

/// Returns a fixed 1x1 PNG/SVG payload rather than actually invoking a
/// PlantUML server.
pub struct StubDiagramRenderer;

#[async_trait]
impl DiagramRenderer for StubDiagramRenderer {
    async fn render(&self, format: DiagramFormat, _source: &str) -> Result<Vec<u8>, StageError> {
        match format {
            DiagramFormat::Png => Ok(vec![0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a]),
            DiagramFormat::Svg => Ok(b"<svg></svg>".to_vec()),
        }
    }
}
