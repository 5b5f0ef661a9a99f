use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Planner output: outline, glossary, global style, and diagram specs for a document.
///
/// Produced once by the `plan` stage and then carried verbatim on every
/// subsequent payload; later stages read it but never mutate it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub title: String,
    pub audience: String,
    pub length_pages: u32,
    pub outline: Vec<OutlineSection>,
    #[serde(default)]
    pub glossary: BTreeMap<String, String>,
    #[serde(default)]
    pub global_style: GlobalStyle,
    #[serde(default)]
    pub diagram_specs: Vec<DiagramSpec>,
}

impl Plan {
    /// Section ids in outline order, for stages that need the declared order
    /// rather than the dependency-sorted one.
    #[must_use]
    pub fn section_ids(&self) -> Vec<String> {
        self.outline.iter().map(|s| s.id.clone()).collect()
    }

    /// Look up a section by id.
    #[must_use]
    pub fn section(&self, id: &str) -> Option<&OutlineSection> {
        self.outline.iter().find(|s| s.id == id)
    }
}

/// One outline entry: a section the writer agent will draft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlineSection {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub goals: Vec<String>,
    #[serde(default)]
    pub key_points: Vec<String>,
    /// Section ids this section depends on; edges for the dependency graph (§4.10).
    #[serde(default)]
    pub dependencies: BTreeSet<String>,
}

/// Tone/voice guidance the writer and style reviewer apply uniformly.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalStyle {
    #[serde(default)]
    pub tone: Option<String>,
    #[serde(default)]
    pub pov: Option<String>,
    #[serde(default)]
    pub formatting_rules: Vec<String>,
}

/// A planned diagram the diagram pipeline will try to match extracted
/// PlantUML blocks against, by id first and then by position.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiagramSpec {
    #[serde(default)]
    pub section_id: Option<String>,
    #[serde(default)]
    pub diagram_id: Option<String>,
    #[serde(default)]
    pub diagram_type: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub goal: Option<String>,
    #[serde(default)]
    pub entities: Vec<String>,
    #[serde(default)]
    pub relationships: Vec<String>,
}
