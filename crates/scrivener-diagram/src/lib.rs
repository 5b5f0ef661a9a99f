//! Diagram pipeline (§4.11): extract PlantUML blocks from a draft,
//! sanitize and validate them, assign stable ids, and substitute
//! rendered image links back in at finalize time.

mod extract;
mod ids;
mod requests;
mod sanitize;

pub use extract::{extract_diagrams, parse_id_hint, ExtractedDiagram};
pub use ids::{assign_diagram_id, slugify};
pub use requests::{apply_diagram_results, prepare_diagrams, DiagramRequest, DiagramResult, PreparedDiagram};
pub use sanitize::{sanitize_body, validate_body};
