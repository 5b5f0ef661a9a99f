use std::time::Duration;

use async_trait::async_trait;
use scrivener_errors::StageError;

/// Output encoding a diagram may be rendered in; the default per spec §4.11
/// is `Png`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagramFormat {
    Png,
    Svg,
}

impl DiagramFormat {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Svg => "svg",
        }
    }

    /// Parse a format string, defaulting to `Png` for anything else —
    /// matches the spec's stated default for `diagram_requests` whose
    /// `format` field is absent or unrecognized.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "svg" => Self::Svg,
            _ => Self::Png,
        }
    }
}

/// Renders PlantUML source to a bitmap or vector image.
#[async_trait]
pub trait DiagramRenderer: Send + Sync {
    async fn render(&self, format: DiagramFormat, source: &str) -> Result<Vec<u8>, StageError>;
}

/// `POST <server>/{png|svg}` with the PlantUML source as the request
/// body, returning the rendered binary. 30s timeout per spec §6.
pub struct HttpPlantUmlRenderer {
    client: reqwest::Client,
    base_url: String,
}

impl HttpPlantUmlRenderer {
    /// # Panics
    /// Panics if the underlying `reqwest::Client` fails to build (e.g. an
    /// invalid TLS backend configuration), matching `reqwest`'s own
    /// `Client::new` panicking constructor.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to build PlantUML HTTP client");
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl DiagramRenderer for HttpPlantUmlRenderer {
    async fn render(&self, format: DiagramFormat, source: &str) -> Result<Vec<u8>, StageError> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), format.as_str());
        let response = self
            .client
            .post(&url)
            .body(source.to_string())
            .send()
            .await
            .map_err(|e| StageError::Collaborator {
                collaborator: "plantuml_renderer".to_string(),
                reason: e.to_string(),
            })?;

        let response = response.error_for_status().map_err(|e| StageError::Collaborator {
            collaborator: "plantuml_renderer".to_string(),
            reason: e.to_string(),
        })?;

        response.bytes().await.map(|b| b.to_vec()).map_err(|e| StageError::Collaborator {
            collaborator: "plantuml_renderer".to_string(),
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_defaults_to_png() {
        assert_eq!(DiagramFormat::parse("weird"), DiagramFormat::Png);
        assert_eq!(DiagramFormat::parse("SVG"), DiagramFormat::Svg);
    }
}
