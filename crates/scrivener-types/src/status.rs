use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A status fan-out event, published by every stage and consumed by the
/// status table projector.
///
/// Optional fields are omitted from the wire payload entirely rather than
/// serialized as `null`, matching the source pipeline's "drop `None`
/// values" convention — a timeline consumer never sees a null placeholder
/// next to a field the stage simply had nothing to say about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEvent {
    pub job_id: String,
    pub stage: String,
    pub ts: f64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cycle: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_contradictions: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style_issues: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cohesion_issues: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder_sections: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl StatusEvent {
    /// Render to the flat JSON object published on the status topic and
    /// mirrored into the status table, with `extra` keys merged in and any
    /// `null`-valued key (including a caller-supplied `null` in `extra`)
    /// dropped.
    #[must_use]
    pub fn to_payload(&self) -> Map<String, Value> {
        let value = serde_json::to_value(self).expect("StatusEvent always serializes");
        match value {
            Value::Object(mut map) => {
                map.retain(|_, v| !v.is_null());
                map
            }
            _ => unreachable!("StatusEvent serializes to an object"),
        }
    }

    /// Title-case the stage's first underscore token and lowercase the
    /// rest, appending `(cycle N)` when a cycle index is known — the
    /// default message used when a stage doesn't supply one explicitly.
    #[must_use]
    pub fn default_message(stage: &str, cycle: Option<i64>) -> String {
        let label = stage_label_title_case(stage);
        match cycle {
            Some(n) => format!("{label} (cycle {n})"),
            None => label,
        }
    }
}

fn stage_label_title_case(stage: &str) -> String {
    let mut words = stage.split('_');
    let mut out = String::new();
    if let Some(first) = words.next() {
        let mut chars = first.chars();
        if let Some(c) = chars.next() {
            out.push(c.to_ascii_uppercase());
        }
        out.push_str(&chars.as_str().to_ascii_lowercase());
    }
    for word in words {
        out.push(' ');
        out.push_str(&word.to_ascii_lowercase());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_message_title_cases_first_token_and_lowercases_rest() {
        assert_eq!(StatusEvent::default_message("REVIEW_DONE", None), "Review done");
        assert_eq!(
            StatusEvent::default_message("WRITE_IN_PROGRESS", Some(2)),
            "Write in progress (cycle 2)"
        );
    }

    #[test]
    fn to_payload_drops_none_fields() {
        let event = StatusEvent {
            job_id: "job-1".into(),
            stage: "WRITE_DONE".into(),
            ts: 1.0,
            message: "Write done".into(),
            artifact: None,
            cycle: None,
            has_contradictions: None,
            style_issues: None,
            cohesion_issues: None,
            placeholder_sections: None,
            extra: Map::new(),
        };
        let payload = event.to_payload();
        assert!(!payload.contains_key("artifact"));
        assert!(!payload.contains_key("cycle"));
        assert_eq!(payload.get("job_id").unwrap(), "job-1");
    }
}
