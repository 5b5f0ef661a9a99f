use serde_json::{Map, Value};

/// Review/rewrite cycle accounting, derived once at stage entry and then
/// carried immutably on the outbound payload.
///
/// `requested` is fixed for the life of a job; `completed` only increases
/// (by [`CycleState::consume_rewrite`], once per rewrite stage completion);
/// `remaining` is always `requested - completed`, never stored independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleState {
    pub requested: u32,
    pub completed: u32,
}

/// Best-effort coercion of an arbitrary JSON value to `i64`, used because
/// payload fields round-trip through several stages and may arrive as
/// strings, floats, or be absent.
fn coerce_int(value: Option<&Value>, default: i64) -> i64 {
    match value {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)).unwrap_or(default),
        Some(Value::String(s)) => s.trim().parse::<i64>().unwrap_or(default),
        _ => default,
    }
}

impl CycleState {
    /// Rebuild cycle state from a job payload's raw fields.
    ///
    /// Mirrors the source pipeline's hydration order exactly: `requested`
    /// falls back through `cycles` → `expected_cycles` → `1`, floored at 1;
    /// `completed` is clamped to `[0, requested]`; if `cycles_remaining` is
    /// present it wins, clamped to `[0, requested - completed]`, and
    /// `completed` is recomputed from it rather than the other way round.
    #[must_use]
    pub fn from_context(context: &Map<String, Value>) -> Self {
        let expected_cycles_default = coerce_int(context.get("expected_cycles"), 1);
        let mut requested = coerce_int(context.get("cycles"), expected_cycles_default);
        requested = requested.max(1);

        let mut completed = coerce_int(context.get("cycles_completed"), 0);
        completed = completed.clamp(0, requested);

        if let Some(remaining_hint) = context.get("cycles_remaining") {
            if !remaining_hint.is_null() {
                let remaining = coerce_int(Some(remaining_hint), 0).clamp(0, requested - completed);
                completed = (requested - remaining).min(requested);
            }
        }

        Self {
            requested: requested as u32,
            completed: completed as u32,
        }
    }

    /// Cycles left to run; never negative.
    #[must_use]
    pub fn remaining(&self) -> u32 {
        self.requested.saturating_sub(self.completed)
    }

    /// True once no further review/rewrite cycle should run.
    #[must_use]
    pub fn exhausted(&self) -> bool {
        self.remaining() == 0
    }

    /// Advance by one completed rewrite cycle, capped at `requested`.
    #[must_use]
    pub fn consume_rewrite(&self) -> Self {
        if self.exhausted() {
            return *self;
        }
        Self {
            requested: self.requested,
            completed: (self.completed + 1).min(self.requested),
        }
    }

    /// Write the four cycle fields back onto a payload map.
    pub fn apply(&self, target: &mut Map<String, Value>) {
        target.insert("cycles".into(), Value::from(self.requested));
        target.insert("expected_cycles".into(), Value::from(self.requested));
        target.insert("cycles_completed".into(), Value::from(self.completed));
        target.insert("cycles_remaining".into(), Value::from(self.remaining()));
    }
}
