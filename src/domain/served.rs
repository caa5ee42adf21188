//! Items handed to the presentation layer.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::render::RenderContext;

/// One blob offered to the annotator, ready to display.
///
/// Carries everything the serving layer needs: the record to annotate,
/// whether it is a control probe, and the rendered artifacts.
#[derive(Debug, Clone)]
pub struct Served {
    /// Path of the blob record the label should be written to
    pub record_path: PathBuf,

    /// Whether this item comes from the control set
    pub is_control: bool,

    /// Rendered artifact handles for this serve
    pub render: RenderContext,
}

/// A freshly computed annotator trust score.
///
/// Produced at most once per control annotation and consumed exactly once
/// by the serving layer; an unconsumed event is replaced by the next one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatingEvent {
    /// Formatted score, e.g. "87%"
    pub score: String,

    /// When the score was computed
    pub computed_at: DateTime<Utc>,
}

impl RatingEvent {
    /// Create an event stamped with the current time
    pub fn new(score: impl Into<String>) -> Self {
        Self {
            score: score.into(),
            computed_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rating_event_serialization() {
        let event = RatingEvent::new("93%");
        let json = serde_json::to_string(&event).unwrap();
        let parsed: RatingEvent = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.score, "93%");
        assert!(parsed.computed_at.to_rfc3339().contains('T'));
    }
}
