use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Field
// ---------------------------------------------------------------------------

/// Logical role of a response column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    DonorName,
    DonorOrganization,
    Email,
    Purpose,
    Amount,
}

impl Field {
    /// Required fields in the order they are checked.
    pub fn required() -> &'static [Field] {
        &[
            Field::DonorName,
            Field::DonorOrganization,
            Field::Email,
            Field::Purpose,
            Field::Amount,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Field::DonorName => "donor_name",
            Field::DonorOrganization => "donor_organization",
            Field::Email => "email",
            Field::Purpose => "purpose",
            Field::Amount => "amount",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Field::DonorName => "donor name",
            Field::DonorOrganization => "donor organization",
            Field::Email => "email",
            Field::Purpose => "purpose",
            Field::Amount => "amount",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// ColorHint
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorHint {
    Pending,
    Success,
    Failure,
}

impl ColorHint {
    pub fn hex(self) -> &'static str {
        match self {
            ColorHint::Pending => "#FFFF00",
            ColorHint::Success => "#00FF00",
            ColorHint::Failure => "#FF0000",
        }
    }
}

// ---------------------------------------------------------------------------
// StatusSlot
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusSlot {
    Document,
    Delivery,
}

impl StatusSlot {
    pub fn as_str(self) -> &'static str {
        match self {
            StatusSlot::Document => "document",
            StatusSlot::Delivery => "delivery",
        }
    }

    fn in_progress_text(self) -> &'static str {
        match self {
            StatusSlot::Document => "Generating document...",
            StatusSlot::Delivery => "Sending email...",
        }
    }

    fn succeeded_text(self) -> &'static str {
        match self {
            StatusSlot::Document => "Document saved",
            StatusSlot::Delivery => "Email sent",
        }
    }

    fn failed_prefix(self) -> &'static str {
        match self {
            StatusSlot::Document => "Document failed: ",
            StatusSlot::Delivery => "Email failed: ",
        }
    }

    /// Cell text for `status` in this slot. `Idle` has no text.
    pub fn text(self, status: &StageStatus) -> Option<String> {
        match status {
            StageStatus::Idle => None,
            StageStatus::InProgress => Some(self.in_progress_text().to_string()),
            StageStatus::Succeeded => Some(self.succeeded_text().to_string()),
            StageStatus::Failed(reason) => Some(format!("{}{reason}", self.failed_prefix())),
        }
    }

    /// Read a status back from the cell text written by [`StatusSlot::text`].
    /// Unrecognized text is reported as a failure carrying the raw text.
    pub fn parse(self, text: &str) -> StageStatus {
        let text = text.trim();
        if text.is_empty() {
            StageStatus::Idle
        } else if text == self.in_progress_text() {
            StageStatus::InProgress
        } else if text == self.succeeded_text() {
            StageStatus::Succeeded
        } else if let Some(reason) = text.strip_prefix(self.failed_prefix()) {
            StageStatus::Failed(reason.to_string())
        } else {
            StageStatus::Failed(text.to_string())
        }
    }
}

impl fmt::Display for StatusSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// StageStatus
// ---------------------------------------------------------------------------

/// Progress of one status slot on one row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum StageStatus {
    Idle,
    InProgress,
    Succeeded,
    Failed(String),
}

impl StageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageStatus::Idle => "idle",
            StageStatus::InProgress => "in_progress",
            StageStatus::Succeeded => "succeeded",
            StageStatus::Failed(_) => "failed",
        }
    }

    pub fn color(&self) -> Option<ColorHint> {
        match self {
            StageStatus::Idle => None,
            StageStatus::InProgress => Some(ColorHint::Pending),
            StageStatus::Succeeded => Some(ColorHint::Success),
            StageStatus::Failed(_) => Some(ColorHint::Failure),
        }
    }

    /// Legal moves within a single run. A terminal status only returns to
    /// `InProgress` when the row is re-triggered.
    pub fn can_transition_to(&self, next: &StageStatus) -> bool {
        matches!(
            (self, next),
            (
                StageStatus::Idle | StageStatus::Succeeded | StageStatus::Failed(_),
                StageStatus::InProgress
            ) | (
                StageStatus::InProgress,
                StageStatus::Succeeded | StageStatus::Failed(_)
            )
        )
    }
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// PipelineState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Validating,
    Rendering,
    Storing,
    Delivering,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Validating => "validating",
            Stage::Rendering => "rendering",
            Stage::Storing => "storing",
            Stage::Delivering => "delivering",
        };
        f.write_str(s)
    }
}

/// Where a pipeline run ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PipelineState {
    Done,
    Failed { stage: Stage, reason: String },
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_text_parses_back() {
        for slot in [StatusSlot::Document, StatusSlot::Delivery] {
            for status in [
                StageStatus::InProgress,
                StageStatus::Succeeded,
                StageStatus::Failed("Invalid email".to_string()),
            ] {
                let text = slot.text(&status).unwrap();
                assert_eq!(slot.parse(&text), status);
            }
        }
    }

    #[test]
    fn empty_cell_is_idle() {
        assert_eq!(StatusSlot::Document.parse(""), StageStatus::Idle);
        assert_eq!(StatusSlot::Document.text(&StageStatus::Idle), None);
    }

    #[test]
    fn delivery_failure_text() {
        let text = StatusSlot::Delivery
            .text(&StageStatus::Failed("Invalid email".to_string()))
            .unwrap();
        assert_eq!(text, "Email failed: Invalid email");
    }

    #[test]
    fn transitions_never_skip_in_progress() {
        assert!(StageStatus::Idle.can_transition_to(&StageStatus::InProgress));
        assert!(!StageStatus::Idle.can_transition_to(&StageStatus::Succeeded));
        assert!(!StageStatus::Idle.can_transition_to(&StageStatus::Failed("x".into())));
        assert!(StageStatus::InProgress.can_transition_to(&StageStatus::Succeeded));
        assert!(!StageStatus::InProgress.can_transition_to(&StageStatus::InProgress));
        assert!(StageStatus::Failed("x".into()).can_transition_to(&StageStatus::InProgress));
    }

    #[test]
    fn colors_follow_status() {
        assert_eq!(StageStatus::InProgress.color(), Some(ColorHint::Pending));
        assert_eq!(StageStatus::Succeeded.color().unwrap().hex(), "#00FF00");
        assert_eq!(StageStatus::Failed("x".into()).color().unwrap().hex(), "#FF0000");
    }
}
