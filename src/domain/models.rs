use crate::domain::recurrence::RecurrenceRule;
use crate::domain::time_block::RecordId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_category_id: Option<RecordId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_minutes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrence: Option<String>,
    #[serde(default)]
    pub completed: bool,
}

impl Task {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: None,
            title: title.into(),
            description: None,
            activity_category_id: None,
            estimated_minutes: None,
            recurrence: None,
            completed: false,
        }
    }

    pub fn with_recurrence(mut self, rule: &RecurrenceRule) -> Result<Self, serde_json::Error> {
        self.recurrence = Some(rule.to_json()?);
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.title, "task.title")?;
        if self.estimated_minutes == Some(0) {
            return Err("task.estimated_minutes must be > 0".to_string());
        }
        Ok(())
    }

    /// A rule that fails to parse degrades the task to one-off.
    pub fn recurrence_rule(&self) -> Option<RecurrenceRule> {
        let raw = self.recurrence.as_deref().map(str::trim).filter(|raw| !raw.is_empty())?;
        let rule = RecurrenceRule::from_json(raw);
        if rule.is_none() {
            tracing::warn!(
                task_id = ?self.id,
                "ignoring malformed recurrence rule; treating task as one-off"
            );
        }
        rule
    }

    pub fn is_recurring(&self) -> bool {
        self.recurrence_rule().is_some()
    }
}

fn validate_non_empty(value: &str, field_name: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field_name} must not be empty"));
    }
    Ok(())
}
