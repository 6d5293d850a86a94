use crate::domain::error::LifecycleError;
use crate::domain::interval::Interval;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type RecordId = i64;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    FixedBreak,
    TaskPlan,
    ManualEntry,
    TimeLog,
    PomodoroLog,
}

impl SourceType {
    pub fn is_plan(self) -> bool {
        matches!(self, Self::TaskPlan | Self::ManualEntry)
    }

    pub fn is_log(self) -> bool {
        matches!(self, Self::TimeLog | Self::PomodoroLog)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockState {
    Planned,
    Logged,
    FixedBreak,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOrigin {
    Manual,
    Pomodoro,
}

impl LogOrigin {
    fn source_type(self) -> SourceType {
        match self {
            Self::Manual => SourceType::TimeLog,
            Self::Pomodoro => SourceType::PomodoroLog,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TimeBlock {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    pub title: String,
    pub source_type: SourceType,
    pub is_logged: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_start_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_end_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_category_id: Option<RecordId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<RecordId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<i64>,
}

impl TimeBlock {
    fn planned(
        title: impl Into<String>,
        source_type: SourceType,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Self {
        Self {
            id: None,
            title: title.into(),
            source_type,
            is_logged: false,
            start_time: Some(start),
            end_time: Some(end),
            actual_start_time: None,
            actual_end_time: None,
            activity_category_id: None,
            task_id: None,
            duration_minutes: None,
        }
    }

    pub fn task_plan(title: impl Into<String>, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self::planned(title, SourceType::TaskPlan, start, end)
    }

    pub fn manual_entry(
        title: impl Into<String>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Self {
        Self::planned(title, SourceType::ManualEntry, start, end)
    }

    pub fn fixed_break(
        title: impl Into<String>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Self {
        Self::planned(title, SourceType::FixedBreak, start, end)
    }

    pub fn with_task(mut self, task_id: RecordId) -> Self {
        self.task_id = Some(task_id);
        self
    }

    pub fn with_category(mut self, activity_category_id: RecordId) -> Self {
        self.activity_category_id = Some(activity_category_id);
        self
    }

    pub fn state(&self) -> BlockState {
        if self.source_type == SourceType::FixedBreak {
            BlockState::FixedBreak
        } else if self.is_logged {
            BlockState::Logged
        } else {
            BlockState::Planned
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("time_block.title must not be empty".to_string());
        }
        if self.source_type.is_log() != self.is_logged {
            return Err(format!(
                "time_block.is_logged must be {} for source_type {:?}",
                self.source_type.is_log(),
                self.source_type
            ));
        }

        let planned = complete_pair(self.start_time, self.end_time, "start_time/end_time")?;
        let actual = complete_pair(
            self.actual_start_time,
            self.actual_end_time,
            "actual_start_time/actual_end_time",
        )?;
        if actual.is_some() && !self.is_logged {
            return Err("time_block.actual times are only allowed on logged blocks".to_string());
        }
        if planned.is_none() && actual.is_none() {
            return Err("time_block needs a planned or an actual interval".to_string());
        }
        if planned.is_some_and(|interval| interval.is_empty()) {
            return Err("time_block.end_time must be after time_block.start_time".to_string());
        }
        if actual.is_some_and(|interval| interval.is_empty()) {
            return Err(
                "time_block.actual_end_time must be after time_block.actual_start_time"
                    .to_string(),
            );
        }
        Ok(())
    }

    pub fn planned_interval(&self) -> Option<Interval> {
        Some(Interval::new(self.start_time?, self.end_time?))
    }

    pub fn actual_interval(&self) -> Option<Interval> {
        Some(Interval::new(self.actual_start_time?, self.actual_end_time?))
    }

    pub fn interval(&self) -> Option<Interval> {
        if self.is_logged {
            self.actual_interval().or_else(|| self.planned_interval())
        } else {
            self.planned_interval()
        }
    }

    pub fn effective_duration_minutes(&self) -> Option<i64> {
        if self.is_logged {
            if let Some(cached) = self.duration_minutes.filter(|minutes| *minutes > 0) {
                return Some(cached);
            }
        }
        self.interval()?.duration_minutes()
    }

    pub fn ensure_editable(&self, action: &'static str) -> Result<(), LifecycleError> {
        if self.state() == BlockState::FixedBreak {
            return Err(LifecycleError::FixedBreakImmutable(self.id, action));
        }
        Ok(())
    }

    /// Planned -> Logged. Keeps identity, title and linkage; the recorded interval is
    /// `actual`, or the plan itself when no override is given.
    pub fn convert_to_log(
        &self,
        actual: Option<Interval>,
        origin: LogOrigin,
    ) -> Result<TimeBlock, LifecycleError> {
        self.ensure_editable("converted to a log")?;
        if self.is_logged {
            return Err(LifecycleError::AlreadyLogged(self.id));
        }
        let actual = match actual {
            Some(actual) => actual,
            None => self
                .planned_interval()
                .ok_or(LifecycleError::MissingPlannedInterval(self.id))?,
        };
        if actual.is_empty() {
            return Err(LifecycleError::InvalidActualInterval);
        }

        Ok(TimeBlock {
            source_type: origin.source_type(),
            is_logged: true,
            actual_start_time: Some(actual.start),
            actual_end_time: Some(actual.end),
            duration_minutes: None,
            ..self.clone()
        })
    }

    pub fn reschedule(&self, interval: Interval) -> Result<TimeBlock, LifecycleError> {
        self.ensure_editable("rescheduled")?;
        if interval.is_empty() {
            return Err(LifecycleError::Invalid(
                "end time must be after start time".to_string(),
            ));
        }
        let mut updated = self.clone();
        if updated.is_logged {
            updated.actual_start_time = Some(interval.start);
            updated.actual_end_time = Some(interval.end);
            updated.duration_minutes = None;
        } else {
            updated.start_time = Some(interval.start);
            updated.end_time = Some(interval.end);
        }
        Ok(updated)
    }
}

fn complete_pair(
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    field_name: &str,
) -> Result<Option<Interval>, String> {
    match (start, end) {
        (Some(start), Some(end)) => Ok(Some(Interval::new(start, end))),
        (None, None) => Ok(None),
        _ => Err(format!("time_block.{field_name} must be set together")),
    }
}
