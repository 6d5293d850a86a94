use crate::domain::time_block::RecordId;
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RecurrenceError {
    #[error("recurrence.end_date is required when ends_type is on_date")]
    MissingEndDate,
    #[error("recurrence.end_date must be >= recurrence.start_date")]
    EndDateBeforeStart,
    #[error("recurrence.occurrences is required when ends_type is after_occurrences")]
    MissingOccurrences,
    #[error("recurrence.occurrences must be > 0")]
    ZeroOccurrences,
    #[error("recurrence.end_date is only allowed when ends_type is on_date")]
    UnexpectedEndDate,
    #[error("recurrence.occurrences is only allowed when ends_type is after_occurrences")]
    UnexpectedOccurrences,
    #[error("recurrence.day_of_week must be within 0..=6 (got {0})")]
    InvalidDayOfWeek(u8),
    #[error("recurrence dates must fall within years 0000..=9999 (got {0})")]
    InstantOutOfRange(DateTime<Utc>),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("fixed break {0:?} is system-managed and cannot be {1}")]
    FixedBreakImmutable(Option<RecordId>, &'static str),
    #[error("time block {0:?} is already logged")]
    AlreadyLogged(Option<RecordId>),
    #[error("time block {0:?} has no planned start/end time")]
    MissingPlannedInterval(Option<RecordId>),
    #[error("actual end time must be after actual start time")]
    InvalidActualInterval,
    #[error("invalid time block: {0}")]
    Invalid(String),
}
