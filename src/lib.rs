pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::bootstrap::{BootstrapResult, bootstrap_workspace};
pub use application::commands::AppState;
pub use application::error::ScheduleError;
pub use application::time_blocks::{OccurrenceTemplate, TimeBlockService, detect_conflicts};
pub use domain::error::{LifecycleError, RecurrenceError};
pub use domain::interval::{Interval, free_slots, merge_intervals, overlaps};
pub use domain::models::Task;
pub use domain::recurrence::{EndCondition, EndsType, Frequency, RecurrenceRule};
pub use domain::recurrence_engine::RecurrenceEngine;
pub use domain::settings::SchedulingSettings;
pub use domain::time_block::{BlockState, LogOrigin, RecordId, SourceType, TimeBlock};
pub use infrastructure::error::InfraError;
pub use infrastructure::record_store::{InMemoryRecordStore, RecordStore};
pub use infrastructure::storage::SqliteRecordStore;
