use crate::domain::error::{LifecycleError, RecurrenceError};
use crate::domain::time_block::RecordId;
use crate::infrastructure::error::InfraError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error(transparent)]
    Recurrence(#[from] RecurrenceError),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("{collection} record not found: {id}")]
    NotFound {
        collection: &'static str,
        id: RecordId,
    },
    /// A multi-step operation failed after some store calls had already succeeded.
    /// `completed` lists the records written before the failure; nothing was rolled back.
    #[error("operation stopped after writing {} record(s): {source}", completed.len())]
    PartialTransition {
        completed: Vec<RecordId>,
        source: Box<ScheduleError>,
    },
}
