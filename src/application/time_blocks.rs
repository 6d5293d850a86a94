use crate::application::error::ScheduleError;
use crate::domain::interval::{Interval, free_slots};
use crate::domain::models::Task;
use crate::domain::recurrence::RecurrenceRule;
use crate::domain::recurrence_engine::RecurrenceEngine;
use crate::domain::settings::SchedulingSettings;
use crate::domain::time_block::{LogOrigin, RecordId, TimeBlock};
use crate::infrastructure::record_store::{RecordStore, TASKS, TIME_BLOCKS};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OccurrenceTemplate {
    pub title: String,
    pub duration_minutes: u32,
    pub task_id: Option<RecordId>,
    pub activity_category_id: Option<RecordId>,
}

impl OccurrenceTemplate {
    fn block_at(&self, start: DateTime<Utc>) -> TimeBlock {
        let end = start + Duration::minutes(i64::from(self.duration_minutes));
        let mut block = TimeBlock::task_plan(self.title.clone(), start, end);
        block.task_id = self.task_id;
        block.activity_category_id = self.activity_category_id;
        block
    }
}

pub struct TimeBlockService<S>
where
    S: RecordStore,
{
    store: Arc<S>,
    settings: SchedulingSettings,
    engine: RecurrenceEngine,
}

impl<S> TimeBlockService<S>
where
    S: RecordStore,
{
    pub fn new(store: Arc<S>, settings: SchedulingSettings) -> Self {
        let engine = RecurrenceEngine::from_settings(&settings);
        Self {
            store,
            settings,
            engine,
        }
    }

    pub fn settings(&self) -> &SchedulingSettings {
        &self.settings
    }

    pub fn engine(&self) -> &RecurrenceEngine {
        &self.engine
    }

    pub fn get_block(&self, block_id: RecordId) -> Result<TimeBlock, ScheduleError> {
        self.store
            .get(TIME_BLOCKS, block_id)?
            .ok_or(ScheduleError::NotFound {
                collection: TIME_BLOCKS,
                id: block_id,
            })
    }

    fn insert(&self, mut block: TimeBlock) -> Result<TimeBlock, ScheduleError> {
        block.id = None;
        block.validate().map_err(ScheduleError::InvalidInput)?;
        let id = self.store.add(TIME_BLOCKS, &block)?;
        block.id = Some(id);
        Ok(block)
    }

    pub fn create_manual_entry(
        &self,
        title: &str,
        interval: Interval,
    ) -> Result<TimeBlock, ScheduleError> {
        let block = self.insert(TimeBlock::manual_entry(
            title.trim(),
            interval.start,
            interval.end,
        ))?;
        tracing::debug!(block_id = ?block.id, "created manual entry");
        Ok(block)
    }

    pub fn create_fixed_break(
        &self,
        title: &str,
        interval: Interval,
    ) -> Result<TimeBlock, ScheduleError> {
        self.insert(TimeBlock::fixed_break(
            title.trim(),
            interval.start,
            interval.end,
        ))
    }

    pub fn schedule_break_after(
        &self,
        session_end: DateTime<Utc>,
        completed_sessions: u32,
    ) -> Result<TimeBlock, ScheduleError> {
        let minutes = self.settings.break_minutes_after(completed_sessions);
        let title = if self.settings.is_long_break_due(completed_sessions) {
            "Long break"
        } else {
            "Short break"
        };
        let block = self.create_fixed_break(
            title,
            Interval::new(
                session_end,
                session_end + Duration::minutes(i64::from(minutes)),
            ),
        )?;
        tracing::debug!(block_id = ?block.id, completed_sessions, minutes, "scheduled break");
        Ok(block)
    }

    /// Persists one `task_plan` block per occurrence, in order.
    ///
    /// Each block is a separate store call. If one fails after others succeeded, the
    /// error is `PartialTransition` carrying the ids already written.
    pub fn materialize_occurrences(
        &self,
        rule: &RecurrenceRule,
        template: &OccurrenceTemplate,
        count: usize,
        start_from: DateTime<Utc>,
    ) -> Result<Vec<TimeBlock>, ScheduleError> {
        if template.duration_minutes == 0 {
            return Err(ScheduleError::InvalidInput(
                "occurrence duration must be > 0".to_string(),
            ));
        }

        let occurrences = self
            .engine
            .generate_future_occurrences(rule, count, start_from);
        let mut created: Vec<TimeBlock> = Vec::with_capacity(occurrences.len());
        for occurrence in occurrences {
            match self.insert(template.block_at(occurrence)) {
                Ok(block) => created.push(block),
                Err(error) if created.is_empty() => return Err(error),
                Err(error) => {
                    tracing::warn!(
                        written = created.len(),
                        %error,
                        "materialization stopped part-way"
                    );
                    return Err(ScheduleError::PartialTransition {
                        completed: created.iter().filter_map(|block| block.id).collect(),
                        source: Box::new(error),
                    });
                }
            }
        }

        tracing::debug!(created = created.len(), "materialized recurrence occurrences");
        Ok(created)
    }

    pub fn plan_recurring_task(
        &self,
        task_id: RecordId,
        count: usize,
        start_from: DateTime<Utc>,
    ) -> Result<Vec<TimeBlock>, ScheduleError> {
        let task: Task = self
            .store
            .get(TASKS, task_id)?
            .ok_or(ScheduleError::NotFound {
                collection: TASKS,
                id: task_id,
            })?;
        let Some(rule) = task.recurrence_rule() else {
            return Ok(Vec::new());
        };

        let template = OccurrenceTemplate {
            title: task.title.clone(),
            duration_minutes: task
                .estimated_minutes
                .unwrap_or(self.settings.pomodoro_work_minutes),
            task_id: Some(task_id),
            activity_category_id: task.activity_category_id,
        };
        self.materialize_occurrences(&rule, &template, count, start_from)
    }

    pub fn convert_to_log(
        &self,
        block_id: RecordId,
        actual: Option<Interval>,
        origin: LogOrigin,
    ) -> Result<TimeBlock, ScheduleError> {
        let block = self.get_block(block_id)?;
        let logged = block.convert_to_log(actual, origin)?;
        self.store.update(TIME_BLOCKS, &logged)?;
        tracing::debug!(block_id, ?origin, "converted planned block to log");
        Ok(logged)
    }

    pub fn log_pomodoro_session(
        &self,
        block_id: RecordId,
        session_start: DateTime<Utc>,
    ) -> Result<TimeBlock, ScheduleError> {
        let session_end =
            session_start + Duration::minutes(i64::from(self.settings.pomodoro_work_minutes));
        self.convert_to_log(
            block_id,
            Some(Interval::new(session_start, session_end)),
            LogOrigin::Pomodoro,
        )
    }

    pub fn reschedule_block(
        &self,
        block_id: RecordId,
        interval: Interval,
    ) -> Result<TimeBlock, ScheduleError> {
        let block = self.get_block(block_id)?;
        let updated = block.reschedule(interval)?;
        self.store.update(TIME_BLOCKS, &updated)?;
        Ok(updated)
    }

    pub fn delete_block(&self, block_id: RecordId) -> Result<bool, ScheduleError> {
        let Some(block) = self.store.get::<TimeBlock>(TIME_BLOCKS, block_id)? else {
            return Ok(false);
        };
        block.ensure_editable("deleted")?;
        self.store.remove(TIME_BLOCKS, block_id)?;
        Ok(true)
    }

    pub fn list_blocks(&self, window: Interval) -> Result<Vec<TimeBlock>, ScheduleError> {
        let mut blocks = self
            .store
            .get_all::<TimeBlock>(TIME_BLOCKS)?
            .into_iter()
            .filter(|block| {
                block
                    .interval()
                    .is_some_and(|interval| interval.overlaps_with(&window, 0))
            })
            .collect::<Vec<_>>();
        blocks.sort_by_key(|block| block.interval().map(|interval| interval.start));
        Ok(blocks)
    }

    pub fn find_conflicts(&self, candidate: &TimeBlock) -> Result<Vec<TimeBlock>, ScheduleError> {
        let Some(target) = candidate.interval() else {
            return Ok(Vec::new());
        };
        let gap = self.settings.default_gap_minutes;
        let mut conflicts = self
            .store
            .get_all::<TimeBlock>(TIME_BLOCKS)?
            .into_iter()
            .filter(|block| candidate.id.is_none() || block.id != candidate.id)
            .filter(|block| {
                block
                    .interval()
                    .is_some_and(|interval| target.overlaps_with(&interval, gap))
            })
            .collect::<Vec<_>>();
        conflicts.sort_by_key(|block| block.interval().map(|interval| interval.start));
        Ok(conflicts)
    }

    pub fn free_time(&self, window: Interval) -> Result<Vec<Interval>, ScheduleError> {
        let busy = self
            .list_blocks(window)?
            .iter()
            .filter_map(TimeBlock::interval)
            .collect::<Vec<_>>();
        Ok(free_slots(window, &busy))
    }
}

pub fn detect_conflicts(blocks: &[TimeBlock], min_gap_minutes: u32) -> Vec<(usize, usize)> {
    let intervals = blocks.iter().map(TimeBlock::interval).collect::<Vec<_>>();
    let mut pairs = Vec::new();
    for (left_index, left) in intervals.iter().enumerate() {
        let Some(left) = left else {
            continue;
        };
        for (offset, right) in intervals[left_index + 1..].iter().enumerate() {
            if right.is_some_and(|right| left.overlaps_with(&right, min_gap_minutes)) {
                pairs.push((left_index, left_index + 1 + offset));
            }
        }
    }
    pairs
}
