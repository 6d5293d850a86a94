use crate::application::bootstrap::bootstrap_workspace;
use crate::application::error::ScheduleError;
use crate::application::time_blocks::TimeBlockService;
use crate::domain::interval::Interval;
use crate::domain::recurrence::{RecurrenceRule, RecurrenceRuleRecord};
use crate::domain::time_block::{LogOrigin, RecordId, TimeBlock};
use crate::infrastructure::storage::SqliteRecordStore;
use chrono::{DateTime, Days, NaiveDate, SecondsFormat, TimeZone, Utc};
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

const MAX_GENERATED_OCCURRENCES: usize = 1_000;

pub struct AppState {
    config_dir: PathBuf,
    logs_dir: PathBuf,
    service: TimeBlockService<SqliteRecordStore>,
    log_guard: Mutex<()>,
}

impl AppState {
    pub fn new(workspace_root: PathBuf) -> Result<Self, ScheduleError> {
        let bootstrap = bootstrap_workspace(&workspace_root)?;
        let store = Arc::new(SqliteRecordStore::new(&bootstrap.database_path));

        Ok(Self {
            config_dir: bootstrap.config_dir,
            logs_dir: bootstrap.logs_dir,
            service: TimeBlockService::new(store, bootstrap.settings),
            log_guard: Mutex::new(()),
        })
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn service(&self) -> &TimeBlockService<SqliteRecordStore> {
        &self.service
    }

    fn finish<T>(
        &self,
        command: &str,
        result: Result<T, ScheduleError>,
        summary: impl FnOnce(&T) -> String,
    ) -> Result<T, ScheduleError> {
        match &result {
            Ok(value) => self.log_info(command, &summary(value)),
            Err(error) => self.log_error(command, &error.to_string()),
        }
        result
    }

    pub fn log_info(&self, command: &str, message: &str) {
        self.append_log("info", command, message);
    }

    pub fn log_error(&self, command: &str, message: &str) {
        self.append_log("error", command, message);
    }

    fn append_log(&self, level: &str, command: &str, message: &str) {
        let Ok(_guard) = self.log_guard.lock() else {
            return;
        };
        let path = self.logs_dir.join("commands.log");
        let payload = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "level": level,
            "command": command,
            "message": message,
        });

        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
            let _ = writeln!(file, "{}", payload);
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RecurrencePreviewResponse {
    pub description: String,
    pub occurrences: Vec<String>,
}

pub fn preview_recurrence_impl(
    state: &AppState,
    rule_json: String,
    count: usize,
    start_from: String,
) -> Result<RecurrencePreviewResponse, ScheduleError> {
    state.finish(
        "preview_recurrence",
        preview_recurrence(state, &rule_json, count, &start_from),
        |preview| format!("expanded {} occurrences", preview.occurrences.len()),
    )
}

fn preview_recurrence(
    state: &AppState,
    rule_json: &str,
    count: usize,
    start_from: &str,
) -> Result<RecurrencePreviewResponse, ScheduleError> {
    let rule = parse_rule_input(rule_json)?;
    let start_from = parse_datetime_input(state, start_from, "start_from")?;
    let engine = state.service.engine();

    let occurrences = engine
        .generate_future_occurrences(&rule, count.min(MAX_GENERATED_OCCURRENCES), start_from)
        .into_iter()
        .map(format_instant)
        .collect::<Vec<_>>();
    Ok(RecurrencePreviewResponse {
        description: engine.describe(&rule),
        occurrences,
    })
}

pub fn plan_task_impl(
    state: &AppState,
    task_id: RecordId,
    count: usize,
    start_from: String,
) -> Result<Vec<TimeBlock>, ScheduleError> {
    let result = parse_datetime_input(state, &start_from, "start_from").and_then(|start_from| {
        state.service.plan_recurring_task(
            task_id,
            count.min(MAX_GENERATED_OCCURRENCES),
            start_from,
        )
    });
    state.finish("plan_task", result, |blocks| {
        format!("planned {} blocks for task_id={task_id}", blocks.len())
    })
}

pub fn create_block_impl(
    state: &AppState,
    title: String,
    start_at: String,
    end_at: String,
) -> Result<TimeBlock, ScheduleError> {
    let result = parse_interval_input(state, &start_at, &end_at)
        .and_then(|interval| state.service.create_manual_entry(&title, interval));
    state.finish("create_block", result, |block| {
        format!("created block_id={:?}", block.id)
    })
}

pub fn convert_block_to_log_impl(
    state: &AppState,
    block_id: RecordId,
    actual_start: Option<String>,
    actual_end: Option<String>,
    from_pomodoro: bool,
) -> Result<TimeBlock, ScheduleError> {
    let origin = if from_pomodoro {
        LogOrigin::Pomodoro
    } else {
        LogOrigin::Manual
    };
    let result = parse_actual_input(state, actual_start, actual_end)
        .and_then(|actual| state.service.convert_to_log(block_id, actual, origin));
    state.finish("convert_block_to_log", result, |_| {
        format!("logged block_id={block_id} origin={origin:?}")
    })
}

pub fn reschedule_block_impl(
    state: &AppState,
    block_id: RecordId,
    start_at: String,
    end_at: String,
) -> Result<TimeBlock, ScheduleError> {
    let result = parse_interval_input(state, &start_at, &end_at)
        .and_then(|interval| state.service.reschedule_block(block_id, interval));
    state.finish("reschedule_block", result, |block| {
        let interval = block.interval();
        format!(
            "rescheduled block_id={block_id} start={:?} end={:?}",
            interval.map(|interval| format_instant(interval.start)),
            interval.map(|interval| format_instant(interval.end))
        )
    })
}

pub fn delete_block_impl(state: &AppState, block_id: RecordId) -> Result<bool, ScheduleError> {
    state.finish("delete_block", state.service.delete_block(block_id), |deleted| {
        format!("block_id={block_id} deleted={deleted}")
    })
}

pub fn list_blocks_impl(state: &AppState, date: String) -> Result<Vec<TimeBlock>, ScheduleError> {
    let result =
        parse_day_window(state, &date).and_then(|day| state.service.list_blocks(day));
    state.finish("list_blocks", result, |blocks| {
        format!("listed {} blocks for {}", blocks.len(), date.trim())
    })
}

pub fn find_conflicts_impl(
    state: &AppState,
    block_id: RecordId,
) -> Result<Vec<TimeBlock>, ScheduleError> {
    let result = state
        .service
        .get_block(block_id)
        .and_then(|block| state.service.find_conflicts(&block));
    state.finish("find_conflicts", result, |conflicts| {
        format!("block_id={block_id} conflicts={}", conflicts.len())
    })
}

fn parse_rule_input(raw: &str) -> Result<RecurrenceRule, ScheduleError> {
    let record: RecurrenceRuleRecord = serde_json::from_str(raw.trim()).map_err(|error| {
        ScheduleError::InvalidInput(format!("rule must be a recurrence rule JSON object: {error}"))
    })?;
    Ok(RecurrenceRule::try_from(record)?)
}

fn parse_actual_input(
    state: &AppState,
    actual_start: Option<String>,
    actual_end: Option<String>,
) -> Result<Option<Interval>, ScheduleError> {
    match (actual_start, actual_end) {
        (Some(start), Some(end)) => parse_interval_input(state, &start, &end).map(Some),
        (None, None) => Ok(None),
        _ => Err(ScheduleError::InvalidInput(
            "actual_start and actual_end must be given together".to_string(),
        )),
    }
}

fn format_instant(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn local_midnight(state: &AppState, date: NaiveDate) -> Option<DateTime<Utc>> {
    let timezone = state.service.engine().timezone();
    timezone
        .from_local_datetime(&date.and_hms_opt(0, 0, 0)?)
        .earliest()
        .map(|value| value.with_timezone(&Utc))
}

fn parse_datetime_input(
    state: &AppState,
    value: &str,
    field_name: &str,
) -> Result<DateTime<Utc>, ScheduleError> {
    let value = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| local_midnight(state, date))
        .ok_or_else(|| {
            ScheduleError::InvalidInput(format!("{field_name} must be RFC3339 or YYYY-MM-DD"))
        })
}

fn parse_interval_input(
    state: &AppState,
    start: &str,
    end: &str,
) -> Result<Interval, ScheduleError> {
    let start = parse_datetime_input(state, start, "start")?;
    let end = parse_datetime_input(state, end, "end")?;
    if end <= start {
        return Err(ScheduleError::InvalidInput(
            "end must be after start".to_string(),
        ));
    }
    Ok(Interval::new(start, end))
}

fn parse_day_window(state: &AppState, date: &str) -> Result<Interval, ScheduleError> {
    let invalid = || ScheduleError::InvalidInput("date must be YYYY-MM-DD".to_string());
    let day = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d").map_err(|_| invalid())?;
    let next_day = day.checked_add_days(Days::new(1)).ok_or_else(invalid)?;
    let start = local_midnight(state, day).ok_or_else(invalid)?;
    let end = local_midnight(state, next_day).ok_or_else(invalid)?;
    Ok(Interval::new(start, end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::RecurrenceError;
    use crate::domain::models::Task;
    use crate::domain::recurrence::Frequency;
    use crate::domain::time_block::SourceType;
    use crate::infrastructure::record_store::{RecordStore, TASKS};
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static NEXT_TEMP_WORKSPACE: AtomicUsize = AtomicUsize::new(0);

    struct TempWorkspace {
        path: PathBuf,
    }

    impl TempWorkspace {
        fn new() -> Self {
            let sequence = NEXT_TEMP_WORKSPACE.fetch_add(1, Ordering::Relaxed);
            let path = std::env::temp_dir().join(format!(
                "dayplan-command-tests-{}-{}",
                std::process::id(),
                sequence
            ));
            fs::create_dir_all(&path).expect("create temp workspace");
            Self { path }
        }

        fn app_state(&self) -> AppState {
            AppState::new(self.path.clone()).expect("initialize app state")
        }
    }

    impl Drop for TempWorkspace {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.path);
        }
    }

    #[test]
    fn bootstrap_creates_workspace_layout() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        assert!(state.config_dir().join("settings.json").exists());
        assert!(workspace.path.join("state").join("dayplan.sqlite").exists());
    }

    #[test]
    fn preview_recurrence_describes_and_expands() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let preview = preview_recurrence_impl(
            &state,
            r#"{"frequency":"weekly","startDate":"2024-01-01T00:00:00.000Z","endsType":"after_occurrences","occurrences":3}"#
                .to_string(),
            10,
            "2024-01-01".to_string(),
        )
        .expect("preview");

        assert_eq!(
            preview.occurrences,
            vec![
                "2024-01-01T00:00:00.000Z",
                "2024-01-08T00:00:00.000Z",
                "2024-01-15T00:00:00.000Z",
            ]
        );
        assert_eq!(
            preview.description,
            "Every week on Monday, starting January 1, 2024, 3 times"
        );
    }

    #[test]
    fn preview_rejects_malformed_rule() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let result = preview_recurrence_impl(
            &state,
            "{\"frequency\":".to_string(),
            3,
            "2024-01-01".to_string(),
        );
        assert!(matches!(result, Err(ScheduleError::InvalidInput(_))));
    }

    #[test]
    fn preview_reports_why_a_rule_is_invalid() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let result = preview_recurrence_impl(
            &state,
            r#"{"frequency":"daily","startDate":"2024-01-01T00:00:00Z","endsType":"after_occurrences"}"#
                .to_string(),
            3,
            "2024-01-01".to_string(),
        );
        assert!(matches!(
            result,
            Err(ScheduleError::Recurrence(RecurrenceError::MissingOccurrences))
        ));

        let result = preview_recurrence_impl(
            &state,
            r#"{"frequency":"daily","startDate":"2024-01-10T00:00:00Z","endsType":"on_date","endDate":"2024-01-01T00:00:00Z"}"#
                .to_string(),
            3,
            "2024-01-01".to_string(),
        );
        assert!(matches!(
            result,
            Err(ScheduleError::Recurrence(RecurrenceError::EndDateBeforeStart))
        ));
    }

    #[test]
    fn create_convert_and_list_block_flow() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let block = create_block_impl(
            &state,
            "Write report".to_string(),
            "2026-02-16T09:00:00Z".to_string(),
            "2026-02-16T10:00:00Z".to_string(),
        )
        .expect("create block");
        let block_id = block.id.expect("id assigned");

        let logged = convert_block_to_log_impl(
            &state,
            block_id,
            Some("2026-02-16T09:15:00Z".to_string()),
            Some("2026-02-16T10:05:00Z".to_string()),
            true,
        )
        .expect("convert");
        assert_eq!(logged.source_type, SourceType::PomodoroLog);
        assert_eq!(logged.effective_duration_minutes(), Some(50));

        let listed = list_blocks_impl(&state, "2026-02-16".to_string()).expect("list blocks");
        assert_eq!(listed.len(), 1);
        assert!(listed[0].is_logged);
        assert!(
            list_blocks_impl(&state, "2026-02-17".to_string())
                .expect("list blocks")
                .is_empty()
        );
    }

    #[test]
    fn convert_requires_both_actual_bounds() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let result = convert_block_to_log_impl(
            &state,
            1,
            Some("2026-02-16T09:15:00Z".to_string()),
            None,
            false,
        );
        assert!(matches!(result, Err(ScheduleError::InvalidInput(_))));
    }

    #[test]
    fn reschedule_delete_and_conflicts_flow() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let first = create_block_impl(
            &state,
            "A".to_string(),
            "2026-02-16T09:00:00Z".to_string(),
            "2026-02-16T10:00:00Z".to_string(),
        )
        .expect("create");
        let second = create_block_impl(
            &state,
            "B".to_string(),
            "2026-02-16T11:00:00Z".to_string(),
            "2026-02-16T12:00:00Z".to_string(),
        )
        .expect("create");
        let second_id = second.id.expect("id");

        assert!(find_conflicts_impl(&state, second_id).expect("conflicts").is_empty());
        reschedule_block_impl(
            &state,
            second_id,
            "2026-02-16T09:30:00Z".to_string(),
            "2026-02-16T10:30:00Z".to_string(),
        )
        .expect("reschedule");
        let conflicts = find_conflicts_impl(&state, second_id).expect("conflicts");
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].id, first.id);

        assert!(delete_block_impl(&state, second_id).expect("delete"));
        assert!(!delete_block_impl(&state, second_id).expect("delete again"));
    }

    #[test]
    fn plan_task_materializes_stored_rule() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let rule = RecurrenceRule::until(
            Frequency::Daily,
            DateTime::parse_from_rfc3339("2026-02-16T07:00:00Z")
                .expect("valid datetime")
                .with_timezone(&Utc),
            DateTime::parse_from_rfc3339("2026-02-18T07:00:00Z")
                .expect("valid datetime")
                .with_timezone(&Utc),
        )
        .expect("valid rule");
        let task = Task::new("Journal").with_recurrence(&rule).expect("serialize rule");
        let store = SqliteRecordStore::new(workspace.path.join("state").join("dayplan.sqlite"));
        let task_id = store.add(TASKS, &task).expect("add task");

        let blocks =
            plan_task_impl(&state, task_id, 10, "2026-02-01".to_string()).expect("plan task");
        assert_eq!(blocks.len(), 3);
        assert!(blocks.iter().all(|block| block.task_id == Some(task_id)));
        assert_eq!(
            list_blocks_impl(&state, "2026-02-17".to_string())
                .expect("list")
                .len(),
            1
        );
    }

    fn read_log_lines(workspace: &TempWorkspace) -> Vec<serde_json::Value> {
        let raw = fs::read_to_string(workspace.path.join("logs").join("commands.log"))
            .unwrap_or_default();
        raw.lines()
            .map(|line| serde_json::from_str::<serde_json::Value>(line).expect("json line"))
            .collect()
    }

    #[test]
    fn every_command_appends_one_log_line_including_failures() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let block = create_block_impl(
            &state,
            "Logged".to_string(),
            "2026-02-16T09:00:00Z".to_string(),
            "2026-02-16T09:30:00Z".to_string(),
        )
        .expect("create");
        let block_id = block.id.expect("id");

        list_blocks_impl(&state, "2026-02-16".to_string()).expect("list");
        find_conflicts_impl(&state, block_id).expect("conflicts");
        let missing = find_conflicts_impl(&state, 404).expect_err("missing block");
        assert_eq!(missing.to_string(), "time_blocks record not found: 404");
        create_block_impl(
            &state,
            "Bad".to_string(),
            "bad".to_string(),
            "bad".to_string(),
        )
        .expect_err("unparsable times");
        preview_recurrence_impl(
            &state,
            "{}".to_string(),
            3,
            "2026-02-16".to_string(),
        )
        .expect_err("empty rule");
        delete_block_impl(&state, block_id).expect("delete");

        let lines = read_log_lines(&workspace);
        let summary = lines
            .iter()
            .map(|line| {
                (
                    line["command"].as_str().unwrap_or_default().to_string(),
                    line["level"].as_str().unwrap_or_default().to_string(),
                )
            })
            .collect::<Vec<_>>();
        let expected = [
            ("create_block", "info"),
            ("list_blocks", "info"),
            ("find_conflicts", "info"),
            ("find_conflicts", "error"),
            ("create_block", "error"),
            ("preview_recurrence", "error"),
            ("delete_block", "info"),
        ]
        .iter()
        .map(|(command, level)| (command.to_string(), level.to_string()))
        .collect::<Vec<_>>();
        assert_eq!(summary, expected);
        assert_eq!(lines[3]["message"], "time_blocks record not found: 404");
        assert!(lines.iter().all(|line| line["timestamp"].is_string()));
    }
}
