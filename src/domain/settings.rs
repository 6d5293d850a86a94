use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SchedulingSettings {
    pub timezone: String,
    pub default_gap_minutes: u32,
    pub pomodoro_work_minutes: u32,
    pub short_break_minutes: u32,
    pub long_break_minutes: u32,
    pub sessions_before_long_break: u32,
}

impl Default for SchedulingSettings {
    fn default() -> Self {
        Self {
            timezone: "UTC".to_string(),
            default_gap_minutes: 0,
            pomodoro_work_minutes: 25,
            short_break_minutes: 5,
            long_break_minutes: 15,
            sessions_before_long_break: 4,
        }
    }
}

impl SchedulingSettings {
    pub fn validate(&self) -> Result<(), String> {
        self.timezone
            .trim()
            .parse::<Tz>()
            .map_err(|_| format!("settings.timezone is not a known zone: {}", self.timezone))?;
        if self.pomodoro_work_minutes == 0 {
            return Err("settings.pomodoro_work_minutes must be > 0".to_string());
        }
        if self.short_break_minutes == 0 {
            return Err("settings.short_break_minutes must be > 0".to_string());
        }
        if self.long_break_minutes < self.short_break_minutes {
            return Err(
                "settings.long_break_minutes must be >= settings.short_break_minutes".to_string(),
            );
        }
        if self.sessions_before_long_break == 0 {
            return Err("settings.sessions_before_long_break must be > 0".to_string());
        }
        Ok(())
    }

    pub fn timezone(&self) -> Tz {
        self.timezone.trim().parse::<Tz>().unwrap_or(Tz::UTC)
    }

    pub fn is_long_break_due(&self, completed_sessions: u32) -> bool {
        completed_sessions > 0
            && self.sessions_before_long_break > 0
            && completed_sessions % self.sessions_before_long_break == 0
    }

    pub fn break_minutes_after(&self, completed_sessions: u32) -> u32 {
        if self.is_long_break_due(completed_sessions) {
            self.long_break_minutes
        } else {
            self.short_break_minutes
        }
    }
}
