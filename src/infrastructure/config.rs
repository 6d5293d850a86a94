use crate::domain::settings::SchedulingSettings;
use crate::infrastructure::error::InfraError;
use std::fs;
use std::path::Path;

const SETTINGS_JSON: &str = "settings.json";
const SCHEMA_VERSION: u64 = 1;

fn default_settings_file() -> Result<serde_json::Value, InfraError> {
    let mut value = serde_json::to_value(SchedulingSettings::default())?;
    if let Some(object) = value.as_object_mut() {
        object.insert("schema".to_string(), serde_json::Value::from(SCHEMA_VERSION));
    }
    Ok(value)
}

pub fn ensure_default_configs(config_dir: &Path) -> Result<(), InfraError> {
    let path = config_dir.join(SETTINGS_JSON);
    if !path.exists() {
        let formatted = serde_json::to_string_pretty(&default_settings_file()?)?;
        fs::write(path, format!("{formatted}\n"))?;
    }
    Ok(())
}

fn read_config(path: &Path) -> Result<serde_json::Value, InfraError> {
    let raw = fs::read_to_string(path)?;
    let parsed: serde_json::Value = serde_json::from_str(&raw)?;
    let schema = parsed
        .get("schema")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| InfraError::InvalidConfig(format!("missing schema in {}", path.display())))?;
    if schema != SCHEMA_VERSION {
        return Err(InfraError::InvalidConfig(format!(
            "unsupported schema {} in {}",
            schema,
            path.display()
        )));
    }
    Ok(parsed)
}

pub fn load_settings(config_dir: &Path) -> Result<SchedulingSettings, InfraError> {
    let path = config_dir.join(SETTINGS_JSON);
    let mut merged = default_settings_file()?;
    let parsed = read_config(&path)?;
    let (Some(target), Some(source)) = (merged.as_object_mut(), parsed.as_object()) else {
        return Err(InfraError::InvalidConfig(format!(
            "invalid object structure in {}",
            path.display()
        )));
    };
    for (key, value) in source {
        target.insert(key.clone(), value.clone());
    }

    let settings: SchedulingSettings = serde_json::from_value(merged)?;
    settings.validate().map_err(InfraError::InvalidConfig)?;
    Ok(settings)
}

pub fn save_settings(config_dir: &Path, settings: &SchedulingSettings) -> Result<(), InfraError> {
    settings.validate().map_err(InfraError::InvalidConfig)?;
    let mut value = serde_json::to_value(settings)?;
    if let Some(object) = value.as_object_mut() {
        object.insert("schema".to_string(), serde_json::Value::from(SCHEMA_VERSION));
    }
    let formatted = serde_json::to_string_pretty(&value)?;
    fs::write(config_dir.join(SETTINGS_JSON), format!("{formatted}\n"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static NEXT_TEMP_DIR: AtomicUsize = AtomicUsize::new(0);

    struct TempConfigDir {
        path: PathBuf,
    }

    impl TempConfigDir {
        fn new() -> Self {
            let sequence = NEXT_TEMP_DIR.fetch_add(1, Ordering::Relaxed);
            let path = std::env::temp_dir().join(format!(
                "dayplan-config-tests-{}-{}",
                std::process::id(),
                sequence
            ));
            fs::create_dir_all(&path).expect("create temp config dir");
            Self { path }
        }
    }

    impl Drop for TempConfigDir {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.path);
        }
    }

    #[test]
    fn defaults_are_written_once_and_loaded() {
        let dir = TempConfigDir::new();
        ensure_default_configs(&dir.path).expect("write defaults");
        let settings = load_settings(&dir.path).expect("load settings");
        assert_eq!(settings, SchedulingSettings::default());

        let custom = SchedulingSettings {
            timezone: "Asia/Tokyo".to_string(),
            default_gap_minutes: 10,
            ..SchedulingSettings::default()
        };
        save_settings(&dir.path, &custom).expect("save settings");
        ensure_default_configs(&dir.path).expect("defaults keep existing file");
        assert_eq!(load_settings(&dir.path).expect("reload"), custom);
    }

    #[test]
    fn partial_file_falls_back_to_defaults_per_key() {
        let dir = TempConfigDir::new();
        fs::write(
            dir.path.join(SETTINGS_JSON),
            r#"{"schema":1,"timezone":"Europe/Berlin","pomodoroWorkMinutes":50}"#,
        )
        .expect("write settings");

        let settings = load_settings(&dir.path).expect("load settings");
        assert_eq!(settings.timezone, "Europe/Berlin");
        assert_eq!(settings.pomodoro_work_minutes, 50);
        assert_eq!(settings.short_break_minutes, 5);
    }

    #[test]
    fn unsupported_schema_and_invalid_values_are_rejected() {
        let dir = TempConfigDir::new();
        fs::write(dir.path.join(SETTINGS_JSON), r#"{"schema":2}"#).expect("write settings");
        assert!(matches!(
            load_settings(&dir.path),
            Err(InfraError::InvalidConfig(_))
        ));

        fs::write(
            dir.path.join(SETTINGS_JSON),
            r#"{"schema":1,"timezone":"Nowhere/Special"}"#,
        )
        .expect("write settings");
        assert!(matches!(
            load_settings(&dir.path),
            Err(InfraError::InvalidConfig(_))
        ));
    }
}
