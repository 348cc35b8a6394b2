use config::Config;
use config::ConfigError;
use config::Environment;
use config::File;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub discord_token: String,
    pub database_url: String,
    pub server_id: u64,
    #[serde(default)]
    pub reminder: ReminderSettings,
    #[serde(default)]
    pub log: LogSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReminderSettings {
    /// Cron expression driving the reminder sweep.
    #[serde(default = "default_reminder_schedule")]
    pub schedule: String,
    /// Send the final (1-2h) reminder only once per raid.
    #[serde(default)]
    pub final_reminder_once: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
    pub directory: Option<String>,
}

fn default_reminder_schedule() -> String {
    // every 30 minutes
    "0 0/30 * * * *".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ReminderSettings {
    fn default() -> Self {
        Self {
            schedule: default_reminder_schedule(),
            final_reminder_once: false,
        }
    }
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            directory: None,
        }
    }
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name("config/config").required(false))
            .add_source(Environment::with_prefix("RAIDBOT").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reminder_defaults_to_half_hour_sweep() {
        let reminder = ReminderSettings::default();

        assert_eq!(reminder.schedule, "0 0/30 * * * *");
        assert!(!reminder.final_reminder_once);
    }

    #[test]
    fn deserializes_nested_sections() {
        let s = Config::builder()
            .add_source(File::from_str(
                r#"
                discord_token = "token"
                database_url = "postgres://localhost/raids"
                server_id = 42

                [reminder]
                final_reminder_once = true

                [log]
                json = true
                "#,
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap();

        let settings: Settings = s.try_deserialize().unwrap();

        assert_eq!(settings.server_id, 42);
        assert!(settings.reminder.final_reminder_once);
        assert_eq!(settings.reminder.schedule, "0 0/30 * * * *");
        assert!(settings.log.json);
        assert_eq!(settings.log.level, "info");
    }
}
