use serde::{Deserialize, Serialize};

fn default_schema_version() -> u32 {
    1
}

/// Filename and state-line presentation toggles. All transforms are off unless
/// explicitly enabled.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub ignore_brackets: bool,
    pub ignore_filetype: bool,
    pub replace_underscore: bool,
    pub replace_dots: bool,
    pub show_remaining_time: bool,
}

/// Poll cadences and the position-drift thresholds of the update gate. The
/// thresholds are tuned to the one-second connected poll; they are exposed
/// here rather than hardcoded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigIntervals {
    pub connected_poll_ms: u64,
    pub retry_poll_ms: u64,
    pub playing_delta_ms: u64,
    pub paused_delta_ms: u64,
}

impl Default for ConfigIntervals {
    fn default() -> Self {
        Self {
            connected_poll_ms: 1_000,
            retry_poll_ms: 15_000,
            playing_delta_ms: 800,
            paused_delta_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub discord_app_id: String,
    /// Web interface port of the local player. Also the target of the
    /// presence button URL.
    pub port: u16,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub intervals: ConfigIntervals,
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            discord_app_id: "427863248734388224".to_string(),
            port: 13579,
            display: DisplayConfig::default(),
            intervals: ConfigIntervals::default(),
            log_level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::AppConfig;

    #[test]
    fn partial_toml_fills_defaults() {
        let cfg: AppConfig = toml::from_str(
            r#"
            discord_app_id = "123"
            port = 13579
            log_level = "debug"

            [display]
            ignore_brackets = true
            "#,
        )
        .unwrap();

        assert!(cfg.display.ignore_brackets);
        assert!(!cfg.display.show_remaining_time);
        assert_eq!(cfg.intervals.playing_delta_ms, 800);
        assert_eq!(cfg.schema_version, 1);
    }
}
