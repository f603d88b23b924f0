//! Runtime configuration from the environment (and `.env`).
//!
//! | Variable               | Default          | Description                               |
//! |------------------------|------------------|-------------------------------------------|
//! | `ASSETHUB_BIND`        | `127.0.0.1:3000` | Address the web server listens on         |
//! | `ASSETHUB_SERVICE_URL` | --               | Remote spreadsheet API endpoint           |
//! | `ASSETHUB_SHEET`       | `마스터파일`      | Remote sheet used for reads and writes    |
//! | `ASSETHUB_COOLDOWN_MS` | `1500`           | Pause after a review before scanning again |
//! | `ASSETHUB_VERIFY_SYNC` | `false`          | Read the sheet back after every write     |
//! | `ASSETHUB_SNAPSHOT`    | --               | Session snapshot file                     |

use std::path::PathBuf;
use std::time::Duration;

use crate::audit::DEFAULT_COOLDOWN;
use crate::error::Result;
use crate::remote::validate_service_url;

pub const DEFAULT_BIND: &str = "127.0.0.1:3000";
pub const DEFAULT_SHEET: &str = "마스터파일";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub bind: String,
    pub service_url: Option<String>,
    pub sheet: String,
    pub cooldown: Duration,
    pub verify_sync: bool,
    pub snapshot: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bind: DEFAULT_BIND.to_string(),
            service_url: None,
            sheet: DEFAULT_SHEET.to_string(),
            cooldown: DEFAULT_COOLDOWN,
            verify_sync: false,
            snapshot: None,
        }
    }
}

impl Config {
    /// Read configuration, loading `.env` first when present.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset or blank values fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Config::default();

        let service_url = match get("ASSETHUB_SERVICE_URL") {
            Some(url) => Some(validate_service_url(&url)?),
            None => None,
        };

        Ok(Config {
            bind: get("ASSETHUB_BIND").unwrap_or(defaults.bind),
            service_url,
            sheet: get("ASSETHUB_SHEET").unwrap_or(defaults.sheet),
            cooldown: get("ASSETHUB_COOLDOWN_MS")
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.cooldown),
            verify_sync: get("ASSETHUB_VERIFY_SYNC")
                .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
                .unwrap_or(defaults.verify_sync),
            snapshot: get("ASSETHUB_SNAPSHOT").map(PathBuf::from),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn values_are_parsed() {
        let config = Config::from_lookup(lookup(&[
            ("ASSETHUB_SERVICE_URL", " https://script.example/exec "),
            ("ASSETHUB_COOLDOWN_MS", "2000"),
            ("ASSETHUB_VERIFY_SYNC", "TRUE"),
            ("ASSETHUB_SHEET", "2025 실사"),
        ]))
        .unwrap();
        assert_eq!(config.service_url.as_deref(), Some("https://script.example/exec"));
        assert_eq!(config.cooldown, Duration::from_millis(2000));
        assert!(config.verify_sync);
        assert_eq!(config.sheet, "2025 실사");
    }

    #[test]
    fn spreadsheet_link_is_rejected() {
        let result = Config::from_lookup(lookup(&[(
            "ASSETHUB_SERVICE_URL",
            "https://docs.google.com/spreadsheets/d/abc/edit",
        )]));
        assert!(result.is_err());
    }
}
