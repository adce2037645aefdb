//! Application settings (spec.md section 6, "Configuration"). Loaded from
//! the `settings:` block of the active `config/*.yaml` the way the teacher's
//! `Settings` is, but every field here also falls back to an environment
//! variable so a deployment can override without touching the config file.

use std::env;
use std::time::Duration;

use loco_rs::app::AppContext;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Settings {
    pub meeting_gap_hours: f64,
    pub cluster_debounce_ttl_secs: u64,
    pub cluster_retry_delay_secs: u64,
    pub cluster_max_retries: u32,
    pub process_job_timeout_secs: u64,
    pub cluster_job_timeout_secs: u64,
    pub storage_root: String,
    pub thumb_max_edge: u32,
    pub redis_url: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            meeting_gap_hours: 4.0,
            cluster_debounce_ttl_secs: 5,
            cluster_retry_delay_secs: 3,
            cluster_max_retries: 2,
            process_job_timeout_secs: 120,
            cluster_job_timeout_secs: 60,
            storage_root: "./storage".to_string(),
            thumb_max_edge: 512,
            redis_url: "redis://127.0.0.1:6379".to_string(),
        }
    }
}

impl Settings {
    /// Reads settings from the active config's `settings:` block, then lets
    /// an environment variable of the same name (spec.md section 6) override
    /// any field present in the environment.
    ///
    /// # Panics
    /// When the settings field can't be deserialized to the expected shape.
    #[must_use]
    pub fn from_context(ctx: &AppContext) -> Self {
        let mut settings = ctx
            .config
            .settings
            .clone()
            .and_then(|value| serde_json::from_value(value).ok())
            .unwrap_or_default();
        Self::apply_env_overrides(&mut settings);
        settings
    }

    fn apply_env_overrides(settings: &mut Self) {
        if let Some(v) = env_parsed("MEETING_GAP_HOURS") {
            settings.meeting_gap_hours = v;
        }
        if let Some(v) = env_parsed("CLUSTER_DEBOUNCE_TTL") {
            settings.cluster_debounce_ttl_secs = v;
        }
        if let Some(v) = env_parsed("CLUSTER_RETRY_DELAY") {
            settings.cluster_retry_delay_secs = v;
        }
        if let Some(v) = env_parsed("CLUSTER_MAX_RETRIES") {
            settings.cluster_max_retries = v;
        }
        if let Some(v) = env_parsed("PROCESS_JOB_TIMEOUT") {
            settings.process_job_timeout_secs = v;
        }
        if let Some(v) = env_parsed("CLUSTER_JOB_TIMEOUT") {
            settings.cluster_job_timeout_secs = v;
        }
        if let Ok(v) = env::var("STORAGE_ROOT") {
            settings.storage_root = v;
        }
        if let Some(v) = env_parsed("THUMB_MAX_EDGE") {
            settings.thumb_max_edge = v;
        }
        if let Ok(v) = env::var("REDIS_URL") {
            settings.redis_url = v;
        }
    }

    #[must_use]
    pub fn meeting_gap(&self) -> chrono::Duration {
        chrono::Duration::milliseconds((self.meeting_gap_hours * 3_600_000.0) as i64)
    }

    #[must_use]
    pub fn debounce_ttl(&self) -> Duration {
        Duration::from_secs(self.cluster_debounce_ttl_secs)
    }

    #[must_use]
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.cluster_retry_delay_secs)
    }
}

fn env_parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_gap_is_four_hours() {
        let settings = Settings::default();
        assert_eq!(settings.meeting_gap(), chrono::Duration::hours(4));
    }
}
