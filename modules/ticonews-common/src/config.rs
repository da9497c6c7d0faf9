use std::env;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{NaiveDate, NaiveTime};
use chrono_tz::Tz;

/// Application configuration loaded from environment variables.
///
/// Each service has its own loader that fills only the sections it needs;
/// the rest stay at their defaults. Missing required variables abort before
/// the main loop starts.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root of the metadata/news file tree.
    pub data_dir: PathBuf,
    pub database_url: String,
    /// Source timezone (IANA). CRHoy publishes in Costa Rica local time.
    pub timezone: Tz,
    pub api_base: String,

    pub sync: SyncConfig,
    pub downloader: DownloaderConfig,
    pub llm: LlmConfig,
    pub notifier: NotifierConfig,
}

#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Earliest day the index is expected to cover.
    pub first_day: NaiveDate,
    pub check_updates_interval: Duration,
    /// How many gap days one cycle may backfill.
    pub days_chunk_size: u32,
}

#[derive(Debug, Clone)]
pub struct DownloaderConfig {
    pub download_interval: Duration,
    pub downloads_chunk_size: u32,
    /// Source category paths that mark an article skipped without download.
    pub ignore_categories: Vec<String>,
    pub request_timeout: Duration,
    pub max_retries: u32,
    /// Articles older than this are downloaded but not analyzed.
    pub analysis_age_horizon: Duration,
    pub force_analysis: bool,
    /// Languages the translator produces in addition to English.
    pub summary_languages: Vec<String>,
}

/// One LLM model role: which model, and its request window.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub model: String,
    pub request_limit: u32,
    pub request_limit_period: Duration,
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Engine name. Only "claude" is recognized; anything else is a
    /// configuration error at startup.
    pub engine: String,
    pub api_key: String,
    /// Main analysis model (classifier, labeler, namer, finalizer).
    pub basic: ModelConfig,
    /// Cheaper model for summarization and translation.
    pub light: ModelConfig,
    /// Schema-reparse model for engines without native structured output.
    pub supplementary: Option<ModelConfig>,
    pub requires_supplementary: bool,
    pub keep_raw_engine_responses: bool,
    pub raw_engine_responses_dir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct NotifierConfig {
    /// Local wall-clock times (source timezone) at which one publication
    /// cycle runs.
    pub trigger_times: Vec<NaiveTime>,
    /// Safety margin the selection window extends behind the previous
    /// trigger, to tolerate analysis lag.
    pub window_shift: Duration,
    /// Upper bound on one refined-sleep quantum while idle.
    pub max_inactivity_interval: Duration,
    pub bot_token: String,
    pub channel_id: String,
    pub notification_language: String,
    pub message_delay: Duration,
    pub sent_log_retention_days: u32,
    pub max_retries: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            first_day: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            check_updates_interval: Duration::from_secs(300),
            days_chunk_size: 5,
        }
    }
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            download_interval: Duration::from_secs(60),
            downloads_chunk_size: 10,
            ignore_categories: Vec::new(),
            request_timeout: Duration::from_secs(30),
            max_retries: 3,
            analysis_age_horizon: Duration::from_secs(48 * 3600),
            force_analysis: false,
            summary_languages: vec!["ru".to_string()],
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            engine: "claude".to_string(),
            api_key: String::new(),
            basic: ModelConfig {
                model: String::new(),
                request_limit: 10,
                request_limit_period: Duration::from_secs(60),
            },
            light: ModelConfig {
                model: String::new(),
                request_limit: 10,
                request_limit_period: Duration::from_secs(60),
            },
            supplementary: None,
            requires_supplementary: false,
            keep_raw_engine_responses: false,
            raw_engine_responses_dir: None,
        }
    }
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            trigger_times: Vec::new(),
            window_shift: Duration::from_secs(1800),
            max_inactivity_interval: Duration::from_secs(300),
            bot_token: String::new(),
            channel_id: String::new(),
            notification_language: "ru".to_string(),
            message_delay: Duration::from_secs(3),
            sent_log_retention_days: 3,
            max_retries: 3,
        }
    }
}

impl Config {
    fn base_from_env() -> Self {
        Self {
            data_dir: PathBuf::from(required_env("DATA_DIR")),
            database_url: required_env("DATABASE_URL"),
            timezone: env::var("SOURCE_TIMEZONE")
                .unwrap_or_else(|_| "America/Costa_Rica".to_string())
                .parse()
                .unwrap_or_else(|_| panic!("SOURCE_TIMEZONE must be a valid IANA zone")),
            api_base: env::var("CRHOY_API_BASE")
                .unwrap_or_else(|_| "https://api.crhoy.net".to_string()),
            sync: SyncConfig::default(),
            downloader: DownloaderConfig::default(),
            llm: LlmConfig::default(),
            notifier: NotifierConfig::default(),
        }
    }

    /// Load config for the synchronizer.
    pub fn sync_from_env() -> Self {
        let mut config = Self::base_from_env();
        config.sync = SyncConfig {
            first_day: required_env("FIRST_DAY")
                .parse()
                .unwrap_or_else(|_| panic!("FIRST_DAY must be YYYY-MM-DD")),
            check_updates_interval: duration_env("CHECK_UPDATES_INTERVAL", 300),
            days_chunk_size: numeric_env("DAYS_CHUNK_SIZE", 5),
        };
        config
    }

    /// Load config for the downloader (source fetch + LLM analysis).
    /// Notifier trigger times are also loaded: download priority depends on
    /// the current notification window.
    pub fn downloader_from_env() -> Self {
        let mut config = Self::base_from_env();
        config.downloader = DownloaderConfig {
            download_interval: duration_env("DOWNLOAD_INTERVAL", 60),
            downloads_chunk_size: numeric_env("DOWNLOADS_CHUNK_SIZE", 10),
            ignore_categories: csv_env("IGNORE_CATEGORIES"),
            request_timeout: duration_env("REQUEST_TIMEOUT", 30),
            max_retries: numeric_env("MAX_RETRIES", 3),
            analysis_age_horizon: Duration::from_secs(
                numeric_env::<u64>("ANALYSIS_AGE_HORIZON_HOURS", 48) * 3600,
            ),
            force_analysis: bool_env("FORCE_ANALYSIS"),
            summary_languages: {
                let langs = csv_env("SUMMARY_LANGUAGES");
                if langs.is_empty() {
                    vec!["ru".to_string()]
                } else {
                    langs
                }
            },
        };
        config.llm = LlmConfig::llm_from_env();
        config.notifier.trigger_times = trigger_times_env();
        config.notifier.window_shift = duration_env("WINDOW_SHIFT", 1800);
        config
    }

    /// Load config for the notifier.
    pub fn notifier_from_env() -> Self {
        let mut config = Self::base_from_env();
        config.notifier = NotifierConfig {
            trigger_times: trigger_times_env(),
            window_shift: duration_env("WINDOW_SHIFT", 1800),
            max_inactivity_interval: duration_env("MAX_INACTIVITY_INTERVAL", 300),
            bot_token: required_env("BOT_TOKEN"),
            channel_id: required_env("CHANNEL_ID"),
            notification_language: env::var("NOTIFICATION_LANGUAGE")
                .unwrap_or_else(|_| "ru".to_string()),
            message_delay: duration_env("MESSAGE_DELAY", 3),
            sent_log_retention_days: numeric_env("SENT_LOG_RETENTION_DAYS", 3),
            max_retries: numeric_env("MAX_RETRIES", 3),
        };
        if config.notifier.trigger_times.is_empty() {
            panic!("TRIGGER_TIMES must contain at least one HH:MM entry");
        }
        config
    }

    /// Log the presence of each sensitive variable without exposing values.
    pub fn log_redacted(&self) {
        let vars = [
            ("DATABASE_URL", self.database_url.len()),
            ("LLM_API_KEY", self.llm.api_key.len()),
            ("BOT_TOKEN", self.notifier.bot_token.len()),
        ];
        for (name, len) in vars {
            if len == 0 {
                tracing::info!("{name} = (empty)");
            } else {
                tracing::info!("{name} = ({len} chars)");
            }
        }
    }
}

impl LlmConfig {
    fn llm_from_env() -> Self {
        let requires_supplementary = bool_env("LLM_REQUIRES_SUPPLEMENTARY");
        Self {
            engine: env::var("LLM_ENGINE").unwrap_or_else(|_| "claude".to_string()),
            api_key: required_env("LLM_API_KEY"),
            basic: ModelConfig::role_from_env("BASIC"),
            light: ModelConfig::role_from_env("LIGHT"),
            supplementary: if requires_supplementary {
                Some(ModelConfig::role_from_env("SUPPLEMENTARY"))
            } else {
                None
            },
            requires_supplementary,
            keep_raw_engine_responses: bool_env("KEEP_RAW_ENGINE_RESPONSES"),
            raw_engine_responses_dir: env::var("RAW_ENGINE_RESPONSES_DIR").ok().map(PathBuf::from),
        }
    }
}

impl ModelConfig {
    fn role_from_env(role: &str) -> Self {
        Self {
            model: required_env(&format!("LLM_{role}_MODEL")),
            request_limit: numeric_env(&format!("LLM_{role}_REQUEST_LIMIT"), 10),
            request_limit_period: duration_env(&format!("LLM_{role}_REQUEST_LIMIT_PERIOD"), 60),
        }
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}

fn numeric_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn duration_env(key: &str, default_secs: u64) -> Duration {
    Duration::from_secs(numeric_env(key, default_secs))
}

fn bool_env(key: &str) -> bool {
    matches!(
        env::var(key).unwrap_or_default().to_lowercase().as_str(),
        "1" | "true" | "yes"
    )
}

fn csv_env(key: &str) -> Vec<String> {
    env::var(key)
        .unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// `TRIGGER_TIMES` is a JSON array of "HH:MM" strings in the source timezone.
fn trigger_times_env() -> Vec<NaiveTime> {
    let raw = match env::var("TRIGGER_TIMES") {
        Ok(v) => v,
        Err(_) => return Vec::new(),
    };
    let entries: Vec<String> = serde_json::from_str(&raw)
        .unwrap_or_else(|_| panic!("TRIGGER_TIMES must be a JSON array of HH:MM strings"));
    let mut times: Vec<NaiveTime> = entries
        .iter()
        .map(|t| {
            NaiveTime::parse_from_str(t, "%H:%M")
                .unwrap_or_else(|_| panic!("TRIGGER_TIMES entry '{t}' is not HH:MM"))
        })
        .collect();
    times.sort();
    times.dedup();
    times
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_parsing_trims_and_drops_empty() {
        std::env::set_var("TEST_CSV_CATS", "deportes, sucesos ,,economia");
        let cats = csv_env("TEST_CSV_CATS");
        assert_eq!(cats, vec!["deportes", "sucesos", "economia"]);
    }

    #[test]
    fn trigger_times_sorted_and_deduped() {
        std::env::set_var("TRIGGER_TIMES", r#"["16:30", "06:00", "12:00", "06:00"]"#);
        let times = trigger_times_env();
        assert_eq!(
            times,
            vec![
                NaiveTime::from_hms_opt(6, 0, 0).unwrap(),
                NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
                NaiveTime::from_hms_opt(16, 30, 0).unwrap(),
            ]
        );
        std::env::remove_var("TRIGGER_TIMES");
    }

    #[test]
    fn bool_env_accepts_common_forms() {
        std::env::set_var("TEST_BOOL_ON", "TRUE");
        assert!(bool_env("TEST_BOOL_ON"));
        assert!(!bool_env("TEST_BOOL_MISSING"));
    }
}
