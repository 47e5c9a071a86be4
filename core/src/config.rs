/// Configuration management
use crate::error::{FeedError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8787/api/v1/";
const DEFAULT_BLOKS_VERSION: &str = "e097ac2261d546784637b3df264aa3275cb6281d706d91484f43c207d6661931";

/// Client-side request spacing for the timeline pager
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PacingConfig {
    /// Minimum gap between two feed requests
    pub min_spacing: Duration,

    /// Upper bound of the random jitter added on top of `min_spacing`
    pub jitter: Duration,

    /// Minimum gap while backfilling an under-full page
    pub backfill_spacing: Duration,

    /// Jitter bound while backfilling
    pub backfill_jitter: Duration,

    /// Idle time after which the next fetch is a warm start
    pub warm_threshold: Duration,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            min_spacing: Duration::from_secs(4),
            jitter: Duration::from_secs(2),
            backfill_spacing: Duration::from_secs(2),
            backfill_jitter: Duration::from_secs(1),
            warm_threshold: Duration::from_secs(10 * 60),
        }
    }
}

impl PacingConfig {
    /// Spacing and jitter for the current fetch mode
    pub fn window(&self, backfilling: bool) -> (Duration, Duration) {
        if backfilling {
            (self.backfill_spacing, self.backfill_jitter)
        } else {
            (self.min_spacing, self.jitter)
        }
    }
}

/// Session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL every endpoint path is joined onto
    pub base_url: String,

    /// Device UUID, sent as `_uuid` and feed `device_id`
    pub uuid: String,

    /// Android-style device id, sent as `device_id` on direct messages
    pub device_id: String,

    /// Advertising id for the feed `X-Google-AD-ID` header
    pub adid: String,

    /// Seconds east of UTC
    pub timezone_offset: i32,

    pub bloks_versioning_id: String,

    /// Per-request timeout
    pub request_timeout: Duration,

    /// How long the pager waits for a tray prefetch after its own page
    pub tray_timeout: Duration,

    /// Upper bound of extra pages fetched to fill one under-full page
    pub max_backfill_pages: u32,

    pub pacing: PacingConfig,
}

impl Default for Config {
    fn default() -> Self {
        let uuid = Uuid::new_v4().to_string();
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            device_id: format!("android-{}", &uuid.replace('-', "")[..16]),
            uuid,
            adid: Uuid::new_v4().to_string(),
            timezone_offset: 0,
            bloks_versioning_id: DEFAULT_BLOKS_VERSION.to_string(),
            request_timeout: Duration::from_secs(30),
            tray_timeout: Duration::from_secs(5),
            max_backfill_pages: 10,
            pacing: PacingConfig::default(),
        }
    }
}

impl Config {
    /// Create config from command line arguments
    pub fn from_args(args: &[String]) -> Result<Self> {
        let mut config = Self::default();

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--base-url" => {
                    config.base_url = flag_value(args, i, "--base-url")?.to_string();
                    i += 2;
                }
                "--uuid" => {
                    config.uuid = flag_value(args, i, "--uuid")?.to_string();
                    i += 2;
                }
                "--device-id" => {
                    config.device_id = flag_value(args, i, "--device-id")?.to_string();
                    i += 2;
                }
                "--timezone-offset" => {
                    let v = flag_value(args, i, "--timezone-offset")?;
                    config.timezone_offset = v.parse::<i32>().map_err(|_| {
                        FeedError::Config("--timezone-offset must be a number of seconds".to_string())
                    })?;
                    i += 2;
                }
                "--timeout-secs" => {
                    let v = flag_value(args, i, "--timeout-secs")?;
                    config.request_timeout = Duration::from_secs(v.parse::<u64>().map_err(|_| {
                        FeedError::Config("--timeout-secs must be a positive number".to_string())
                    })?);
                    i += 2;
                }
                "--max-backfill" => {
                    let v = flag_value(args, i, "--max-backfill")?;
                    config.max_backfill_pages = v.parse::<u32>().map_err(|_| {
                        FeedError::Config("--max-backfill must be a positive number".to_string())
                    })?;
                    i += 2;
                }
                other if !other.starts_with("--") && i == 1 => {
                    // Bare first argument is the base URL
                    config.base_url = other.to_string();
                    i += 1;
                }
                other => {
                    return Err(FeedError::Config(format!("Unknown argument: {}", other)));
                }
            }
        }

        // Env overrides (nice for scripts)
        if let Ok(url) = std::env::var("THREADLINE_BASE_URL") {
            config.base_url = url;
        }
        if let Ok(uuid) = std::env::var("THREADLINE_UUID") {
            config.uuid = uuid;
        }
        if let Some(secs) = std::env::var("THREADLINE_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
        {
            config.request_timeout = Duration::from_secs(secs);
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the client cannot work with
    pub fn validate(&self) -> Result<()> {
        if !self.base_url.starts_with("http://") {
            return Err(FeedError::Config(format!(
                "base URL must be plain http://, got {}",
                self.base_url
            )));
        }
        if self.uuid.is_empty() {
            return Err(FeedError::Config("uuid must not be empty".to_string()));
        }
        Ok(())
    }

    /// Join an endpoint path onto the base URL
    pub fn url_for(&self, endpoint: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }
}

fn flag_value<'a>(args: &'a [String], i: usize, flag: &str) -> Result<&'a str> {
    args.get(i + 1)
        .map(String::as_str)
        .ok_or_else(|| FeedError::Config(format!("{} requires an argument", flag)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_from_args_flags() {
        let config = Config::from_args(&args(&[
            "threadline",
            "http://localhost:9000/",
            "--device-id",
            "android-abc",
            "--timezone-offset",
            "3600",
            "--max-backfill",
            "3",
        ]))
        .unwrap();

        assert_eq!(config.device_id, "android-abc");
        assert_eq!(config.timezone_offset, 3600);
        assert_eq!(config.max_backfill_pages, 3);
        assert_eq!(config.url_for("feed/timeline/"), "http://localhost:9000/feed/timeline/");
    }

    #[test]
    fn test_from_args_rejects_bad_values() {
        assert!(Config::from_args(&args(&["threadline", "--timezone-offset", "abc"])).is_err());
        assert!(Config::from_args(&args(&["threadline", "--uuid"])).is_err());
        assert!(Config::from_args(&args(&["threadline", "https://secure.example"])).is_err());
    }

    #[test]
    fn test_pacing_window() {
        let pacing = PacingConfig::default();
        assert_eq!(pacing.window(false), (Duration::from_secs(4), Duration::from_secs(2)));
        assert_eq!(pacing.window(true), (Duration::from_secs(2), Duration::from_secs(1)));
    }
}
