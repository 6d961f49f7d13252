use std::num::NonZeroUsize;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:5000/api";
const DEFAULT_PAGE_SIZE: NonZeroUsize = NonZeroUsize::new(10).unwrap();

/// Runtime settings, read from the environment (and `.env` if present).
/// CLI flags override individual fields after loading.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    pub page_size: NonZeroUsize,
    pub search_debounce: Duration,
    pub notification_ttl: Duration,
    /// Upper bound on one HTTP call, connect through body.
    pub http_timeout: Duration,
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            search_debounce: Duration::from_millis(250),
            notification_ttl: Duration::from_secs(5),
            http_timeout: Duration::from_secs(30),
            log_filter: "jobtrack=info".to_string(),
        }
    }
}

impl Config {
    /// `overrides` (variable name, value) come from CLI flags and take
    /// precedence over the environment, so a flag can replace a bad variable.
    pub fn from_env(overrides: &[(&str, String)]) -> Result<Self> {
        dotenvy::dotenv().ok(); // .env is optional
        Self::from_lookup(|key| override_for(overrides, key).or_else(|| std::env::var(key).ok()))
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Config::default();

        let page_size = match lookup("JOBTRACK_PAGE_SIZE") {
            Some(raw) => parse_page_size(&raw).context("JOBTRACK_PAGE_SIZE")?,
            None => defaults.page_size,
        };

        let search_debounce = match lookup("JOBTRACK_SEARCH_DEBOUNCE_MS") {
            Some(raw) => Duration::from_millis(parse_number("JOBTRACK_SEARCH_DEBOUNCE_MS", &raw)?),
            None => defaults.search_debounce,
        };

        let notification_ttl = match lookup("JOBTRACK_NOTIFY_SECS") {
            Some(raw) => Duration::from_secs(parse_number("JOBTRACK_NOTIFY_SECS", &raw)?),
            None => defaults.notification_ttl,
        };

        let http_timeout = match lookup("JOBTRACK_HTTP_TIMEOUT_SECS") {
            Some(raw) => match parse_number("JOBTRACK_HTTP_TIMEOUT_SECS", &raw)? {
                0 => bail!("JOBTRACK_HTTP_TIMEOUT_SECS must be greater than zero"),
                secs => Duration::from_secs(secs),
            },
            None => defaults.http_timeout,
        };

        Ok(Config {
            api_url: lookup("JOBTRACK_API_URL").unwrap_or(defaults.api_url),
            page_size,
            search_debounce,
            notification_ttl,
            http_timeout,
            log_filter: lookup("RUST_LOG").unwrap_or(defaults.log_filter),
        })
    }
}

fn override_for(overrides: &[(&str, String)], key: &str) -> Option<String> {
    overrides
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, value)| value.clone())
}

fn parse_number(var: &str, raw: &str) -> Result<u64> {
    raw.trim()
        .parse()
        .with_context(|| format!("{var} must be a whole number, got '{raw}'"))
}

/// Page sizes must be positive; zero is a configuration error.
pub fn parse_page_size(raw: &str) -> Result<NonZeroUsize> {
    let n: usize = raw
        .trim()
        .parse()
        .with_context(|| format!("page size must be a positive integer, got '{raw}'"))?;
    NonZeroUsize::new(n).ok_or_else(|| anyhow!("page size must be greater than zero"))
}
