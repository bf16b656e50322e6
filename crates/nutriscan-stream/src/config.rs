use std::time::Duration;

use crate::errors::StreamError;

const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Configuration for the report API client.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Base URL of the report API (scheme, host, optional path prefix).
    pub base_url: String,
    /// Overall timeout for single-document requests (upload receipt, report fetch).
    ///
    /// Streaming uploads are not bounded by this; see `StreamPolicy::idle_timeout`.
    pub timeout: Duration,
    /// Timeout for establishing the TCP/TLS connection.
    pub connect_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(120),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::default().base_url(base_url)
    }

    /// Builds a config from `NUTRISCAN_API_URL` and `NUTRISCAN_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self, StreamError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ClientConfig::from_env`] with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, StreamError> {
        let mut config = Self::default();
        if let Some(url) = lookup("NUTRISCAN_API_URL").filter(|v| !v.trim().is_empty()) {
            config.base_url = url.trim().to_string();
        }
        if let Some(secs) = parse_secs(&lookup, "NUTRISCAN_TIMEOUT_SECS")? {
            config.timeout = secs;
        }
        config.validate()?;
        Ok(config)
    }

    /// Overrides the API base URL (for proxies or test servers).
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), StreamError> {
        let url = self.base_url.trim();
        if url.is_empty() {
            return Err(StreamError::Config("base_url must not be empty".into()));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(StreamError::Config(format!(
                "base_url must start with http:// or https://, got {url}"
            )));
        }
        Ok(())
    }

    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url.trim().trim_end_matches('/'))
    }

    pub(crate) fn stream_upload_url(&self) -> String {
        self.endpoint("/api/upload/stream")
    }

    pub(crate) fn upload_url(&self) -> String {
        self.endpoint("/api/upload")
    }

    pub(crate) fn report_url(&self, report_id: &str) -> String {
        self.endpoint(&format!("/api/reports/{report_id}"))
    }
}

/// Whether progress step numbers are validated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SequencePolicy {
    /// Accept any step number (the server's historical behavior).
    #[default]
    Unchecked,
    /// Steps must be 1, 2, 3, ... ; anything else fails the session.
    Strict,
}

/// Per-attempt stream handling options.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StreamPolicy {
    pub sequence: SequencePolicy,
    /// Fail the attempt when no chunk arrives within this duration.
    pub idle_timeout: Option<Duration>,
    /// Delay between the server accepting the upload and the session
    /// entering `running`. Purely cosmetic.
    pub pacing_delay: Option<Duration>,
}

impl StreamPolicy {
    /// Reads `NUTRISCAN_STRICT_SEQUENCE`, `NUTRISCAN_IDLE_TIMEOUT_SECS` and
    /// `NUTRISCAN_PACING_MS`.
    pub fn from_env() -> Result<Self, StreamError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, StreamError> {
        let mut policy = Self::default();
        if let Some(raw) = lookup("NUTRISCAN_STRICT_SEQUENCE") {
            let strict = parse_bool(&raw).ok_or_else(|| {
                StreamError::Config(format!("invalid NUTRISCAN_STRICT_SEQUENCE: {raw}"))
            })?;
            if strict {
                policy.sequence = SequencePolicy::Strict;
            }
        }
        policy.idle_timeout = parse_secs(&lookup, "NUTRISCAN_IDLE_TIMEOUT_SECS")?;
        if let Some(raw) = lookup("NUTRISCAN_PACING_MS") {
            let ms: u64 = raw.trim().parse().map_err(|_| {
                StreamError::Config(format!("invalid NUTRISCAN_PACING_MS: {raw}"))
            })?;
            policy.pacing_delay = (ms > 0).then(|| Duration::from_millis(ms));
        }
        Ok(policy)
    }

    pub fn strict_sequence(mut self) -> Self {
        self.sequence = SequencePolicy::Strict;
        self
    }

    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    pub fn pacing_delay(mut self, delay: Duration) -> Self {
        self.pacing_delay = Some(delay);
        self
    }
}

pub(crate) fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" | "enabled" => Some(true),
        "0" | "false" | "no" | "off" | "disabled" => Some(false),
        _ => None,
    }
}

fn parse_secs(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<Duration>, StreamError> {
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    let secs: u64 = raw
        .trim()
        .parse()
        .map_err(|_| StreamError::Config(format!("invalid {key}: {raw}")))?;
    if secs == 0 {
        return Err(StreamError::Config(format!("{key} must be greater than 0")));
    }
    Ok(Some(Duration::from_secs(secs)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_env_is_empty() {
        let config = ClientConfig::from_lookup(lookup(&[])).expect("config");
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.timeout, Duration::from_secs(120));
        assert_eq!(StreamPolicy::from_lookup(lookup(&[])).expect("policy"), StreamPolicy::default());
    }

    #[test]
    fn client_config_reads_url_and_timeout() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("NUTRISCAN_API_URL", "https://api.example.test/"),
            ("NUTRISCAN_TIMEOUT_SECS", "30"),
        ]))
        .expect("config");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(
            config.stream_upload_url(),
            "https://api.example.test/api/upload/stream"
        );
        assert_eq!(
            config.report_url("abc"),
            "https://api.example.test/api/reports/abc"
        );
    }

    #[test]
    fn client_config_rejects_bad_values() {
        let err = ClientConfig::from_lookup(lookup(&[("NUTRISCAN_API_URL", "ftp://x")]))
            .expect_err("scheme");
        assert!(matches!(err, StreamError::Config(msg) if msg.contains("http://")));
        let err = ClientConfig::from_lookup(lookup(&[("NUTRISCAN_TIMEOUT_SECS", "soon")]))
            .expect_err("timeout");
        assert!(matches!(err, StreamError::Config(msg) if msg.contains("NUTRISCAN_TIMEOUT_SECS")));
    }

    #[test]
    fn stream_policy_reads_all_knobs() {
        let policy = StreamPolicy::from_lookup(lookup(&[
            ("NUTRISCAN_STRICT_SEQUENCE", "yes"),
            ("NUTRISCAN_IDLE_TIMEOUT_SECS", "45"),
            ("NUTRISCAN_PACING_MS", "800"),
        ]))
        .expect("policy");
        assert_eq!(policy.sequence, SequencePolicy::Strict);
        assert_eq!(policy.idle_timeout, Some(Duration::from_secs(45)));
        assert_eq!(policy.pacing_delay, Some(Duration::from_millis(800)));
    }

    #[test]
    fn stream_policy_rejects_zero_idle_timeout_and_bad_bool() {
        assert!(StreamPolicy::from_lookup(lookup(&[("NUTRISCAN_IDLE_TIMEOUT_SECS", "0")])).is_err());
        assert!(StreamPolicy::from_lookup(lookup(&[("NUTRISCAN_STRICT_SEQUENCE", "maybe")])).is_err());
    }

    #[test]
    fn parse_bool_accepts_common_spellings() {
        assert_eq!(parse_bool(" ON "), Some(true));
        assert_eq!(parse_bool("disabled"), Some(false));
        assert_eq!(parse_bool("2"), None);
    }
}
