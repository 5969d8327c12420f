//! Client settings: where the debate service lives and how long to wait on it.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tokio::time::Instant;

use crate::error::DebateError;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";
pub const ENV_BASE_URL: &str = "DEBATE_API_URL";
pub const ENV_STREAM_TIMEOUT: &str = "DEBATE_STREAM_TIMEOUT_SECS";
/// Longest stream timeout accepted: one day.
pub const MAX_STREAM_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

/// Connection settings for [`DebateClient`](crate::session::DebateClient).
#[derive(Debug, Clone, PartialEq)]
pub struct ClientSettings {
    /// Base URL of the debate API (e.g. `http://127.0.0.1:8000`).
    pub base_url: String,
    /// TCP connection timeout for every request.
    pub connect_timeout: Duration,
    /// Whole-request timeout for the registering call.
    pub handshake_timeout: Duration,
    /// Wall-clock budget from stream open to a terminating frame.
    pub stream_timeout: Duration,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

/// On-disk shape; every key optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SettingsFile {
    base_url: Option<String>,
    connect_timeout_secs: Option<u64>,
    handshake_timeout_secs: Option<u64>,
    stream_timeout_secs: Option<u64>,
}

impl ClientSettings {
    /// Defaults aimed at `base_url`.
    ///
    /// - connect_timeout: 10 s
    /// - handshake_timeout: 30 s
    /// - stream_timeout: 300 s
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: trim_base(base_url.into()),
            connect_timeout: Duration::from_secs(10),
            handshake_timeout: Duration::from_secs(30),
            stream_timeout: Duration::from_secs(300),
        }
    }

    pub fn stream_timeout(mut self, timeout: Duration) -> Self {
        self.stream_timeout = timeout;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Parse a TOML document on top of the defaults.
    pub fn from_toml_str(src: &str) -> Result<Self, DebateError> {
        let file: SettingsFile =
            toml::from_str(src).map_err(|e| DebateError::Settings(e.to_string()))?;
        let mut settings = ClientSettings::default();
        if let Some(url) = file.base_url {
            settings.base_url = trim_base(url);
        }
        if let Some(s) = file.connect_timeout_secs {
            settings.connect_timeout = Duration::from_secs(s);
        }
        if let Some(s) = file.handshake_timeout_secs {
            settings.handshake_timeout = Duration::from_secs(s);
        }
        if let Some(s) = file.stream_timeout_secs {
            settings.stream_timeout = Duration::from_secs(s);
        }
        settings.check()?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self, DebateError> {
        let src = std::fs::read_to_string(path)
            .map_err(|e| DebateError::Settings(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&src)
    }

    /// Apply `DEBATE_API_URL` / `DEBATE_STREAM_TIMEOUT_SECS` from the process environment.
    pub fn with_env(self) -> Result<Self, DebateError> {
        self.with_env_from(|k| std::env::var(k).ok())
    }

    pub fn with_env_from(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, DebateError> {
        if let Some(url) = lookup(ENV_BASE_URL).filter(|u| !u.trim().is_empty()) {
            self.base_url = trim_base(url);
        }
        if let Some(raw) = lookup(ENV_STREAM_TIMEOUT) {
            let secs: u64 = raw.trim().parse().map_err(|_| {
                DebateError::Settings(format!("{ENV_STREAM_TIMEOUT} must be whole seconds, got {raw:?}"))
            })?;
            self.stream_timeout = Duration::from_secs(secs);
        }
        self.check()?;
        Ok(self)
    }

    /// Validate the URL scheme and the stream timeout bounds.
    pub fn check(&self) -> Result<(), DebateError> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(DebateError::Settings(format!(
                "base_url must be an http(s) URL, got {:?}",
                self.base_url
            )));
        }
        if self.stream_timeout.is_zero() {
            return Err(DebateError::Settings("stream timeout must be non-zero".into()));
        }
        if self.stream_timeout > MAX_STREAM_TIMEOUT {
            return Err(DebateError::Settings(format!(
                "stream timeout must be at most {}s, got {}s",
                MAX_STREAM_TIMEOUT.as_secs(),
                self.stream_timeout.as_secs()
            )));
        }
        Ok(())
    }

    /// Wall-clock deadline for a stream opened now.
    pub(crate) fn stream_deadline(&self) -> Result<Instant, DebateError> {
        Instant::now().checked_add(self.stream_timeout).ok_or_else(|| {
            DebateError::Settings(format!(
                "stream timeout of {}s is out of range",
                self.stream_timeout.as_secs()
            ))
        })
    }

    pub(crate) fn start_url(&self) -> String {
        format!("{}/api/debate/start", self.base_url)
    }

    pub(crate) fn stream_url(&self, debate_id: &str) -> String {
        format!("{}/api/debate/{}/stream", self.base_url, debate_id)
    }

    pub(crate) fn judge_url(&self, debate_id: &str) -> String {
        format!("{}/api/debate/{}/judge/llm", self.base_url, debate_id)
    }

    pub(crate) fn health_url(&self) -> String {
        format!("{}/api/health", self.base_url)
    }
}

fn trim_base(url: String) -> String {
    url.trim().trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let s = ClientSettings::default();
        assert_eq!(s.base_url, "http://127.0.0.1:8000");
        assert_eq!(s.connect_timeout, Duration::from_secs(10));
        assert_eq!(s.stream_timeout, Duration::from_secs(300));
    }

    #[test]
    fn test_new_trims_trailing_slash() {
        let s = ClientSettings::new("http://debate.local:9000/");
        assert_eq!(s.start_url(), "http://debate.local:9000/api/debate/start");
        assert_eq!(s.stream_url("3"), "http://debate.local:9000/api/debate/3/stream");
        assert_eq!(s.judge_url("3"), "http://debate.local:9000/api/debate/3/judge/llm");
        assert_eq!(s.health_url(), "http://debate.local:9000/api/health");
    }

    #[test]
    fn test_toml_overrides_defaults() {
        let s = ClientSettings::from_toml_str(
            r#"
            base_url = "https://debate.example.com"
            stream_timeout_secs = 60
            "#,
        )
        .unwrap();
        assert_eq!(s.base_url, "https://debate.example.com");
        assert_eq!(s.stream_timeout, Duration::from_secs(60));
        assert_eq!(s.handshake_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_empty_toml_is_defaults() {
        assert_eq!(ClientSettings::from_toml_str("").unwrap(), ClientSettings::default());
    }

    #[test]
    fn test_toml_unknown_key_rejected() {
        let err = ClientSettings::from_toml_str("retries = 3").unwrap_err();
        assert!(matches!(err, DebateError::Settings(_)));
    }

    #[test]
    fn test_toml_bad_url_rejected() {
        assert!(ClientSettings::from_toml_str(r#"base_url = "ftp://x""#).is_err());
    }

    #[test]
    fn test_toml_zero_timeout_rejected() {
        assert!(ClientSettings::from_toml_str("stream_timeout_secs = 0").is_err());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("debate-stream.toml");
        std::fs::write(&path, "connect_timeout_secs = 2\n").unwrap();
        let s = ClientSettings::from_file(&path).unwrap();
        assert_eq!(s.connect_timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_from_missing_file() {
        let err = ClientSettings::from_file(Path::new("/nonexistent/debate.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/debate.toml"));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_BASE_URL, "https://prod.example.com/"),
            (ENV_STREAM_TIMEOUT, "45"),
        ]
        .into_iter()
        .collect();
        let s = ClientSettings::default()
            .with_env_from(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(s.base_url, "https://prod.example.com");
        assert_eq!(s.stream_timeout, Duration::from_secs(45));
    }

    #[test]
    fn test_env_bad_timeout() {
        let err = ClientSettings::default()
            .with_env_from(|k| (k == ENV_STREAM_TIMEOUT).then(|| "soon".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains(ENV_STREAM_TIMEOUT));
    }

    #[test]
    fn test_toml_timeout_above_bound_rejected() {
        let err = ClientSettings::from_toml_str("stream_timeout_secs = 1000000000000")
            .unwrap_err();
        assert!(err.to_string().contains("at most"), "{err}");
        assert!(ClientSettings::from_toml_str("stream_timeout_secs = 86400").is_ok());
    }

    #[test]
    fn test_env_timeout_above_bound_rejected() {
        let err = ClientSettings::default()
            .with_env_from(|k| (k == ENV_STREAM_TIMEOUT).then(|| u64::MAX.to_string()))
            .unwrap_err();
        assert!(matches!(err, DebateError::Settings(_)));
    }

    #[test]
    fn test_builder_timeout_checked() {
        let s = ClientSettings::default().stream_timeout(Duration::MAX);
        assert!(s.check().is_err());
        assert!(s.stream_deadline().is_err());
        assert!(ClientSettings::default().stream_deadline().is_ok());
    }

    #[test]
    fn test_env_absent_keeps_settings() {
        let s = ClientSettings::new("http://a:1").with_env_from(|_| None).unwrap();
        assert_eq!(s.base_url, "http://a:1");
    }
}
