use std::time::Duration;

const DEFAULT_BASE_URL: &str = "http://localhost:8080";
const DEFAULT_API_KEY: &str = "dummy-key";

/// Configuration for a GoLLuM endpoint.
#[derive(Clone, Debug)]
pub struct GollumConfig {
    /// Bearer credential sent with every request.
    ///
    /// GoLLuM does not verify credentials, but the header shape is always
    /// sent for OpenAI-API compatibility.
    pub api_key: String,
    /// Base URL of the server, without the `/v1` suffix.
    pub base_url: String,
    /// Default HTTP timeout for requests, including streamed bodies.
    pub timeout: Duration,
}

impl Default for GollumConfig {
    fn default() -> Self {
        Self {
            api_key: DEFAULT_API_KEY.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(120),
        }
    }
}

impl GollumConfig {
    /// Creates a config pointing at the default local endpoint.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a config from `GOLLUM_BASE_URL` and `GOLLUM_API_KEY`.
    ///
    /// Both variables are optional; unset or blank values fall back to the
    /// local defaults.
    pub fn from_env() -> Self {
        Self::from_vars(
            std::env::var("GOLLUM_BASE_URL").ok(),
            std::env::var("GOLLUM_API_KEY").ok(),
        )
    }

    pub(crate) fn from_vars(base_url: Option<String>, api_key: Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(base_url) = base_url.filter(|v| !v.trim().is_empty()) {
            config.base_url = base_url;
        }
        if let Some(api_key) = api_key.filter(|v| !v.trim().is_empty()) {
            config.api_key = api_key;
        }
        config
    }

    /// Overrides the server base URL.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Overrides the bearer credential.
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self
    }

    /// Overrides the default HTTP timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub(crate) fn chat_completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'))
    }

    pub(crate) fn models_url(&self) -> String {
        format!("{}/v1/models", self.base_url.trim_end_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_local_endpoint() {
        let config = GollumConfig::new();
        assert_eq!(config.base_url, "http://localhost:8080");
        assert_eq!(config.api_key, "dummy-key");
    }

    #[test]
    fn env_values_override_defaults_and_blanks_do_not() {
        let config = GollumConfig::from_vars(Some("http://10.0.0.5:9090".into()), Some("  ".into()));
        assert_eq!(config.base_url, "http://10.0.0.5:9090");
        assert_eq!(config.api_key, "dummy-key");
    }

    #[test]
    fn url_helpers_tolerate_trailing_slash() {
        let config = GollumConfig::new().base_url("http://localhost:8080/");
        assert_eq!(
            config.chat_completions_url(),
            "http://localhost:8080/v1/chat/completions"
        );
        assert_eq!(config.models_url(), "http://localhost:8080/v1/models");
    }
}
