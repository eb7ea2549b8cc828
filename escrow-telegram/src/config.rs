//! Transport settings: token, API base URL and the two timeouts.

use std::time::Duration;

pub const DEFAULT_API_URL: &str = "https://api.telegram.org";

#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    /// Bot API base URL, without the `/bot<token>` part.
    pub api_url: String,
    /// Long-poll `timeout` sent to `getUpdates`.
    pub poll_timeout: Duration,
    /// Budget for one HTTP call, added on top of `poll_timeout` for `getUpdates`.
    pub http_timeout: Duration,
}

impl TelegramConfig {
    /// Uses the given token with the public API URL and default timeouts.
    pub fn with_token(bot_token: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            api_url: DEFAULT_API_URL.to_string(),
            poll_timeout: Duration::from_secs(30),
            http_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    pub fn with_poll_timeout(mut self, poll_timeout: Duration) -> Self {
        self.poll_timeout = poll_timeout;
        self
    }

    pub fn with_http_timeout(mut self, http_timeout: Duration) -> Self {
        self.http_timeout = http_timeout;
        self
    }

    /// `<api_url>/bot<token>/<method>`.
    pub fn method_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.api_url.trim_end_matches('/'),
            self.bot_token,
            method
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_token() {
        let config = TelegramConfig::with_token("test_token");
        assert_eq!(config.bot_token, "test_token");
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.poll_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_method_url_trims_trailing_slash() {
        let config = TelegramConfig::with_token("abc").with_api_url("http://127.0.0.1:8081/");
        assert_eq!(
            config.method_url("getUpdates"),
            "http://127.0.0.1:8081/botabc/getUpdates"
        );
    }
}
