// Shared transport configuration for building reqwest::Client instances.
//
// The Steam and Discord clients share timeout and user-agent settings
// through this module, avoiding duplicated builder logic.

use std::time::Duration;

use reqwest::header::HeaderMap;

const USER_AGENT: &str = concat!(
    "serverboard/",
    env!("CARGO_PKG_VERSION"),
    " (https://github.com/serverboard/serverboard)"
);

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Per-request timeout.
    pub timeout: Duration,
    /// User-Agent header sent with every request.
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            user_agent: USER_AGENT.to_owned(),
        }
    }
}

impl TransportConfig {
    /// Config with a custom request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build a `reqwest::Client` from this config.
    pub fn build_client(&self) -> Result<reqwest::Client, crate::error::Error> {
        self.build_client_with_headers(HeaderMap::new())
    }

    /// Build a `reqwest::Client` with additional default headers.
    ///
    /// Used by the Discord client to inject the `Authorization: Bot …` header.
    pub fn build_client_with_headers(
        &self,
        headers: HeaderMap,
    ) -> Result<reqwest::Client, crate::error::Error> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(self.user_agent.as_str())
            .default_headers(headers)
            .build()
            .map_err(|e| {
                crate::error::Error::ClientSetup(format!("failed to build HTTP client: {e}"))
            })
    }
}
