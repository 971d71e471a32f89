use crate::error::IngestError;

use common::RedactedToken;

use std::time::Duration;

use url::Url;

pub const DEFAULT_PATH_SUFFIX: &str = "/ws";
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Query parameter carrying the credential.
pub const ACCESS_TOKEN_PARAM: &str = "accessToken";

/// Everything one ingestion connection needs.
#[derive(Debug, Clone)]
pub struct IngestSettings {
    /// Account name, used to tag log lines.
    pub account: String,
    pub base_url: String,
    pub path_suffix: String,
    pub access_token: RedactedToken,
    pub heartbeat_interval: Duration,
    /// Fixed wait between a drop and the next dial.
    pub reconnect_delay: Duration,
    pub connect_timeout: Duration,
}

impl IngestSettings {
    pub fn new(
        account: impl Into<String>,
        base_url: impl Into<String>,
        access_token: RedactedToken,
    ) -> Self {
        Self {
            account: account.into(),
            base_url: base_url.into(),
            path_suffix: DEFAULT_PATH_SUFFIX.to_string(),
            access_token,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    pub fn with_path_suffix(mut self, path_suffix: impl Into<String>) -> Self {
        self.path_suffix = path_suffix.into();
        self
    }

    pub fn with_heartbeat_interval(mut self, heartbeat_interval: Duration) -> Self {
        self.heartbeat_interval = heartbeat_interval;
        self
    }

    pub fn with_reconnect_delay(mut self, reconnect_delay: Duration) -> Self {
        self.reconnect_delay = reconnect_delay;
        self
    }

    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    /// Base URL and suffix joined, without the credential. Safe to log.
    pub fn display_endpoint(&self) -> String {
        format!(
            "{}{}",
            self.base_url.trim_end_matches('/'),
            self.path_suffix
        )
    }

    /// Full WebSocket URL including the `accessToken` query parameter.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Endpoint`] if the joined URL does not parse, uses a
    /// scheme other than `ws`/`wss`, or the credential is blank.
    pub fn endpoint_url(&self) -> Result<Url, IngestError> {
        if self.access_token.is_empty() {
            return Err(IngestError::endpoint(format!(
                "Account {} has no access token",
                self.account
            )));
        }

        let mut url = Url::parse(&self.display_endpoint())?;

        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(IngestError::endpoint(format!(
                "Unsupported scheme '{}' in {}",
                url.scheme(),
                self.display_endpoint()
            )));
        }

        url.query_pairs_mut()
            .append_pair(ACCESS_TOKEN_PARAM, self.access_token.expose());

        Ok(url)
    }
}
