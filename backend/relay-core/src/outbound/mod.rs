//! Outbound text replies to the chat platform.
//!
//! One POST per message, no retry. Callers decide what a failed send means.

use crate::config::AccountConfig;
use crate::error::OutboundError;

use common::{ErrorLocation, HttpStatusCode, RedactedToken};

use std::panic::Location;
use std::time::Duration;

use log::debug;
use reqwest::Client;
use serde::Serialize;
use url::Url;

const DEFAULT_TIMEOUT_DURATION: Duration = Duration::from_secs(30);

/// A text reply addressed to one user within one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundText {
    pub user_id: String,
    pub task_id: String,
    pub content: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SendBody<'a> {
    app_id: &'a str,
    agent_id: &'a str,
    user_id: &'a str,
    task_id: &'a str,
    access_token: &'a str,
    data: SendData<'a>,
}

#[derive(Serialize)]
struct SendData<'a> {
    content: &'a str,
}

#[derive(Clone)]
pub struct OutboundClient {
    send_url: Url,
    app_id: String,
    agent_id: String,
    access_token: RedactedToken,
    client: Client,
}

impl OutboundClient {
    pub fn new(
        send_url: &str,
        app_id: impl Into<String>,
        agent_id: impl Into<String>,
        access_token: RedactedToken,
    ) -> Result<Self, OutboundError> {
        let send_url = Url::parse(send_url)?;
        let client = Client::builder().timeout(DEFAULT_TIMEOUT_DURATION).build()?;

        Ok(Self {
            send_url,
            app_id: app_id.into(),
            agent_id: agent_id.into(),
            access_token,
            client,
        })
    }

    pub fn from_account(account: &AccountConfig) -> Result<Self, OutboundError> {
        Self::new(
            &account.send_url,
            account.app_id.clone(),
            account.agent_id.clone(),
            account.token(),
        )
    }

    pub fn send_url(&self) -> &Url {
        &self.send_url
    }

    /// POST one text message.
    ///
    /// # Errors
    ///
    /// Returns [`OutboundError::Status`] for a non-2xx response and
    /// [`OutboundError::Http`] when the request could not be made.
    pub async fn send_text(&self, message: &OutboundText) -> Result<(), OutboundError> {
        let body = SendBody {
            app_id: &self.app_id,
            agent_id: &self.agent_id,
            user_id: &message.user_id,
            task_id: &message.task_id,
            access_token: self.access_token.expose(),
            data: SendData {
                content: &message.content,
            },
        };

        debug!(
            "[outbound] POST {} (user {}, task {}, {} chars)",
            self.send_url,
            message.user_id,
            message.task_id,
            message.content.len()
        );

        let response = self
            .client
            .post(self.send_url.clone())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(OutboundError::Status {
                status_code: HttpStatusCode(status.as_u16()),
                message: response.text().await.unwrap_or_default(),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        Ok(())
    }
}
