//! Client for the remote configuration endpoint.

use crate::config_sync::identity::lookup_url;
use crate::error::SyncError;

use models::MachineIdentity;

use std::time::Duration;

use log::debug;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Map, Value};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Response envelope.
///
/// The configuration lives either under `worker.configs` or directly at the root next
/// to `success`; anything not captured by a named field lands in `root_fields`.
#[derive(Debug, Deserialize)]
pub struct ConfigEnvelope {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub worker: Option<WorkerSection>,
    #[serde(flatten)]
    pub root_fields: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct WorkerSection {
    #[serde(default)]
    pub configs: Option<Value>,
}

impl ConfigEnvelope {
    /// Resolve the configuration document, preferring `worker.configs`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Protocol`] when `success` is false or no non-empty object
    /// can be found in either location.
    pub fn into_configuration(self) -> Result<Value, SyncError> {
        if !self.success {
            let reason = self.error.unwrap_or_else(|| String::from("no error given"));
            return Err(SyncError::protocol(format!("Endpoint reported failure: {reason}")));
        }

        if let Some(configs) = self.worker.and_then(|worker| worker.configs) {
            return match configs {
                Value::Object(map) if !map.is_empty() => Ok(Value::Object(map)),
                Value::Object(_) | Value::Null => {
                    Err(SyncError::protocol("worker.configs is empty"))
                }
                _ => Err(SyncError::protocol("worker.configs is not an object")),
            };
        }

        if self.root_fields.is_empty() {
            return Err(SyncError::protocol("Response carries no configuration"));
        }

        Ok(Value::Object(self.root_fields))
    }
}

/// Issues the single lookup request of one poll attempt.
#[derive(Clone)]
pub struct ConfigClient {
    endpoint: String,
    client: Client,
}

impl ConfigClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, SyncError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::from_reqwest(&e))?;

        Ok(Self {
            endpoint: endpoint.into(),
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Fetch and resolve the configuration for `identity`.
    pub async fn fetch(&self, identity: &MachineIdentity) -> Result<Value, SyncError> {
        let url = lookup_url(&self.endpoint, identity)?;
        debug!("[config-sync] GET {url}");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SyncError::from_reqwest(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::from_http_response(status.as_u16(), body));
        }

        let envelope: ConfigEnvelope = response
            .json()
            .await
            .map_err(|e| SyncError::from_reqwest(&e))?;

        envelope.into_configuration()
    }
}
