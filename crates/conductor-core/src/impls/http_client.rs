//! HttpPolicyClient - reqwest implementation of PolicyClient
//!
//! One request per call: the state goes out as a JSON body to
//! `<endpoint>/v1/prediction`, the response body must decode into an
//! [`Action`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::domain::{Action, Endpoint, InferenceError, State};
use crate::ports::PolicyClient;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// HTTP method used for the prediction call.
///
/// Exported policy servers accept the JSON body on either; `Get` is what the
/// existing control loops send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestMethod {
    #[default]
    Get,
    Post,
}

/// Stateless HTTP client.
///
/// `reqwest::Client` pools connections internally, so one instance can be
/// shared by every session in the process.
#[derive(Debug, Clone)]
pub struct HttpPolicyClient {
    client: Client,
    method: RequestMethod,
    timeout: Duration,
}

impl HttpPolicyClient {
    pub fn new(method: RequestMethod, timeout: Duration) -> reqwest::Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("conductor/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_client(client, method, timeout))
    }

    /// Wrap an already configured `reqwest::Client` (proxy, TLS roots, ...).
    pub fn with_client(client: Client, method: RequestMethod, timeout: Duration) -> Self {
        Self {
            client,
            method,
            timeout,
        }
    }

    pub fn method(&self) -> RequestMethod {
        self.method
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn transport_error(&self, endpoint: &Endpoint, err: reqwest::Error) -> InferenceError {
        if err.is_timeout() {
            InferenceError::Timeout {
                endpoint: endpoint.to_string(),
                after: self.timeout,
            }
        } else {
            InferenceError::Unreachable {
                endpoint: endpoint.to_string(),
                reason: err.to_string(),
            }
        }
    }
}

#[async_trait]
impl PolicyClient for HttpPolicyClient {
    async fn infer(&self, endpoint: &Endpoint, state: &State) -> Result<Action, InferenceError> {
        let url = endpoint.prediction_url().clone();
        let request = match self.method {
            RequestMethod::Get => self.client.get(url),
            RequestMethod::Post => self.client.post(url),
        };

        let response = request
            .json(state)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.transport_error(endpoint, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(InferenceError::BadResponse {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| self.transport_error(endpoint, e))?;

        Action::from_json_slice(&body).map_err(|e| InferenceError::SchemaMismatch {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })
    }
}
