use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};

use super::{StateError, TerraformState};

/// Client for a Terraform HTTP state backend (`terraform { backend "http" { address = ... } }`).
#[derive(Clone)]
pub struct StateClient {
    client: reqwest::Client,
    address: String,
}

impl StateClient {
    pub fn new(address: String, token: Option<String>) -> Result<Self, StateError> {
        let mut headers = HeaderMap::new();

        if let Some(token) = token {
            let auth_value = format!("Bearer {}", token);
            let header_value =
                HeaderValue::from_str(&auth_value).map_err(|_| StateError::Auth {
                    message: "Invalid token format".to_string(),
                })?;
            headers.insert(AUTHORIZATION, header_value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(StateError::Network)?;

        Ok(Self { client, address })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    // NOTE: The http backend answers 204/404 when no state has been written yet
    pub async fn fetch_state(&self) -> Result<TerraformState, StateError> {
        let response = self.client.get(&self.address).send().await?;
        let status = response.status();

        if status == StatusCode::NO_CONTENT || status == StatusCode::NOT_FOUND {
            tracing::debug!(address = %self.address, status = status.as_u16(), "no state stored");
            return Ok(TerraformState::empty());
        }

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(StateError::Auth {
                message: format!("backend returned {}", status.as_u16()),
            });
        }

        let body = response.text().await?;

        if !status.is_success() {
            let message = if body.trim().is_empty() {
                "Unknown error".to_string()
            } else {
                body.trim().to_string()
            };
            return Err(StateError::Backend {
                status: status.as_u16(),
                message,
            });
        }

        TerraformState::parse(&body)
    }
}

impl std::fmt::Debug for StateClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateClient")
            .field("address", &self.address)
            .field("token", &"[REDACTED]")
            .finish()
    }
}
