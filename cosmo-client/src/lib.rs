//! Cosmo HTTP Client
//!
//! A small, typed client for the solver service's HTTP API.
//!
//! # Example
//!
//! ```no_run
//! use cosmo_client::SolverClient;
//! use cosmo_core::dto::job::SubmitJob;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = SolverClient::new("http://localhost:8080");
//!
//!     let submitted = client.submit(&SubmitJob {
//!         potential_expression: Some("(0.1*Tanh(x(1)/Sqrt(6)))**2".to_string()),
//!         field_values: Some(vec![6.33]),
//!         field_velocities: Some(vec![0.0]),
//!         ..SubmitJob::default()
//!     }).await?;
//!
//!     println!("Started execution {}", submitted.execution_id);
//!     Ok(())
//! }
//! ```

pub mod error;
mod files;
mod jobs;

pub use error::{ClientError, Result};

use reqwest::Client;
use serde::de::DeserializeOwned;

/// Path prefix of every API route
pub const API_PREFIX: &str = "/api/cosmo-perturbations";

/// HTTP client for the solver service
#[derive(Debug, Clone)]
pub struct SolverClient {
    /// Base URL of the service (e.g., "http://localhost:8080")
    base_url: String,
    client: Client,
}

impl SolverClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a client with a configured reqwest Client (timeouts, proxies, TLS)
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Full URL of an API route, e.g. `url("/health")`
    fn url(&self, route: &str) -> String {
        format!("{}{}{}", self.base_url, API_PREFIX, route)
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Handle an API response and deserialize JSON
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            return Err(error_from(status.as_u16(), response).await);
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }

    /// Handle an API response with a raw body
    async fn handle_bytes(&self, response: reqwest::Response) -> Result<Vec<u8>> {
        let status = response.status();

        if !status.is_success() {
            return Err(error_from(status.as_u16(), response).await);
        }

        Ok(response.bytes().await?.to_vec())
    }
}

async fn error_from(status: u16, response: reqwest::Response) -> ClientError {
    let text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    ClientError::api_error(status, error_message(&text))
}

/// Pulls the human-readable message out of an error body
///
/// The service answers with `{"error": ..}` or `{"success": false, "message": ..}`;
/// anything else is passed through as is.
pub(crate) fn error_message(body: &str) -> String {
    let Ok(json) = serde_json::from_str::<serde_json::Value>(body) else {
        return body.to_string();
    };

    ["error", "message"]
        .iter()
        .find_map(|key| json.get(key).and_then(|v| v.as_str()))
        .map(str::to_string)
        .unwrap_or_else(|| body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = SolverClient::new("http://localhost:8080");
        assert_eq!(client.base_url(), "http://localhost:8080");
    }

    #[test]
    fn test_client_trims_trailing_slash() {
        let client = SolverClient::new("http://localhost:8080/");
        assert_eq!(client.base_url(), "http://localhost:8080");
        assert_eq!(
            client.url("/health"),
            "http://localhost:8080/api/cosmo-perturbations/health"
        );
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(
            error_message(r#"{"error":"Missing parameter values for: m"}"#),
            "Missing parameter values for: m"
        );
        assert_eq!(
            error_message(r#"{"success":false,"message":"Execution not found"}"#),
            "Execution not found"
        );
        assert_eq!(error_message("plain failure"), "plain failure");
        assert_eq!(error_message(r#"{"other":1}"#), r#"{"other":1}"#);
    }
}
