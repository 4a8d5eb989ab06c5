//! Pipetask HTTP Client
//!
//! A small, typed HTTP client for the build service's deployment API.
//!
//! Tasks use it to publish traceability records (for example the details of a
//! pushed container image) back to the project collection that runs them.
//!
//! # Example
//!
//! ```no_run
//! use pipetask_client::DeploymentClient;
//!
//! # async fn example(details: pipetask_core::dto::image_details::ImageDetails) -> pipetask_client::Result<()> {
//! let client = DeploymentClient::new("https://dev.example.com/DefaultCollection/MyProject");
//! let response = client.publish_image_details(&details).await?;
//! println!("{}", response);
//! # Ok(())
//! # }
//! ```

pub mod error;
mod image_details;

pub use error::{ClientError, Result};
pub use image_details::{IMAGE_DETAILS_API_VERSION, IMAGE_DETAILS_PATH};

use reqwest::Client;

/// HTTP client for a project's deployment API
///
/// The base URL is the collection URI joined with the team project name
/// (e.g. `https://dev.example.com/DefaultCollection/MyProject`).
#[derive(Debug, Clone)]
pub struct DeploymentClient {
    /// Project base URL without trailing slash
    base_url: String,
    /// Optional bearer token sent with every request
    access_token: Option<String>,
    /// HTTP client instance
    client: Client,
}

impl DeploymentClient {
    /// Create a new deployment client
    ///
    /// # Example
    /// ```
    /// use pipetask_client::DeploymentClient;
    ///
    /// let client = DeploymentClient::new("https://dev.example.com/DefaultCollection/MyProject");
    /// ```
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a new deployment client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token: None,
            client,
        }
    }

    /// Authenticate requests with a bearer token
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Get the project base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn post(&self, url: &str) -> reqwest::RequestBuilder {
        let request = self.client.post(url);
        match &self.access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Check the status code and return the response body as text
    async fn handle_text_response(&self, response: reqwest::Response) -> Result<String> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        response
            .text()
            .await
            .map_err(ClientError::ResponseBody)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = DeploymentClient::new("https://dev.example.com/Collection/Project");
        assert_eq!(client.base_url(), "https://dev.example.com/Collection/Project");
    }

    #[test]
    fn test_client_trims_trailing_slash() {
        let client = DeploymentClient::new("https://dev.example.com/Collection/Project/");
        assert_eq!(client.base_url(), "https://dev.example.com/Collection/Project");
    }

    #[test]
    fn test_api_error_status() {
        let err = ClientError::api_error(503, "down");
        assert!(matches!(err, ClientError::ApiError { status: 503, .. }));
        assert_eq!(err.to_string(), "API error (status 503): down");
    }
}
