//! Image details endpoint

use crate::DeploymentClient;
use crate::error::Result;
use pipetask_core::dto::image_details::ImageDetails;
use tracing::debug;

/// Path of the image details endpoint, relative to the project URL
pub const IMAGE_DETAILS_PATH: &str = "_apis/deployment/imagedetails";

/// API version pinned by the image details endpoint
pub const IMAGE_DETAILS_API_VERSION: &str = "5.0-preview.1";

impl DeploymentClient {
    /// Full URL of the image details endpoint
    pub fn image_details_url(&self) -> String {
        format!(
            "{}/{}?api-version={}",
            self.base_url, IMAGE_DETAILS_PATH, IMAGE_DETAILS_API_VERSION
        )
    }

    /// Publish the details of a pushed image
    ///
    /// # Returns
    /// The raw response body returned by the service
    pub async fn publish_image_details(&self, details: &ImageDetails) -> Result<String> {
        let url = self.image_details_url();
        debug!("Posting image details for {} to {}", details.image_uri, url);

        let response = self.post(&url).json(details).send().await?;

        self.handle_text_response(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ClientError;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn details() -> ImageDetails {
        ImageDetails {
            image_name: "https://registry.example.com/myrepo@sha256:abc123".to_string(),
            image_uri: "https://registry.example.com/myrepo@sha256:abc123".to_string(),
            hash: "abc123".to_string(),
            base_image_name: Some("alpine".to_string()),
            distance: 0,
            image_type: String::new(),
            media_type: String::new(),
            tags: vec!["v1".to_string(), "v2".to_string()],
            layer_info: Vec::new(),
            build_id: Some(12),
            build_version: "1.0.12".to_string(),
            build_definition_name: "ci".to_string(),
            build_definition_id: "3".to_string(),
        }
    }

    #[test]
    fn test_image_details_url() {
        let client = DeploymentClient::new("https://dev.example.com/Collection/Project/");
        assert_eq!(
            client.image_details_url(),
            "https://dev.example.com/Collection/Project/_apis/deployment/imagedetails?api-version=5.0-preview.1"
        );
    }

    #[tokio::test]
    async fn test_publish_posts_json() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/Collection/Project/_apis/deployment/imagedetails"))
            .and(query_param("api-version", "5.0-preview.1"))
            .and(header("content-type", "application/json"))
            .and(header("authorization", "Bearer secret"))
            .and(body_partial_json(serde_json::json!({
                "hash": "abc123",
                "tags": ["v1", "v2"],
                "buildId": 12
            })))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"id\":1}"))
            .expect(1)
            .mount(&server)
            .await;

        let client = DeploymentClient::new(format!("{}/Collection/Project", server.uri()))
            .with_access_token("secret");
        let body = client.publish_image_details(&details()).await.unwrap();
        assert_eq!(body, "{\"id\":1}");
    }

    #[tokio::test]
    async fn test_publish_reports_api_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let client = DeploymentClient::new(format!("{}/Collection/Project", server.uri()));
        let err = client.publish_image_details(&details()).await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::ApiError { status: 500, ref message } if message == "boom"
        ));
    }
}
