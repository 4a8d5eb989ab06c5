//! Image details DTOs
//!
//! Describes a pushed container image for the deployment traceability API.

use serde::{Deserialize, Serialize};

/// Metadata record for a pushed image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageDetails {
    pub image_name: String,
    pub image_uri: String,
    pub hash: String,
    pub base_image_name: Option<String>,
    pub distance: u32,
    pub image_type: String,
    pub media_type: String,
    pub tags: Vec<String>,
    pub layer_info: Vec<LayerInfo>,
    pub build_id: Option<i64>,
    pub build_version: String,
    pub build_definition_name: String,
    pub build_definition_id: String,
}

/// One row of an image's build history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerInfo {
    /// Dockerfile instruction that produced the layer (e.g. `RUN`, `CMD`)
    pub directive: String,
    pub arguments: String,
    pub size: String,
    pub created_on: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_details_serializes_camel_case() {
        let details = ImageDetails {
            image_name: "https://registry.example.com/myrepo@sha256:abc".to_string(),
            image_uri: "https://registry.example.com/myrepo@sha256:abc".to_string(),
            hash: "abc".to_string(),
            base_image_name: Some("alpine:3.19".to_string()),
            distance: 0,
            image_type: String::new(),
            media_type: String::new(),
            tags: vec!["v1".to_string()],
            layer_info: vec![LayerInfo {
                directive: "CMD".to_string(),
                arguments: "[\"sh\"]".to_string(),
                size: "0B".to_string(),
                created_on: "2024-01-01T00:00:00Z".to_string(),
            }],
            build_id: Some(42),
            build_version: "20240101.1".to_string(),
            build_definition_name: "ci".to_string(),
            build_definition_id: "7".to_string(),
        };

        let json = serde_json::to_value(&details).unwrap();
        assert_eq!(json["imageUri"], "https://registry.example.com/myrepo@sha256:abc");
        assert_eq!(json["baseImageName"], "alpine:3.19");
        assert_eq!(json["distance"], 0);
        assert_eq!(json["imageType"], "");
        assert_eq!(json["buildId"], 42);
        assert_eq!(json["buildDefinitionId"], "7");
        assert_eq!(json["layerInfo"][0]["createdOn"], "2024-01-01T00:00:00Z");
    }

    #[test]
    fn test_missing_build_id_serializes_null() {
        let details = ImageDetails {
            image_name: String::new(),
            image_uri: String::new(),
            hash: String::new(),
            base_image_name: None,
            distance: 0,
            image_type: String::new(),
            media_type: String::new(),
            tags: Vec::new(),
            layer_info: Vec::new(),
            build_id: None,
            build_version: String::new(),
            build_definition_name: String::new(),
            build_definition_id: String::new(),
        };

        let json = serde_json::to_value(&details).unwrap();
        assert!(json["buildId"].is_null());
        assert!(json["baseImageName"].is_null());
    }
}
