//! Wire types of the upload endpoint.

use serde::Deserialize;

use crate::domain::entities::ImageId;

/// Upload endpoint response envelope.
#[derive(Debug, Deserialize)]
pub struct UploadResponse {
    /// Whether the upload was accepted.
    #[serde(default)]
    pub success: bool,
    /// Human readable status message.
    #[serde(default)]
    pub message: Option<String>,
    /// Upload payload, present on success.
    #[serde(default)]
    pub data: Option<UploadData>,
}

/// Payload of a successful upload.
#[derive(Debug, Deserialize)]
pub struct UploadData {
    /// Created image records.
    #[serde(default)]
    pub images: Vec<UploadedImage>,
}

/// One created image record. Only the identifier is consumed.
#[derive(Debug, Deserialize)]
pub struct UploadedImage {
    /// Record identifier, numeric or string.
    pub id: RawId,
}

/// Identifier that may arrive as a JSON number or string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RawId {
    /// Numeric id.
    Number(u64),
    /// String id.
    Text(String),
}

impl From<RawId> for ImageId {
    fn from(id: RawId) -> Self {
        match id {
            RawId::Number(n) => Self::from(n),
            RawId::Text(s) => Self::new(s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_server_payload_yields_ids() {
        let body = r#"{
            "success": true,
            "message": "Uploaded",
            "data": {
                "images": [
                    {"id": 42, "name": "rice.jpg", "url": "https://res.cloudinary.com/demo/image/upload/v1/rice.jpg", "width": 600, "createdAt": "2024-01-01T00:00:00Z"},
                    {"id": "abc"}
                ],
                "count": 2
            }
        }"#;

        let response: UploadResponse = serde_json::from_str(body).unwrap();
        assert!(response.success);
        let ids: Vec<ImageId> = response
            .data
            .unwrap()
            .images
            .into_iter()
            .map(|image| image.id.into())
            .collect();
        assert_eq!(ids, vec![ImageId::from(42u64), ImageId::new("abc")]);
    }
}
