use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::time::Duration;

use super::{ImageUpload, MediaAsset, MediaError, MediaStore};
use crate::config::MediaConfig;

const API_BASE: &str = "https://api.cloudinary.com/v1_1";

/// Cloudinary image API client using signed uploads.
pub struct CloudinaryMediaStore {
    client: reqwest::Client,
    cloud_name: String,
    api_key: String,
    api_secret: String,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    public_id: String,
    secure_url: String,
}

#[derive(Debug, Deserialize)]
struct DestroyResponse {
    result: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorMessage,
}

#[derive(Debug, Deserialize)]
struct ErrorMessage {
    message: String,
}

impl CloudinaryMediaStore {
    pub fn new(config: &MediaConfig) -> Result<Self, MediaError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            client,
            cloud_name: config.cloud_name.clone(),
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
        })
    }

    fn endpoint(&self, action: &str) -> String {
        format!("{}/{}/image/{}", API_BASE, self.cloud_name, action)
    }

    /// Signs the parameters as `k1=v1&k2=v2...` (sorted by key) followed by the API secret.
    fn sign(&self, params: &mut Vec<(&'static str, String)>) -> String {
        params.sort_by(|a, b| a.0.cmp(b.0));
        let joined = params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");
        format!("{:x}", Sha256::digest(format!("{}{}", joined, self.api_secret).as_bytes()))
    }

    async fn read_error(response: reqwest::Response) -> MediaError {
        let status = response.status();
        match response.json::<ErrorBody>().await {
            Ok(body) => MediaError::Rejected(body.error.message),
            Err(_) => MediaError::Rejected(format!("HTTP {}", status)),
        }
    }
}

#[async_trait]
impl MediaStore for CloudinaryMediaStore {
    async fn upload(&self, image: &ImageUpload, folder: &str, public_id: Option<&str>) -> Result<MediaAsset, MediaError> {
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let mut params = vec![("folder", folder.to_string()), ("timestamp", timestamp)];
        if let Some(id) = public_id {
            params.push(("public_id", id.to_string()));
            params.push(("overwrite", "true".to_string()));
        }
        let signature = self.sign(&mut params);

        let file = Part::bytes(image.data.to_vec())
            .file_name(image.file_name.clone())
            .mime_str(&image.content_type)?;
        let mut form = Form::new()
            .part("file", file)
            .text("api_key", self.api_key.clone())
            .text("signature", signature)
            .text("signature_algorithm", "sha256");
        for (key, value) in params {
            form = form.text(key, value);
        }

        let response = self.client.post(self.endpoint("upload")).multipart(form).send().await?;
        if !response.status().is_success() {
            return Err(Self::read_error(response).await);
        }

        let body: UploadResponse = response
            .json()
            .await
            .map_err(|e| MediaError::InvalidResponse(e.to_string()))?;
        tracing::debug!("Uploaded media {}", body.public_id);
        Ok(MediaAsset {
            public_id: body.public_id,
            secure_url: body.secure_url,
        })
    }

    async fn delete(&self, public_id: &str) -> Result<(), MediaError> {
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let mut params = vec![("public_id", public_id.to_string()), ("timestamp", timestamp)];
        let signature = self.sign(&mut params);

        let mut form: Vec<(&str, String)> = params;
        form.push(("api_key", self.api_key.clone()));
        form.push(("signature", signature));
        form.push(("signature_algorithm", "sha256".to_string()));

        let response = self.client.post(self.endpoint("destroy")).form(&form).send().await?;
        if !response.status().is_success() {
            return Err(Self::read_error(response).await);
        }

        let body: DestroyResponse = response
            .json()
            .await
            .map_err(|e| MediaError::InvalidResponse(e.to_string()))?;
        match body.result.as_str() {
            "ok" | "not found" => Ok(()),
            other => Err(MediaError::Rejected(format!("destroy returned '{}'", other))),
        }
    }
}
