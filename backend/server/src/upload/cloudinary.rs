//! Primary image host, unsigned upload through an upload preset.
use async_trait::async_trait;
use reqwest::{
    Client,
    multipart::{Form, Part},
};
use serde::Deserialize;

use super::{ImageFile, MB, UploadBackend, UploadError};

pub const CLOUDINARY_FOLDER: &str = "restaurant-menu";

#[derive(Deserialize)]
struct UploadResponse {
    secure_url: String,
}

#[derive(Deserialize, Default)]
struct ErrorResponse {
    error: Option<ErrorMessage>,
}

#[derive(Deserialize)]
struct ErrorMessage {
    message: String,
}

pub struct Cloudinary {
    client: Client,
    endpoint: String,
    upload_preset: String,
}

impl Cloudinary {
    pub fn new(client: Client, cloud_name: &str, upload_preset: &str) -> Self {
        Self {
            client,
            endpoint: format!("https://api.cloudinary.com/v1_1/{cloud_name}/image/upload"),
            upload_preset: upload_preset.to_string(),
        }
    }
}

#[async_trait]
impl UploadBackend for Cloudinary {
    fn name(&self) -> &str {
        "Cloudinary"
    }

    fn max_size(&self) -> usize {
        10 * MB
    }

    async fn upload(&self, image: &ImageFile) -> Result<String, UploadError> {
        let file = Part::bytes(image.bytes.to_vec())
            .file_name(image.file_name.clone())
            .mime_str(&image.content_type)?;

        let form = Form::new()
            .part("file", file)
            .text("upload_preset", self.upload_preset.clone())
            .text("folder", CLOUDINARY_FOLDER);

        let response = self.client.post(&self.endpoint).multipart(form).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body: ErrorResponse = response.json().await.unwrap_or_default();
            let message = body
                .error
                .map(|error| error.message)
                .unwrap_or_else(|| format!("status {status}"));

            return Err(UploadError::Rejected(format!("Cloudinary: {message}")));
        }

        let uploaded: UploadResponse = response
            .json()
            .await
            .map_err(|e| UploadError::Malformed(e.to_string()))?;

        Ok(uploaded.secure_url)
    }
}
