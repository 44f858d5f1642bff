//! Secondary free host. Takes the image as a base64 form field and an API key.
use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use reqwest::{Client, multipart::Form};
use serde::Deserialize;

use super::{ImageFile, MB, UploadBackend, UploadError};

const IMGBB_ENDPOINT: &str = "https://api.imgbb.com/1/upload";

#[derive(Deserialize)]
struct UploadResponse {
    #[serde(default)]
    success: bool,
    data: Option<UploadData>,
    error: Option<ErrorMessage>,
}

#[derive(Deserialize)]
struct UploadData {
    url: String,
}

#[derive(Deserialize)]
struct ErrorMessage {
    message: String,
}

pub struct ImgBB {
    client: Client,
    api_key: String,
}

impl ImgBB {
    pub fn new(client: Client, api_key: &str) -> Self {
        Self {
            client,
            api_key: api_key.to_string(),
        }
    }
}

#[async_trait]
impl UploadBackend for ImgBB {
    fn name(&self) -> &str {
        "ImgBB"
    }

    fn max_size(&self) -> usize {
        32 * MB
    }

    async fn upload(&self, image: &ImageFile) -> Result<String, UploadError> {
        let form = Form::new().text("image", STANDARD.encode(&image.bytes));

        let response = self
            .client
            .post(IMGBB_ENDPOINT)
            .query(&[("key", &self.api_key)])
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(UploadError::Rejected(format!(
                "ImgBB: status {}",
                response.status()
            )));
        }

        let uploaded: UploadResponse = response
            .json()
            .await
            .map_err(|e| UploadError::Malformed(e.to_string()))?;

        hosted_url(uploaded)
    }
}

fn hosted_url(response: UploadResponse) -> Result<String, UploadError> {
    match response {
        UploadResponse {
            success: true,
            data: Some(data),
            ..
        } => Ok(data.url),
        UploadResponse { error, .. } => Err(UploadError::Rejected(format!(
            "ImgBB: {}",
            error.map_or_else(|| "Unknown error".to_string(), |error| error.message)
        ))),
    }
}
