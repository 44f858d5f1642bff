//! Single object storage bucket, no fallback.
//!
//! Objects are named `<prefix>/<timestamp>-<random>.<ext>` and served through their public
//! download URL. Failures are reported by code, see [`StorageErrorCode`].
use async_trait::async_trait;
use chrono::Utc;
use rand::{Rng, distributions::Alphanumeric};
use reqwest::{Client, StatusCode, header::CONTENT_TYPE};
use serde::Deserialize;
use serde_json::Value;

use super::{ImageFile, MB, UploadBackend, UploadError};

const STORAGE_URL: &str = "https://firebasestorage.googleapis.com/v0/b";
pub const FOOD_IMAGES_PREFIX: &str = "foods";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageErrorCode {
    Unauthorized,
    Canceled,
    Unknown,
    InvalidFormat,
    InvalidChecksum,
    Other(String),
}

impl StorageErrorCode {
    pub fn from_code(code: &str) -> Self {
        match code {
            "storage/unauthorized" => Self::Unauthorized,
            "storage/canceled" => Self::Canceled,
            "storage/unknown" => Self::Unknown,
            "storage/invalid-format" => Self::InvalidFormat,
            "storage/invalid-checksum" => Self::InvalidChecksum,
            other => Self::Other(other.to_string()),
        }
    }

    /// A `storage/*` code named in the error message wins over the HTTP status.
    pub fn from_error(status: StatusCode, message: &str) -> Self {
        message
            .split(|c: char| c.is_whitespace() || matches!(c, '(' | ')' | '[' | ']' | ',' | '"'))
            .map(|word| word.trim_end_matches(['.', ':']))
            .find(|word| word.starts_with("storage/"))
            .map(Self::from_code)
            .unwrap_or_else(|| Self::from_response(status, message))
    }

    pub fn from_response(status: StatusCode, message: &str) -> Self {
        let lowered = message.to_ascii_lowercase();

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Self::Unauthorized,
            StatusCode::BAD_REQUEST if lowered.contains("checksum") => Self::InvalidChecksum,
            StatusCode::BAD_REQUEST => Self::InvalidFormat,
            _ if status.as_u16() == 499 => Self::Canceled,
            _ if status.is_server_error() => Self::Unknown,
            _ => Self::Other(format!("storage/http-{}", status.as_u16())),
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Self::Unauthorized => "You are not allowed to upload images",
            Self::Canceled => "Image upload was canceled",
            Self::Unknown => "Unknown error while uploading the image",
            Self::InvalidFormat => "Image format is not supported",
            Self::InvalidChecksum => "Image was corrupted during upload, please try again",
            Self::Other(_) => "Error uploading image, please try again",
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadedObject {
    name: String,
    download_tokens: Option<String>,
}

pub struct ObjectStorage {
    client: Client,
    bucket: String,
    prefix: String,
    token: Option<String>,
}

impl ObjectStorage {
    pub fn new(client: Client, bucket: &str, token: Option<String>) -> Self {
        Self {
            client,
            bucket: bucket.to_string(),
            prefix: FOOD_IMAGES_PREFIX.to_string(),
            token,
        }
    }

    fn download_url(&self, object: &UploadedObject) -> String {
        let mut url = format!(
            "{STORAGE_URL}/{}/o/{}?alt=media",
            self.bucket,
            object.name.replace('/', "%2F")
        );

        if let Some(token) = &object.download_tokens {
            url.push_str("&token=");
            url.push_str(token.split(',').next().unwrap_or(token));
        }

        url
    }
}

#[async_trait]
impl UploadBackend for ObjectStorage {
    fn name(&self) -> &str {
        "Storage"
    }

    fn max_size(&self) -> usize {
        5 * MB
    }

    async fn upload(&self, image: &ImageFile) -> Result<String, UploadError> {
        let object_name = object_name(&self.prefix, image);

        let request = self
            .client
            .post(format!("{STORAGE_URL}/{}/o", self.bucket))
            .query(&[("uploadType", "media"), ("name", object_name.as_str())])
            .header(CONTENT_TYPE, &image.content_type)
            .body(image.bytes.clone());

        let request = match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body: Value = response.json().await.unwrap_or(Value::Null);
            let message = body["error"]["message"].as_str().unwrap_or_default();

            return Err(UploadError::Storage(StorageErrorCode::from_error(
                status, message,
            )));
        }

        let uploaded: UploadedObject = response
            .json()
            .await
            .map_err(|_| UploadError::Storage(StorageErrorCode::Unknown))?;

        Ok(self.download_url(&uploaded))
    }
}

/// `<prefix>/<timestamp>-<random>.<ext>`
pub fn object_name(prefix: &str, image: &ImageFile) -> String {
    let random: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(10)
        .map(char::from)
        .collect();

    format!(
        "{prefix}/{}-{}.{}",
        Utc::now().timestamp_millis(),
        random.to_ascii_lowercase(),
        image.extension()
    )
}
