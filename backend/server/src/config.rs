use std::{env, fmt::Display, fs::read_to_string, str::FromStr};

use thiserror::Error;
use tracing::{info, warn};

use crate::upload::MB;

pub const PLACEHOLDER_IMAGE_URL: &str =
    "https://images.unsplash.com/photo-1565299624946-b28f40a0ca4b?w=400&h=300&fit=crop&crop=center";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid {key} value: {message}")]
    Invalid { key: &'static str, message: String },

    #[error("{0} must be set")]
    Missing(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Firestore,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "firestore" => Ok(Self::Firestore),
            other => Err(format!("unknown store backend '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadMode {
    /// Image hosts tried in order, placeholder when all fail.
    Fallback,
    /// Single object storage bucket, failures reported to the caller.
    Storage,
}

impl FromStr for UploadMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fallback" => Ok(Self::Fallback),
            "storage" => Ok(Self::Storage),
            other => Err(format!("unknown upload mode '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthBackend {
    Static,
    Firebase,
}

impl FromStr for AuthBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "static" => Ok(Self::Static),
            "firebase" => Ok(Self::Firebase),
            other => Err(format!("unknown auth backend '{other}'")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub store_backend: StoreBackend,
    pub auth_backend: AuthBackend,
    pub upload_mode: UploadMode,
    pub max_upload_size: usize,
    pub placeholder_image_url: String,
    pub cors_origin: Option<String>,
    pub firestore_project: Option<String>,
    pub firestore_token: Option<String>,
    pub firebase_api_key: Option<String>,
    pub storage_bucket: Option<String>,
    pub cloudinary_cloud_name: Option<String>,
    pub cloudinary_upload_preset: Option<String>,
    pub imgbb_api_key: Option<String>,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 1111,
            store_backend: StoreBackend::Memory,
            auth_backend: AuthBackend::Static,
            upload_mode: UploadMode::Fallback,
            max_upload_size: 5 * MB,
            placeholder_image_url: PLACEHOLDER_IMAGE_URL.to_string(),
            cors_origin: None,
            firestore_project: None,
            firestore_token: None,
            firebase_api_key: None,
            storage_bucket: None,
            cloudinary_cloud_name: None,
            cloudinary_upload_preset: None,
            imgbb_api_key: None,
            admin_email: None,
            admin_password: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let max_upload_size = upload_size(try_load("MAX_UPLOAD_MB", "5")?)?;

        Ok(Self {
            port: try_load("RUST_PORT", "1111")?,
            store_backend: try_load("STORE_BACKEND", "memory")?,
            auth_backend: try_load("AUTH_BACKEND", "static")?,
            upload_mode: try_load("UPLOAD_MODE", "fallback")?,
            max_upload_size,
            placeholder_image_url: optional("PLACEHOLDER_IMAGE_URL")
                .unwrap_or_else(|| PLACEHOLDER_IMAGE_URL.to_string()),
            cors_origin: optional("CORS_ORIGIN"),
            firestore_project: optional("FIRESTORE_PROJECT"),
            firestore_token: read_secret("FIRESTORE_TOKEN"),
            firebase_api_key: read_secret("FIREBASE_API_KEY"),
            storage_bucket: optional("STORAGE_BUCKET"),
            cloudinary_cloud_name: optional("CLOUDINARY_CLOUD_NAME"),
            cloudinary_upload_preset: optional("CLOUDINARY_UPLOAD_PRESET"),
            imgbb_api_key: read_secret("IMGBB_API_KEY"),
            admin_email: optional("ADMIN_EMAIL"),
            admin_password: read_secret("ADMIN_PASSWORD"),
        })
    }
}

fn upload_size(megabytes: usize) -> Result<usize, ConfigError> {
    megabytes
        .checked_mul(MB)
        .filter(|size| *size > 0)
        .ok_or_else(|| ConfigError::Invalid {
            key: "MAX_UPLOAD_MB",
            message: format!("{megabytes} MB is not a usable upload limit"),
        })
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn optional(key: &str) -> Option<String> {
    let value = var(key);
    if value.is_none() {
        info!("{key} not set");
    }

    value
}

fn try_load<T: FromStr>(key: &'static str, default: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    var(key)
        .unwrap_or_else(|| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .trim()
        .parse()
        .map_err(|e: T::Err| {
            warn!("Invalid {key} value: {e}");
            ConfigError::Invalid {
                key,
                message: e.to_string(),
            }
        })
}

/// Secrets come from `/run/secrets/<NAME>`, with the environment variable of the same name as fallback.
fn read_secret(secret_name: &str) -> Option<String> {
    let path = format!("/run/secrets/{secret_name}");

    match read_to_string(&path) {
        Ok(secret) => Some(secret.trim().to_string()).filter(|secret| !secret.is_empty()),
        Err(e) => {
            info!("Failed to read {secret_name} from file ({e}), trying environment");
            var(secret_name)
        }
    }
}
