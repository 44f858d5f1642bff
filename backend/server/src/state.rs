use std::sync::Arc;

use reqwest::Client;
use tracing::info;

use crate::{
    auth::{FirebaseIdentity, IdentityProvider, Sessions, StaticIdentity},
    catalog::Catalog,
    config::{AuthBackend, Config, ConfigError, StoreBackend, UploadMode},
    database::{DocumentStore, MemoryStore},
    error::ServerError,
    firestore::FirestoreStore,
    upload::{
        UploadBackend, UploadChain, Uploader, cloudinary::Cloudinary, imgbb::ImgBB,
        inline::Inline, storage::ObjectStorage,
    },
};

pub struct State {
    pub config: Config,
    pub catalog: Catalog,
    pub uploader: Uploader,
    pub identity: Arc<dyn IdentityProvider>,
    pub sessions: Sessions,
}

impl State {
    pub fn new(config: Config) -> Result<Arc<Self>, ServerError> {
        let client = Client::builder().build()?;

        let store = init_store(&config, &client)?;
        let uploader = init_uploader(&config, &client)?;
        let identity = init_identity(&config, &client)?;

        Ok(Self::from_parts(config, store, uploader, identity))
    }

    pub fn from_parts(
        config: Config,
        store: Arc<dyn DocumentStore>,
        uploader: Uploader,
        identity: Arc<dyn IdentityProvider>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            catalog: Catalog::new(store),
            uploader,
            identity,
            sessions: Sessions::default(),
        })
    }

    /// Drops sessions and cached listings.
    pub async fn shutdown(&self) {
        self.sessions.clear().await;
        self.catalog.clear().await;

        info!("State cleared");
    }
}

fn init_store(config: &Config, client: &Client) -> Result<Arc<dyn DocumentStore>, ConfigError> {
    match config.store_backend {
        StoreBackend::Memory => {
            info!("Using in-memory document store");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Firestore => {
            let project = config
                .firestore_project
                .as_deref()
                .ok_or(ConfigError::Missing("FIRESTORE_PROJECT"))?;
            info!("Using Firestore project {project}");

            Ok(Arc::new(FirestoreStore::new(
                client.clone(),
                project,
                config.firebase_api_key.clone(),
                config.firestore_token.clone(),
            )))
        }
    }
}

fn init_uploader(config: &Config, client: &Client) -> Result<Uploader, ConfigError> {
    match config.upload_mode {
        UploadMode::Fallback => {
            let mut backends: Vec<Arc<dyn UploadBackend>> = Vec::new();

            if let (Some(cloud_name), Some(preset)) = (
                &config.cloudinary_cloud_name,
                &config.cloudinary_upload_preset,
            ) {
                backends.push(Arc::new(Cloudinary::new(client.clone(), cloud_name, preset)));
            }

            if let Some(api_key) = &config.imgbb_api_key {
                backends.push(Arc::new(ImgBB::new(client.clone(), api_key)));
            }

            backends.push(Arc::new(Inline));

            let chain = UploadChain::new(backends, config.placeholder_image_url.clone());
            info!("Upload chain: {:?}", chain.backend_names());

            Ok(Uploader::fallback(chain, config.max_upload_size))
        }
        UploadMode::Storage => {
            let bucket = config
                .storage_bucket
                .as_deref()
                .ok_or(ConfigError::Missing("STORAGE_BUCKET"))?;
            info!("Uploading images to bucket {bucket}");

            let storage = ObjectStorage::new(client.clone(), bucket, config.firestore_token.clone());

            Ok(Uploader::single(Arc::new(storage), config.max_upload_size))
        }
    }
}

fn init_identity(
    config: &Config,
    client: &Client,
) -> Result<Arc<dyn IdentityProvider>, ConfigError> {
    match config.auth_backend {
        AuthBackend::Static => {
            let email = config
                .admin_email
                .as_deref()
                .ok_or(ConfigError::Missing("ADMIN_EMAIL"))?;
            let password = config
                .admin_password
                .as_deref()
                .ok_or(ConfigError::Missing("ADMIN_PASSWORD"))?;

            Ok(Arc::new(StaticIdentity::new(email, password)))
        }
        AuthBackend::Firebase => {
            let api_key = config
                .firebase_api_key
                .as_deref()
                .ok_or(ConfigError::Missing("FIREBASE_API_KEY"))?;

            Ok(Arc::new(FirebaseIdentity::new(client.clone(), api_key)))
        }
    }
}
