//! # Admin Authentication
//!
//! Sign-in is handed to an [`IdentityProvider`]. On success the server opens a session keyed by an
//! opaque bearer token, and admin routes only check that the token maps to a live session.
//!
//! - No refresh or expiry handling here, the provider owns credentials
//! - Sign-out closes the session and tells the provider
//! - Sessions live in memory and are cleared on shutdown
//! - One session per user, a new sign-in ends the previous one
use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use crate::{error::AppError, state::State};

const SIGN_IN_ENDPOINT: &str =
    "https://identitytoolkit.googleapis.com/v1/accounts:signInWithPassword";

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Sign in required")]
    MissingSession,

    #[error("Sign in failed: {0}")]
    Provider(String),

    #[error("Identity provider unreachable: {0}")]
    Request(#[from] reqwest::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub uid: String,
    pub email: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in(&self, credentials: &Credentials) -> Result<User, AuthError>;

    async fn sign_out(&self, _user: &User) -> Result<(), AuthError> {
        Ok(())
    }
}

/// One admin account from configuration.
pub struct StaticIdentity {
    email: String,
    password: String,
}

impl StaticIdentity {
    pub fn new(email: &str, password: &str) -> Self {
        Self {
            email: email.to_string(),
            password: password.to_string(),
        }
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentity {
    async fn sign_in(&self, credentials: &Credentials) -> Result<User, AuthError> {
        if !credentials.email.trim().eq_ignore_ascii_case(&self.email)
            || credentials.password != self.password
        {
            return Err(AuthError::InvalidCredentials);
        }

        Ok(User {
            uid: "admin".to_string(),
            email: self.email.clone(),
        })
    }
}

/// Email/password sign-in against the hosted identity service.
pub struct FirebaseIdentity {
    client: Client,
    api_key: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInResponse {
    local_id: String,
    email: String,
}

impl FirebaseIdentity {
    pub fn new(client: Client, api_key: &str) -> Self {
        Self {
            client,
            api_key: api_key.to_string(),
        }
    }
}

#[async_trait]
impl IdentityProvider for FirebaseIdentity {
    async fn sign_in(&self, credentials: &Credentials) -> Result<User, AuthError> {
        let response = self
            .client
            .post(SIGN_IN_ENDPOINT)
            .query(&[("key", &self.api_key)])
            .json(&json!({
                "email": credentials.email.trim(),
                "password": credentials.password,
                "returnSecureToken": true,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let body: Value = response.json().await.unwrap_or(Value::Null);
            let code = body["error"]["message"].as_str().unwrap_or("UNKNOWN");

            return Err(sign_in_error(code));
        }

        let signed_in: SignInResponse = response
            .json()
            .await
            .map_err(|e| AuthError::Provider(e.to_string()))?;

        Ok(User {
            uid: signed_in.local_id,
            email: signed_in.email,
        })
    }
}

fn sign_in_error(code: &str) -> AuthError {
    match code {
        "EMAIL_NOT_FOUND" | "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" | "INVALID_EMAIL"
        | "MISSING_PASSWORD" => AuthError::InvalidCredentials,
        other => AuthError::Provider(other.to_string()),
    }
}

#[derive(Default)]
pub struct Sessions {
    sessions: RwLock<HashMap<String, User>>,
}

impl Sessions {
    /// Signing in again replaces the user's earlier session.
    pub async fn open(&self, user: User) -> String {
        let token = Uuid::new_v4().simple().to_string();
        info!("Admin {} signed in", user.email);

        let mut sessions = self.sessions.write().await;
        sessions.retain(|_, signed_in| signed_in.uid != user.uid);
        sessions.insert(token.clone(), user);

        token
    }

    pub async fn get(&self, token: &str) -> Option<User> {
        self.sessions.read().await.get(token).cloned()
    }

    pub async fn close(&self, token: &str) -> Option<User> {
        self.sessions.write().await.remove(token)
    }

    pub async fn clear(&self) {
        self.sessions.write().await.clear();
    }
}

/// Extractor for routes that need a signed-in admin.
pub struct AdminSession {
    pub token: String,
    pub user: User,
}

impl FromRequestParts<Arc<State>> for AdminSession {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<State>,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(AuthError::MissingSession)?;

        let user = state
            .sessions
            .get(token)
            .await
            .ok_or(AuthError::MissingSession)?;

        Ok(Self {
            token: token.to_string(),
            user,
        })
    }
}
