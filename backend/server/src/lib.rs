//! Documentation of a restaurant menu service.
//!
//! A public storefront lists foods by category. Admins sign in to manage categories, foods and
//! their pictures.
//!
//!
//!
//! # General Infrastructure
//! - Storefront and admin panel talk to this server only
//! - Records live in an external document database, see [`database`]
//! - Sign-in is handed to an external identity provider, see [`auth`]
//! - Pictures go to external image hosts, see [`upload`]
//! - Nothing is kept locally except sessions and cached listings
//!
//!
//!
//! # Routes
//!
//! Public
//! - `GET /api/categories`: categories ordered by name
//! - `GET /api/foods?categoryId=`: foods ordered by name, optionally filtered by category
//! - `GET /api/menu?categoryId=`: storefront view, foods carry their category label
//! - `POST /api/auth/login`: `{ email, password }` in, `{ token, user }` out
//!
//! Admin (`Authorization: Bearer <token>`)
//! - `GET /api/auth/session`, `POST /api/auth/logout`
//! - `POST /api/admin/categories`, `PUT|DELETE /api/admin/categories/{id}`
//! - `GET|POST /api/admin/foods`, `PUT|DELETE /api/admin/foods/{id}` (multipart, optional `image` part)
//! - `POST /api/admin/images`: standalone upload, returns `{ imageUrl }`
//!
//!
//!
//! # Notes
//!
//! ## Images never block a save
//! With the fallback chain, a food is saved even when every image host is down. It simply ends up
//! with the placeholder picture. Only a non-image file or an oversized one is refused.
//!
//! ## No cascade
//! Deleting a category leaves its foods untouched. They show up under "Unknown category" until
//! an admin reassigns them.
//!
//! ## Last write wins
//! No versions and no conditional writes. Two admins editing the same food overwrite each other.
//!
//!
//!
//! # Setup
//!
//! Run with the in-memory store and a single admin.
//! ```sh
//! ADMIN_EMAIL=chef@example.com ADMIN_PASSWORD=secret RUST_LOG=info cargo run -p food
//! ```
//!
//! Hosted backends.
//! ```sh
//! STORE_BACKEND=firestore FIRESTORE_PROJECT=my-menu AUTH_BACKEND=firebase \
//! CLOUDINARY_CLOUD_NAME=demo CLOUDINARY_UPLOAD_PRESET=restaurant-menu cargo run -p food
//! ```
//!
//! Secrets (`ADMIN_PASSWORD`, `FIREBASE_API_KEY`, `FIRESTORE_TOKEN`, `IMGBB_API_KEY`) are read
//! from `/run/secrets/<NAME>` first, then from the environment.
//!
//! View current docs.
//! ```sh
//! cargo doc --open
//! ```
use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{
        HeaderValue, Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    routing::{get, post, put},
};

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};
use tokio::{net::TcpListener, signal::ctrl_c};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

pub mod auth;
pub mod catalog;
pub mod config;
pub mod database;
pub mod error;
pub mod firestore;
pub mod routes;
pub mod state;
pub mod upload;
pub mod utils;

use config::Config;
use error::ServerError;
use routes::{
    admin_foods_handler, categories_handler, create_category_handler, create_food_handler,
    delete_category_handler, delete_food_handler, foods_handler, login_handler, logout_handler,
    menu_handler, rename_category_handler, session_handler, update_food_handler,
    upload_image_handler,
};
use state::State;
use upload::MB;

pub async fn start_server(port: Option<u16>) -> Result<(), ServerError> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Loading config...");
    let mut config = Config::load()?;
    if let Some(port) = port {
        config.port = port;
    }

    info!("Initializing state...");
    let state = State::new(config)?;

    info!("Starting server...");
    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address).await?;
    info!("Server running on {address}");

    axum::serve(listener, app(state.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutting down...");
    state.shutdown().await;

    Ok(())
}

pub fn app(state: Arc<State>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(allowed_origin(state.config.cors_origin.as_deref()))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .max_age(Duration::from_secs(60 * 60));

    // room for the form fields next to the largest accepted image
    let body_limit = state.uploader.max_size().saturating_add(MB);

    let admin = Router::new()
        .route("/categories", post(create_category_handler))
        .route(
            "/categories/{id}",
            put(rename_category_handler).delete(delete_category_handler),
        )
        .route("/foods", get(admin_foods_handler).post(create_food_handler))
        .route(
            "/foods/{id}",
            put(update_food_handler).delete(delete_food_handler),
        )
        .route("/images", post(upload_image_handler));

    let api = Router::new()
        .route("/categories", get(categories_handler))
        .route("/foods", get(foods_handler))
        .route("/menu", get(menu_handler))
        .route("/auth/login", post(login_handler))
        .route("/auth/logout", post(logout_handler))
        .route("/auth/session", get(session_handler))
        .nest("/admin", admin);

    Router::new()
        .nest("/api", api)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .with_state(state)
}

fn allowed_origin(origin: Option<&str>) -> AllowOrigin {
    match origin.map(HeaderValue::from_str) {
        Some(Ok(origin)) => AllowOrigin::exact(origin),
        Some(Err(e)) => {
            warn!("Invalid CORS_ORIGIN ({e}), allowing any origin");
            AllowOrigin::any()
        }
        None => AllowOrigin::any(),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        ctrl_c().await.expect("Failed to install Ctrl+C handler");

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        signal(SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;

        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
