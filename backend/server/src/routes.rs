use std::sync::Arc;

use axum::{
    Json,
    extract::{Multipart, Path, Query, State as Shared},
    http::StatusCode,
    response::IntoResponse,
};
use menu::{Category, CategoryForm, Food, MenuItem, label_foods};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    auth::{AdminSession, Credentials, User},
    error::AppError,
    state::State,
    utils::{read_food_form, read_image_upload},
};

type AppState = Shared<Arc<State>>;

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct FoodFilter {
    category_id: Option<String>,
}

impl FoodFilter {
    /// Empty selection means all foods.
    fn selected(&self) -> Option<&str> {
        self.category_id.as_deref().filter(|id| !id.is_empty())
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuView {
    categories: Vec<Category>,
    selected_category: Option<Category>,
    foods: Vec<MenuItem>,
}

#[derive(Serialize)]
pub struct Created {
    id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedFood {
    id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_url: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedImage {
    image_url: String,
}

#[derive(Serialize)]
pub struct SignedIn {
    token: String,
    user: User,
}

pub async fn categories_handler(Shared(state): AppState) -> Result<Json<Vec<Category>>, AppError> {
    Ok(Json(state.catalog.categories().await?))
}

pub async fn foods_handler(
    Shared(state): AppState,
    Query(filter): Query<FoodFilter>,
) -> Result<Json<Vec<Food>>, AppError> {
    Ok(Json(state.catalog.foods(filter.selected()).await?))
}

pub async fn menu_handler(
    Shared(state): AppState,
    Query(filter): Query<FoodFilter>,
) -> Result<Json<MenuView>, AppError> {
    let categories = state.catalog.categories().await?;
    let foods = state.catalog.foods(filter.selected()).await?;

    let selected_category = filter
        .selected()
        .and_then(|id| categories.iter().find(|category| category.id == id))
        .cloned();

    Ok(Json(MenuView {
        foods: label_foods(foods, &categories, &state.config.placeholder_image_url),
        selected_category,
        categories,
    }))
}

pub async fn login_handler(
    Shared(state): AppState,
    Json(credentials): Json<Credentials>,
) -> Result<Json<SignedIn>, AppError> {
    let user = state.identity.sign_in(&credentials).await?;
    let token = state.sessions.open(user.clone()).await;

    Ok(Json(SignedIn { token, user }))
}

pub async fn logout_handler(
    Shared(state): AppState,
    session: AdminSession,
) -> Result<StatusCode, AppError> {
    state.identity.sign_out(&session.user).await?;
    state.sessions.close(&session.token).await;
    info!("Admin {} signed out", session.user.email);

    Ok(StatusCode::NO_CONTENT)
}

pub async fn session_handler(session: AdminSession) -> Json<User> {
    Json(session.user)
}

pub async fn create_category_handler(
    Shared(state): AppState,
    _session: AdminSession,
    Json(form): Json<CategoryForm>,
) -> Result<impl IntoResponse, AppError> {
    let name = form.validate()?;
    let id = state.catalog.create_category(&name).await?;

    Ok((StatusCode::CREATED, Json(Created { id })))
}

pub async fn rename_category_handler(
    Shared(state): AppState,
    _session: AdminSession,
    Path(id): Path<String>,
    Json(form): Json<CategoryForm>,
) -> Result<StatusCode, AppError> {
    let name = form.validate()?;
    state.catalog.rename_category(&id, &name).await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_category_handler(
    Shared(state): AppState,
    _session: AdminSession,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.catalog.delete_category(&id).await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn admin_foods_handler(
    Shared(state): AppState,
    _session: AdminSession,
) -> Result<Json<Vec<MenuItem>>, AppError> {
    let categories = state.catalog.categories().await?;
    let foods = state.catalog.foods(None).await?;

    Ok(Json(label_foods(
        foods,
        &categories,
        &state.config.placeholder_image_url,
    )))
}

pub async fn create_food_handler(
    Shared(state): AppState,
    _session: AdminSession,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let (form, image) = read_food_form(&mut multipart).await?;

    let categories = state.catalog.categories().await?;
    let mut food = form.validate_new(&categories)?;

    if let Some(image) = image {
        food.image_url = state.uploader.upload(&image).await?;
    }

    let image_url = food.image_url.clone();
    let id = state.catalog.create_food(food).await?;

    Ok((
        StatusCode::CREATED,
        Json(SavedFood {
            id,
            image_url: Some(image_url),
        }),
    ))
}

/// Fields left out of the form keep their stored value, including the image.
pub async fn update_food_handler(
    Shared(state): AppState,
    _session: AdminSession,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<SavedFood>, AppError> {
    let (form, image) = read_food_form(&mut multipart).await?;

    let categories = state.catalog.categories().await?;
    let mut patch = form.validate_patch(&categories)?;

    if let Some(image) = image {
        patch.image_url = Some(state.uploader.upload(&image).await?);
    }

    let image_url = patch.image_url.clone();
    state.catalog.update_food(&id, patch).await?;

    Ok(Json(SavedFood { id, image_url }))
}

pub async fn delete_food_handler(
    Shared(state): AppState,
    _session: AdminSession,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.catalog.delete_food(&id).await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn upload_image_handler(
    Shared(state): AppState,
    _session: AdminSession,
    mut multipart: Multipart,
) -> Result<Json<UploadedImage>, AppError> {
    let image = read_image_upload(&mut multipart).await?;
    let image_url = state.uploader.upload(&image).await?;

    Ok(Json(UploadedImage { image_url }))
}
