use axum::extract::{Multipart, multipart::Field};
use menu::FoodForm;
use tracing::warn;

use crate::{error::AppError, upload::ImageFile};

pub const IMAGE_FIELD: &str = "image";

/// Splits a food submission into its text fields and the chosen image, if any.
///
/// An empty file part counts as no image chosen.
pub async fn read_food_form(
    multipart: &mut Multipart,
) -> Result<(FoodForm, Option<ImageFile>), AppError> {
    let mut form = FoodForm::default();
    let mut image = None;

    while let Some(field) = next_field(multipart).await? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        match name.as_str() {
            IMAGE_FIELD => image = read_image(field).await?,
            "name" => form.name = Some(read_text(field).await?),
            "description" => form.description = Some(read_text(field).await?),
            "price" => form.price = Some(read_text(field).await?),
            "categoryId" => form.category_id = Some(read_text(field).await?),
            "imageUrl" => form.image_url = Some(read_text(field).await?),
            other => warn!("Ignoring unexpected form field {other}"),
        }
    }

    Ok((form, image))
}

/// First image part of a standalone upload.
pub async fn read_image_upload(multipart: &mut Multipart) -> Result<ImageFile, AppError> {
    while let Some(field) = next_field(multipart).await? {
        if field.name() == Some(IMAGE_FIELD) {
            if let Some(image) = read_image(field).await? {
                return Ok(image);
            }
        }
    }

    Err(AppError::MissingImage)
}

async fn next_field(multipart: &mut Multipart) -> Result<Option<Field<'_>>, AppError> {
    multipart.next_field().await.map_err(|e| {
        warn!("Could not read multipart: {e}");
        AppError::MalformedPayload
    })
}

async fn read_text(field: Field<'_>) -> Result<String, AppError> {
    field.text().await.map_err(|e| {
        warn!("Could not read form field: {e}");
        AppError::MalformedPayload
    })
}

async fn read_image(field: Field<'_>) -> Result<Option<ImageFile>, AppError> {
    let file_name = field.file_name().unwrap_or(IMAGE_FIELD).to_string();
    let content_type = field
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_string();

    let bytes = field.bytes().await.map_err(|e| {
        warn!("Could not read image bytes: {e}");
        AppError::MalformedPayload
    })?;

    if bytes.is_empty() {
        return Ok(None);
    }

    Ok(Some(ImageFile {
        file_name,
        content_type,
        bytes,
    }))
}
