//! # Forms
//!
//! Submission rules for the admin forms. A form that fails here never reaches the store.
//!
//! - Text fields must be non-empty after trimming, and are stored trimmed.
//! - Price must parse to a finite number greater than zero. The parsed value is forwarded as is.
//! - The category must be one of the categories currently loaded.
use serde::Deserialize;
use thiserror::Error;

use crate::models::{Category, FoodPatch, NewFood};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("Price must be a positive number")]
    InvalidPrice,

    #[error("Selected category does not exist")]
    UnknownCategory,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CategoryForm {
    #[serde(default)]
    pub name: String,
}

impl CategoryForm {
    /// Returns the trimmed name.
    pub fn validate(&self) -> Result<String, ValidationError> {
        required(&self.name, "Name")
    }
}

/// Raw food form as submitted, every value still a string.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FoodForm {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<String>,
    pub category_id: Option<String>,
    pub image_url: Option<String>,
}

impl FoodForm {
    /// Validates a full submission for a new food.
    ///
    /// `imageUrl` is optional here since it is normally filled in by an upload.
    pub fn validate_new(&self, categories: &[Category]) -> Result<NewFood, ValidationError> {
        let name = required(self.name.as_deref().unwrap_or_default(), "Name")?;
        let description = required(
            self.description.as_deref().unwrap_or_default(),
            "Description",
        )?;
        let price = parse_price(self.price.as_deref().unwrap_or_default())?;
        let category_id = selected_category(
            self.category_id.as_deref().unwrap_or_default(),
            categories,
        )?;

        Ok(NewFood {
            name,
            description,
            price,
            image_url: self.image_url().unwrap_or_default(),
            category_id,
        })
    }

    /// Validates only the fields present. A present field is held to the same rules as on creation.
    pub fn validate_patch(&self, categories: &[Category]) -> Result<FoodPatch, ValidationError> {
        Ok(FoodPatch {
            name: self
                .name
                .as_deref()
                .map(|name| required(name, "Name"))
                .transpose()?,
            description: self
                .description
                .as_deref()
                .map(|description| required(description, "Description"))
                .transpose()?,
            price: self.price.as_deref().map(parse_price).transpose()?,
            image_url: self.image_url(),
            category_id: self
                .category_id
                .as_deref()
                .map(|id| selected_category(id, categories))
                .transpose()?,
        })
    }

    fn image_url(&self) -> Option<String> {
        self.image_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(str::to_string)
    }
}

pub fn parse_price(raw: &str) -> Result<f64, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::MissingField("Price"));
    }

    match trimmed.parse::<f64>() {
        Ok(price) if price.is_finite() && price > 0.0 => Ok(price),
        _ => Err(ValidationError::InvalidPrice),
    }
}

fn required(value: &str, field: &'static str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::MissingField(field));
    }

    Ok(trimmed.to_string())
}

fn selected_category(id: &str, categories: &[Category]) -> Result<String, ValidationError> {
    if id.trim().is_empty() {
        return Err(ValidationError::MissingField("Category"));
    }

    categories
        .iter()
        .find(|category| category.id == id)
        .map(|category| category.id.clone())
        .ok_or(ValidationError::UnknownCategory)
}
