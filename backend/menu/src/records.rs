//! # Records
//!
//! Mapping between store documents and menu records.
//!
//! The store hands back whatever was written, so nothing is trusted as is:
//! - Missing or non-string `name`: document skipped
//! - Missing text fields: empty string
//! - `price` as number or numeric string, anything else (or non-positive) becomes `0.0`
use serde_json::{Map, Value};
use tracing::warn;

use crate::models::{
    Category, FIELD_CATEGORY_ID, FIELD_DESCRIPTION, FIELD_IMAGE_URL, FIELD_NAME, FIELD_PRICE,
    Food, FoodPatch, NewFood,
};

pub type Document = Map<String, Value>;

pub fn category_from_document(id: &str, document: &Document) -> Option<Category> {
    let Some(name) = text(document, FIELD_NAME) else {
        warn!("Skipping category {id}: missing name");
        return None;
    };

    Some(Category {
        id: id.to_string(),
        name,
    })
}

pub fn food_from_document(id: &str, document: &Document) -> Option<Food> {
    let Some(name) = text(document, FIELD_NAME) else {
        warn!("Skipping food {id}: missing name");
        return None;
    };

    Some(Food {
        id: id.to_string(),
        name,
        description: text(document, FIELD_DESCRIPTION).unwrap_or_default(),
        price: price(id, document.get(FIELD_PRICE)),
        image_url: text(document, FIELD_IMAGE_URL).unwrap_or_default(),
        category_id: text(document, FIELD_CATEGORY_ID).unwrap_or_default(),
    })
}

pub fn category_document(name: &str) -> Document {
    let mut document = Document::new();
    document.insert(FIELD_NAME.to_string(), Value::from(name));

    document
}

impl From<NewFood> for Document {
    fn from(food: NewFood) -> Self {
        let mut document = Document::new();
        document.insert(FIELD_NAME.to_string(), Value::from(food.name));
        document.insert(FIELD_DESCRIPTION.to_string(), Value::from(food.description));
        document.insert(FIELD_PRICE.to_string(), Value::from(food.price));
        document.insert(FIELD_CATEGORY_ID.to_string(), Value::from(food.category_id));
        document.insert(FIELD_IMAGE_URL.to_string(), Value::from(food.image_url));

        document
    }
}

impl From<FoodPatch> for Document {
    fn from(patch: FoodPatch) -> Self {
        let mut document = Document::new();
        let fields = [
            (FIELD_NAME, patch.name.map(Value::from)),
            (FIELD_DESCRIPTION, patch.description.map(Value::from)),
            (FIELD_PRICE, patch.price.map(Value::from)),
            (FIELD_CATEGORY_ID, patch.category_id.map(Value::from)),
            (FIELD_IMAGE_URL, patch.image_url.map(Value::from)),
        ];

        for (key, value) in fields {
            if let Some(value) = value {
                document.insert(key.to_string(), value);
            }
        }

        document
    }
}

fn text(document: &Document, key: &str) -> Option<String> {
    document
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn price(id: &str, value: Option<&Value>) -> f64 {
    let parsed = match value {
        Some(Value::Number(number)) => number.as_f64(),
        Some(Value::String(raw)) => raw.trim().parse::<f64>().ok(),
        _ => None,
    };

    match parsed {
        Some(price) if price.is_finite() && price > 0.0 => price,
        _ => {
            warn!("Food {id} has no usable price, defaulting to 0");
            0.0
        }
    }
}
