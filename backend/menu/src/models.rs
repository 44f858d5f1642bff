use std::collections::HashMap;

use serde::{Deserialize, Serialize};

pub const CATEGORIES: &str = "categories";
pub const FOODS: &str = "foods";

pub const FIELD_NAME: &str = "name";
pub const FIELD_DESCRIPTION: &str = "description";
pub const FIELD_PRICE: &str = "price";
pub const FIELD_IMAGE_URL: &str = "imageUrl";
pub const FIELD_CATEGORY_ID: &str = "categoryId";

pub const UNKNOWN_CATEGORY: &str = "Unknown category";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Food {
    pub id: String,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub image_url: String,
    pub category_id: String,
}

/// Food fields before the store assigns an id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewFood {
    pub name: String,
    pub description: String,
    pub price: f64,
    pub image_url: String,
    pub category_id: String,
}

/// Partial food update, `None` leaves the stored field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FoodPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub image_url: Option<String>,
    pub category_id: Option<String>,
}

impl FoodPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.price.is_none()
            && self.image_url.is_none()
            && self.category_id.is_none()
    }
}

/// Food as shown on the storefront, with its category resolved to a label.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuItem {
    #[serde(flatten)]
    pub food: Food,
    pub category_name: String,
}

/// Resolves each food's category name, falling back to [`UNKNOWN_CATEGORY`] for
/// dangling references and to `placeholder` for foods without an image.
pub fn label_foods(foods: Vec<Food>, categories: &[Category], placeholder: &str) -> Vec<MenuItem> {
    let names: HashMap<&str, &str> = categories
        .iter()
        .map(|category| (category.id.as_str(), category.name.as_str()))
        .collect();

    foods
        .into_iter()
        .map(|mut food| {
            let category_name = names
                .get(food.category_id.as_str())
                .copied()
                .unwrap_or(UNKNOWN_CATEGORY)
                .to_string();

            if food.image_url.is_empty() {
                food.image_url = placeholder.to_string();
            }

            MenuItem {
                food,
                category_name,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn food(id: &str, category_id: &str, image_url: &str) -> Food {
        Food {
            id: id.to_string(),
            name: format!("food {id}"),
            description: "tasty".to_string(),
            price: 4.5,
            image_url: image_url.to_string(),
            category_id: category_id.to_string(),
        }
    }

    #[test]
    fn test_labels_known_and_unknown() {
        let categories = vec![Category {
            id: "c1".to_string(),
            name: "Soups".to_string(),
        }];

        let items = label_foods(
            vec![food("1", "c1", "https://a/1.png"), food("2", "gone", "https://a/2.png")],
            &categories,
            "https://placeholder",
        );

        assert_eq!(items[0].category_name, "Soups");
        assert_eq!(items[1].category_name, UNKNOWN_CATEGORY);
        assert_eq!(items[1].food.category_id, "gone");
    }

    #[test]
    fn test_missing_image_uses_placeholder() {
        let items = label_foods(vec![food("1", "c1", "")], &[], "https://placeholder");

        assert_eq!(items[0].food.image_url, "https://placeholder");
    }

    #[test]
    fn test_menu_item_serializes_flat() {
        let items = label_foods(vec![food("1", "c1", "https://a/1.png")], &[], "p");
        let json = serde_json::to_value(&items[0]).unwrap();

        assert_eq!(json["categoryId"], "c1");
        assert_eq!(json["imageUrl"], "https://a/1.png");
        assert_eq!(json["categoryName"], UNKNOWN_CATEGORY);
    }

    #[test]
    fn test_empty_patch() {
        assert!(FoodPatch::default().is_empty());
        assert!(
            !FoodPatch {
                price: Some(1.0),
                ..Default::default()
            }
            .is_empty()
        );
    }
}
