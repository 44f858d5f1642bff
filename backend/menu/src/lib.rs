//! # Menu
//!
//! Shared records of the restaurant menu.
//!
//! ## Collections
//! - `categories`: name (**string**)
//! - `foods`: name (**string**), description (**string**), price (**number**), categoryId (**string**), imageUrl (**string**)
//!
//! Both are read ordered by name. Foods can additionally be filtered by equality on `categoryId`.
//!
//! ## Notes
//! - Nothing links the two collections except the `categoryId` string. Deleting a category leaves its
//!   foods alone, they simply resolve to [`models::UNKNOWN_CATEGORY`] afterwards.
//! - Documents coming back from the store are loosely typed, see [`records`] for how they are mapped.

pub mod forms;
pub mod models;
pub mod records;

pub use forms::{CategoryForm, FoodForm, ValidationError, parse_price};
pub use models::{Category, Food, FoodPatch, MenuItem, NewFood, label_foods};
pub use records::Document;
