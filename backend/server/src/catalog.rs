//! # Catalog
//!
//! Menu reads and writes on top of the [`DocumentStore`].
//!
//! ## Cache
//! - Keys: `categories`, `foods` (unfiltered) and one entry per filtered category
//! - Reads fill the cache, successful writes invalidate the keys they touch
//! - Category writes never invalidate foods, labels are resolved at read time
//! - A read that raced a write is returned but not cached
//! - Filtered listings are only cached for ids of existing categories
use std::{collections::HashMap, sync::Arc};

use menu::{
    Category, Document, Food, FoodPatch, NewFood,
    models::{CATEGORIES, FIELD_CATEGORY_ID, FIELD_NAME, FOODS},
    records::{category_document, category_from_document, food_from_document},
};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::database::{DocumentStore, Query, StoreError};

#[derive(Default)]
struct QueryCache {
    /// Bumped on every invalidation. A fetch started under an older generation is not stored.
    generation: u64,
    categories: Option<Vec<Category>>,
    foods: HashMap<Option<String>, Vec<Food>>,
}

pub struct Catalog {
    store: Arc<dyn DocumentStore>,
    cache: RwLock<QueryCache>,
}

impl Catalog {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            cache: RwLock::new(QueryCache::default()),
        }
    }

    pub async fn categories(&self) -> Result<Vec<Category>, StoreError> {
        let generation = {
            let cache = self.cache.read().await;
            if let Some(categories) = &cache.categories {
                return Ok(categories.clone());
            }

            cache.generation
        };

        debug!("Fetching categories");
        let categories: Vec<Category> = self
            .store
            .list(CATEGORIES, &Query::ordered_by(FIELD_NAME))
            .await?
            .iter()
            .filter_map(|(id, document)| category_from_document(id, document))
            .collect();

        let mut cache = self.cache.write().await;
        if cache.generation == generation {
            cache.categories = Some(categories.clone());
        } else {
            debug!("Categories changed while fetching, not caching");
        }

        Ok(categories)
    }

    /// All foods, or only those whose `categoryId` equals `category_id`. Ordered by name.
    pub async fn foods(&self, category_id: Option<&str>) -> Result<Vec<Food>, StoreError> {
        let key = category_id.map(str::to_string);
        let generation = {
            let cache = self.cache.read().await;
            if let Some(foods) = cache.foods.get(&key) {
                return Ok(foods.clone());
            }

            cache.generation
        };

        let cacheable = match category_id {
            Some(id) => self
                .categories()
                .await?
                .iter()
                .any(|category| category.id == id),
            None => true,
        };

        let query = match category_id {
            Some(id) => Query::ordered_by(FIELD_NAME).where_eq(FIELD_CATEGORY_ID, id),
            None => Query::ordered_by(FIELD_NAME),
        };

        debug!("Fetching foods for {key:?}");
        let foods: Vec<Food> = self
            .store
            .list(FOODS, &query)
            .await?
            .iter()
            .filter_map(|(id, document)| food_from_document(id, document))
            .collect();

        let mut cache = self.cache.write().await;
        if !cacheable {
            debug!("Not caching foods for unknown category {key:?}");
        } else if cache.generation == generation {
            cache.foods.insert(key, foods.clone());
        } else {
            debug!("Foods changed while fetching, not caching");
        }

        Ok(foods)
    }

    pub async fn create_category(&self, name: &str) -> Result<String, StoreError> {
        let id = self.store.insert(CATEGORIES, category_document(name)).await?;
        info!("Created category {id}");

        self.invalidate_categories().await;
        Ok(id)
    }

    pub async fn rename_category(&self, id: &str, name: &str) -> Result<(), StoreError> {
        self.store
            .update(CATEGORIES, id, category_document(name))
            .await?;
        info!("Renamed category {id}");

        self.invalidate_categories().await;
        Ok(())
    }

    /// Foods referencing the category are left as they are.
    pub async fn delete_category(&self, id: &str) -> Result<(), StoreError> {
        self.store.delete(CATEGORIES, id).await?;
        info!("Deleted category {id}");

        self.invalidate_categories().await;
        Ok(())
    }

    pub async fn create_food(&self, food: NewFood) -> Result<String, StoreError> {
        let id = self.store.insert(FOODS, Document::from(food)).await?;
        info!("Created food {id}");

        self.invalidate_foods().await;
        Ok(id)
    }

    pub async fn update_food(&self, id: &str, patch: FoodPatch) -> Result<(), StoreError> {
        if patch.is_empty() {
            if !self.foods(None).await?.iter().any(|food| food.id == id) {
                return Err(StoreError::NotFound {
                    collection: FOODS.to_string(),
                    id: id.to_string(),
                });
            }

            debug!("Nothing to update for food {id}");
            return Ok(());
        }

        self.store.update(FOODS, id, Document::from(patch)).await?;
        info!("Updated food {id}");

        self.invalidate_foods().await;
        Ok(())
    }

    pub async fn delete_food(&self, id: &str) -> Result<(), StoreError> {
        self.store.delete(FOODS, id).await?;
        info!("Deleted food {id}");

        self.invalidate_foods().await;
        Ok(())
    }

    /// Drops every cached listing.
    pub async fn clear(&self) {
        let mut cache = self.cache.write().await;
        cache.generation += 1;
        cache.categories = None;
        cache.foods.clear();
    }

    async fn invalidate_categories(&self) {
        let mut cache = self.cache.write().await;
        cache.generation += 1;
        cache.categories = None;
    }

    async fn invalidate_foods(&self) {
        let mut cache = self.cache.write().await;
        cache.generation += 1;
        cache.foods.clear();
    }
}
