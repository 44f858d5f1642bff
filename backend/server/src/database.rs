//! # Document Store
//!
//! External document database holding the two menu collections.
//!
//! ## Requirements
//!
//! - Listing ordered by a field, optionally filtered by equality on one string field
//! - Store assigned ids
//! - Partial updates, last write wins per document
//! - No transactions across collections
//!
//! ## Implementation
//!
//! - [`DocumentStore`] is the only seam, everything above it deals in [`Document`] maps
//! - [`MemoryStore`]: in process, used for local runs and tests
//! - [`FirestoreStore`](crate::firestore::FirestoreStore): REST client for the hosted database
//! - Ordering follows the hosted database: documents missing the order field are left out
use std::{
    cmp::Ordering,
    collections::{BTreeMap, HashMap},
};

use async_trait::async_trait;
use menu::Document;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{collection}/{id} not found")]
    NotFound { collection: String, id: String },

    #[error("Could not reach the database: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Database rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Malformed database response: {0}")]
    Malformed(String),
}

/// Equality filter plus ordering, the only query shapes the menu needs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Query {
    pub filter: Option<(String, String)>,
    pub order_by: Option<String>,
}

impl Query {
    pub fn ordered_by(field: &str) -> Self {
        Self {
            filter: None,
            order_by: Some(field.to_string()),
        }
    }

    pub fn where_eq(mut self, field: &str, value: &str) -> Self {
        self.filter = Some((field.to_string(), value.to_string()));
        self
    }

    fn matches(&self, document: &Document) -> bool {
        let Some((field, value)) = &self.filter else {
            return true;
        };

        document.get(field).and_then(Value::as_str) == Some(value.as_str())
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn list(&self, collection: &str, query: &Query)
    -> Result<Vec<(String, Document)>, StoreError>;

    /// Returns the id assigned by the store.
    async fn insert(&self, collection: &str, document: Document) -> Result<String, StoreError>;

    /// Merges `fields` into an existing document.
    async fn update(&self, collection: &str, id: &str, fields: Document) -> Result<(), StoreError>;

    /// Deleting a missing document is not an error.
    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError>;
}

#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, BTreeMap<String, Document>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn list(
        &self,
        collection: &str,
        query: &Query,
    ) -> Result<Vec<(String, Document)>, StoreError> {
        let collections = self.collections.read().await;
        let Some(documents) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        let mut found: Vec<(String, Document)> = documents
            .iter()
            .filter(|(_, document)| query.matches(document))
            .filter(|(_, document)| {
                query
                    .order_by
                    .as_ref()
                    .is_none_or(|field| document.contains_key(field))
            })
            .map(|(id, document)| (id.clone(), document.clone()))
            .collect();

        if let Some(field) = &query.order_by {
            found.sort_by(|(_, a), (_, b)| compare(&a[field], &b[field]));
        }

        Ok(found)
    }

    async fn insert(&self, collection: &str, document: Document) -> Result<String, StoreError> {
        let id = Uuid::new_v4().simple().to_string();

        self.collections
            .write()
            .await
            .entry(collection.to_string())
            .or_default()
            .insert(id.clone(), document);

        Ok(id)
    }

    async fn update(&self, collection: &str, id: &str, fields: Document) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        let document = collections
            .get_mut(collection)
            .and_then(|documents| documents.get_mut(id))
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;

        document.extend(fields);

        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        if let Some(documents) = self.collections.write().await.get_mut(collection) {
            documents.remove(id);
        }

        Ok(())
    }
}

// numbers sort before strings, anything else last
fn compare(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::String(a), Value::String(b)) => a.cmp(b),
        (Value::Number(a), Value::Number(b)) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::Number(_), _) => Ordering::Less,
        (_, Value::Number(_)) => Ordering::Greater,
        (Value::String(_), _) => Ordering::Less,
        (_, Value::String(_)) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}
