//! # Firestore
//!
//! REST client for the hosted document database.
//!
//! ## Endpoints
//! - List: `POST {base}:runQuery` with a structured query (equality filter + ascending order)
//! - Insert: `POST {base}/{collection}`, id is the last segment of the returned `name`
//! - Update: `PATCH {base}/{collection}/{id}` with an update mask and `currentDocument.exists=true`
//! - Delete: `DELETE {base}/{collection}/{id}`
//!
//! Field values travel in the typed wrapper format (`stringValue`, `doubleValue`, ...),
//! converted to and from plain JSON at this boundary.
use async_trait::async_trait;
use menu::Document;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use crate::database::{DocumentStore, Query, StoreError};

const FIRESTORE_URL: &str = "https://firestore.googleapis.com/v1";

pub struct FirestoreStore {
    client: Client,
    base: String,
    api_key: Option<String>,
    token: Option<String>,
}

#[derive(Deserialize)]
struct RemoteDocument {
    name: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

#[derive(Deserialize)]
struct QueryRow {
    document: Option<RemoteDocument>,
}

impl FirestoreStore {
    pub fn new(
        client: Client,
        project: &str,
        api_key: Option<String>,
        token: Option<String>,
    ) -> Self {
        Self {
            client,
            base: format!("{FIRESTORE_URL}/projects/{project}/databases/(default)/documents"),
            api_key,
            token,
        }
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let request = match &self.api_key {
            Some(key) => request.query(&[("key", key)]),
            None => request,
        };

        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn document_url(&self, collection: &str, id: &str) -> String {
        format!("{}/{collection}/{id}", self.base)
    }
}

#[async_trait]
impl DocumentStore for FirestoreStore {
    async fn list(
        &self,
        collection: &str,
        query: &Query,
    ) -> Result<Vec<(String, Document)>, StoreError> {
        let body = json!({ "structuredQuery": structured_query(collection, query) });
        debug!("Firestore query: {body}");

        let request = self
            .client
            .post(format!("{}:runQuery", self.base))
            .json(&body);
        let response = checked(self.authorize(request).send().await?, collection, "").await?;

        let rows: Vec<QueryRow> = response
            .json()
            .await
            .map_err(|e| StoreError::Malformed(e.to_string()))?;

        Ok(documents_from_rows(rows))
    }

    async fn insert(&self, collection: &str, document: Document) -> Result<String, StoreError> {
        let request = self
            .client
            .post(format!("{}/{collection}", self.base))
            .json(&json!({ "fields": encode_fields(document) }));
        let response = checked(self.authorize(request).send().await?, collection, "").await?;

        let created: RemoteDocument = response
            .json()
            .await
            .map_err(|e| StoreError::Malformed(e.to_string()))?;

        document_id(&created.name)
    }

    async fn update(&self, collection: &str, id: &str, fields: Document) -> Result<(), StoreError> {
        let mut params: Vec<(&str, &str)> = fields
            .keys()
            .map(|key| ("updateMask.fieldPaths", key.as_str()))
            .collect();
        params.push(("currentDocument.exists", "true"));

        let request = self
            .client
            .patch(self.document_url(collection, id))
            .query(&params)
            .json(&json!({ "fields": encode_fields(fields.clone()) }));
        checked(self.authorize(request).send().await?, collection, id).await?;

        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        let request = self.client.delete(self.document_url(collection, id));
        checked(self.authorize(request).send().await?, collection, id).await?;

        Ok(())
    }
}

async fn checked(response: Response, collection: &str, id: &str) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == StatusCode::NOT_FOUND {
        return Err(StoreError::NotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        });
    }

    let body: Value = response.json().await.unwrap_or(Value::Null);
    let message = body["error"]["message"]
        .as_str()
        .unwrap_or("unknown error")
        .to_string();

    Err(StoreError::Rejected {
        status: status.as_u16(),
        message,
    })
}

fn structured_query(collection: &str, query: &Query) -> Value {
    let mut structured = json!({ "from": [{ "collectionId": collection }] });

    if let Some((field, value)) = &query.filter {
        structured["where"] = json!({
            "fieldFilter": {
                "field": { "fieldPath": field },
                "op": "EQUAL",
                "value": { "stringValue": value },
            }
        });
    }

    if let Some(field) = &query.order_by {
        structured["orderBy"] = json!([{
            "field": { "fieldPath": field },
            "direction": "ASCENDING",
        }]);
    }

    structured
}

/// Rows without a document (read time markers) are skipped, so is a document with an unusable name.
fn documents_from_rows(rows: Vec<QueryRow>) -> Vec<(String, Document)> {
    rows.into_iter()
        .filter_map(|row| row.document)
        .filter_map(|document| match document_id(&document.name) {
            Ok(id) => Some((id, decode_fields(document.fields))),
            Err(e) => {
                warn!("Skipping document: {e}");
                None
            }
        })
        .collect()
}

fn document_id(name: &str) -> Result<String, StoreError> {
    name.rsplit('/')
        .next()
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or_else(|| StoreError::Malformed(format!("document name '{name}'")))
}

fn encode_fields(document: Document) -> Map<String, Value> {
    document
        .into_iter()
        .map(|(key, value)| (key, encode(value)))
        .collect()
}

fn encode(value: Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => match n.as_i64() {
            Some(i) => json!({ "integerValue": i.to_string() }),
            None => json!({ "doubleValue": n.as_f64() }),
        },
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(values) => json!({
            "arrayValue": { "values": values.into_iter().map(encode).collect::<Vec<_>>() }
        }),
        Value::Object(map) => json!({ "mapValue": { "fields": encode_fields(map) } }),
    }
}

/// Fields of a type the menu never stores are dropped, the rest of the document is kept.
fn decode_fields(fields: Map<String, Value>) -> Document {
    fields
        .into_iter()
        .filter_map(|(key, value)| match decode(value) {
            Ok(value) => Some((key, value)),
            Err(e) => {
                warn!("Dropping field {key}: {e}");
                None
            }
        })
        .collect()
}

fn decode(value: Value) -> Result<Value, StoreError> {
    let Value::Object(mut typed) = value else {
        return Err(StoreError::Malformed("field is not a typed value".to_string()));
    };

    let Some((kind, inner)) = typed.iter_mut().next().map(|(k, v)| (k.clone(), v.take())) else {
        return Err(StoreError::Malformed("empty typed value".to_string()));
    };

    let decoded = match kind.as_str() {
        "nullValue" => Value::Null,
        "booleanValue" | "doubleValue" => inner,
        "stringValue" | "timestampValue" | "referenceValue" => inner,
        "integerValue" => inner
            .as_str()
            .and_then(|raw| raw.parse::<i64>().ok())
            .map(Value::from)
            .ok_or_else(|| StoreError::Malformed(format!("integer value {inner}")))?,
        "arrayValue" => Value::Array(
            inner["values"]
                .as_array()
                .cloned()
                .unwrap_or_default()
                .into_iter()
                .map(decode)
                .collect::<Result<_, _>>()?,
        ),
        "mapValue" => Value::Object(decode_fields(
            inner["fields"].as_object().cloned().unwrap_or_default(),
        )),
        other => return Err(StoreError::Malformed(format!("unsupported value type {other}"))),
    };

    Ok(decoded)
}
