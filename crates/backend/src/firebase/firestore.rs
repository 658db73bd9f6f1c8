use brandmarket_config::FirebaseConfig;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde_json::{json, Value};
use tracing::debug;

use super::values::{decode_document, encode_fields, encode_value};
use super::{decode_json, error_from_response, TokenCell};
use crate::documents::{Direction, Document, DocumentStore, Fields, FilterOp, Query, WriteMode};
use crate::error::{BackendError, BackendResult};

/// Firestore v1 REST client for the `(default)` database.
pub struct FirestoreStore {
    http: reqwest::Client,
    api_key: Option<String>,
    documents_url: String,
    tokens: TokenCell,
}

impl FirestoreStore {
    pub(crate) fn new(http: reqwest::Client, config: &FirebaseConfig, tokens: TokenCell) -> Self {
        Self {
            http,
            api_key: config.api_key.clone(),
            documents_url: format!(
                "{}/projects/{}/databases/(default)/documents",
                config.firestore_base_url.trim_end_matches('/'),
                config.project_id
            ),
            tokens,
        }
    }

    async fn request(&self, method: Method, url: String) -> BackendResult<RequestBuilder> {
        let mut request = self.http.request(method, url);
        if let Some(key) = &self.api_key {
            request = request.query(&[("key", key)]);
        }
        if let Some(token) = self.tokens.bearer().await? {
            request = request.bearer_auth(token);
        }
        Ok(request)
    }

    async fn send(&self, request: RequestBuilder) -> BackendResult<reqwest::Response> {
        let response = request.send().await?;
        if response.status().is_success() {
            return Ok(response);
        }
        Err(error_from_response(response, classify_status).await)
    }
}

fn classify_status(message: &str, status: Option<&str>) -> BackendError {
    match status {
        Some("UNAUTHENTICATED") => BackendError::Unauthenticated,
        Some("RESOURCE_EXHAUSTED") => BackendError::RateLimited,
        Some("UNAVAILABLE" | "DEADLINE_EXCEEDED" | "INTERNAL") => {
            BackendError::Unavailable(message.to_string())
        }
        _ => BackendError::Rejected(message.to_string()),
    }
}

fn op_name(op: FilterOp) -> &'static str {
    match op {
        FilterOp::Equal => "EQUAL",
        FilterOp::LessThan => "LESS_THAN",
        FilterOp::LessThanOrEqual => "LESS_THAN_OR_EQUAL",
        FilterOp::GreaterThan => "GREATER_THAN",
        FilterOp::GreaterThanOrEqual => "GREATER_THAN_OR_EQUAL",
        FilterOp::ArrayContains => "ARRAY_CONTAINS",
    }
}

/// Build the `structuredQuery` body for `documents:runQuery`.
pub(crate) fn structured_query(collection: &str, query: &Query) -> Value {
    let mut structured = json!({ "from": [{ "collectionId": collection }] });

    let mut filters: Vec<Value> = query
        .filters
        .iter()
        .map(|filter| {
            json!({
                "fieldFilter": {
                    "field": { "fieldPath": filter.field },
                    "op": op_name(filter.op),
                    "value": encode_value(&filter.value),
                }
            })
        })
        .collect();

    if filters.len() == 1 {
        structured["where"] = filters.remove(0);
    } else if !filters.is_empty() {
        structured["where"] = json!({ "compositeFilter": { "op": "AND", "filters": filters } });
    }

    if let Some(order) = &query.order {
        let direction = match order.direction {
            Direction::Ascending => "ASCENDING",
            Direction::Descending => "DESCENDING",
        };
        structured["orderBy"] = json!([{ "field": { "fieldPath": order.field }, "direction": direction }]);
    }

    if let Some(limit) = query.limit {
        structured["limit"] = json!(limit);
    }

    json!({ "structuredQuery": structured })
}

impl DocumentStore for FirestoreStore {
    async fn put_document(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
        mode: WriteMode,
    ) -> BackendResult<()> {
        let mut request = self
            .request(Method::PATCH, format!("{}/{collection}/{id}", self.documents_url))
            .await?;
        if mode == WriteMode::Merge {
            let mask: Vec<(&str, &str)> = fields
                .keys()
                .map(|key| ("updateMask.fieldPaths", key.as_str()))
                .collect();
            request = request.query(&mask);
        }

        self.send(request.json(&json!({ "fields": encode_fields(&fields) })))
            .await?;
        debug!(collection, id, ?mode, "document written");
        Ok(())
    }

    async fn get_document(&self, collection: &str, id: &str) -> BackendResult<Option<Document>> {
        let response = self
            .request(Method::GET, format!("{}/{collection}/{id}", self.documents_url))
            .await?
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(error_from_response(response, classify_status).await);
        }

        let resource: Value = decode_json(response).await?;
        decode_document(&resource).map(Some)
    }

    async fn add_document(&self, collection: &str, fields: Fields) -> BackendResult<String> {
        let request = self
            .request(Method::POST, format!("{}/{collection}", self.documents_url))
            .await?
            .json(&json!({ "fields": encode_fields(&fields) }));

        let resource: Value = decode_json(self.send(request).await?).await?;
        let document = decode_document(&resource)?;
        debug!(collection, id = %document.id, "document created");
        Ok(document.id)
    }

    async fn delete_document(&self, collection: &str, id: &str) -> BackendResult<()> {
        let request = self
            .request(Method::DELETE, format!("{}/{collection}/{id}", self.documents_url))
            .await?;
        self.send(request).await?;
        Ok(())
    }

    async fn query_documents(&self, collection: &str, query: &Query) -> BackendResult<Vec<Document>> {
        let request = self
            .request(Method::POST, format!("{}:runQuery", self.documents_url))
            .await?
            .json(&structured_query(collection, query));

        let rows: Vec<Value> = decode_json(self.send(request).await?).await?;
        rows.iter()
            .filter_map(|row| row.get("document"))
            .map(decode_document)
            .collect()
    }
}
