/// Document endpoints over the store collections
///
/// Documents are plain JSON objects. Numeric collections (`cantons`,
/// `villages`, `quartiers`, `cotisants`, `paiements`, `types_cotisation`)
/// are keyed by `id`; `parametres` is keyed by `cle`.
///
/// # Endpoints
///
/// - `GET /v1/collections/:collection` - List documents in key order
/// - `POST /v1/collections/:collection` - Add a document
/// - `POST /v1/collections/:collection/search` - Documents matching every filter
/// - `GET /v1/collections/:collection/:id` - Fetch one document
/// - `PUT /v1/collections/:collection/:id` - Replace a document
/// - `DELETE /v1/collections/:collection/:id` - Remove a document

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use cotisations_shared::store::{Collection, DocumentKey, Filters};
use serde::Serialize;
use serde_json::Value;
use tracing::info;

/// Document list response
#[derive(Debug, Serialize)]
pub struct DocumentList {
    /// Number of documents returned
    pub total: usize,

    /// Documents in key order
    pub documents: Vec<Value>,
}

impl From<Vec<Value>> for DocumentList {
    fn from(documents: Vec<Value>) -> Self {
        Self {
            total: documents.len(),
            documents,
        }
    }
}

/// Resolves a collection name from the path
pub(crate) fn parse_collection(name: &str) -> ApiResult<Collection> {
    Collection::parse(name).ok_or_else(|| ApiError::NotFound(format!("Unknown collection: {}", name)))
}

/// Resolves a document key from the path
///
/// Numeric collections require an integer key.
pub(crate) fn parse_key(collection: Collection, raw: &str) -> ApiResult<DocumentKey> {
    if collection.has_numeric_key() {
        raw.parse::<i64>()
            .map(DocumentKey::Id)
            .map_err(|_| ApiError::invalid(collection.key_field(), format!("Invalid key: {}", raw)))
    } else {
        Ok(DocumentKey::Name(raw.to_string()))
    }
}

fn key_value(key: &DocumentKey) -> Value {
    match key {
        DocumentKey::Id(id) => Value::from(*id),
        DocumentKey::Name(name) => Value::from(name.as_str()),
    }
}

async fn fetch(state: &AppState, collection: Collection, key: &DocumentKey) -> ApiResult<Value> {
    state
        .store
        .get_document(collection, key)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No record {} in {}", key, collection)))
}

/// List documents
pub async fn list_documents(
    State(state): State<AppState>,
    Path(collection): Path<String>,
) -> ApiResult<Json<DocumentList>> {
    let collection = parse_collection(&collection)?;
    let documents = state.store.all_documents(collection).await?;
    Ok(Json(documents.into()))
}

/// Add a document
///
/// # Endpoint
///
/// ```text
/// POST /v1/collections/cantons
/// Content-Type: application/json
///
/// { "nom": "Golfe", "prefecture": "Lomé", "region": "Maritime" }
/// ```
///
/// # Response
///
/// `201 Created` with the stored document, key and timestamps included.
///
/// # Errors
///
/// - `400 Bad Request`: Not a JSON object, or a setting without `cle`
/// - `409 Conflict`: Duplicate canton or contribution type name
pub async fn add_document(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    Json(document): Json<Value>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let collection = parse_collection(&collection)?;
    let key = state.store.add_document(collection, document).await?;

    info!(collection = %collection, key = %key, "Document created");

    let stored = fetch(&state, collection, &key).await?;
    Ok((StatusCode::CREATED, Json(stored)))
}

/// Search documents
///
/// The body is an object of filters; dotted names reach nested fields.
/// String filters match case-insensitively by substring, `null` filters
/// are ignored and any other value must be equal.
///
/// ```text
/// POST /v1/collections/cotisants/search
///
/// { "village_id": 3, "nom": "agbo" }
/// ```
pub async fn search_documents(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    Json(filters): Json<Filters>,
) -> ApiResult<Json<DocumentList>> {
    let collection = parse_collection(&collection)?;
    let documents = state.store.search_documents(collection, &filters).await?;
    Ok(Json(documents.into()))
}

/// Fetch one document
pub async fn get_document(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
) -> ApiResult<Json<Value>> {
    let collection = parse_collection(&collection)?;
    let key = parse_key(collection, &id)?;
    Ok(Json(fetch(&state, collection, &key).await?))
}

/// Replace a document
///
/// The key in the path wins over any key in the body. `date_creation` is
/// kept and `date_modification` re-stamped.
///
/// # Errors
///
/// - `404 Not Found`: No document with this key
/// - `409 Conflict`: The new name is already taken
pub async fn update_document(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
    Json(document): Json<Value>,
) -> ApiResult<Json<Value>> {
    let collection = parse_collection(&collection)?;
    let key = parse_key(collection, &id)?;

    let Value::Object(mut body) = document else {
        return Err(ApiError::BadRequest("Document must be a JSON object".to_string()));
    };
    body.insert(collection.key_field().to_string(), key_value(&key));

    state.store.update_document(collection, Value::Object(body)).await?;

    info!(collection = %collection, key = %key, "Document updated");

    Ok(Json(fetch(&state, collection, &key).await?))
}

/// Remove a document
///
/// Children of a removed canton or village are left in place.
pub async fn delete_document(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    let collection = parse_collection(&collection)?;
    let key = parse_key(collection, &id)?;

    state.store.delete(collection, key.clone()).await?;

    info!(collection = %collection, key = %key, "Document deleted");

    Ok(StatusCode::NO_CONTENT)
}
