/// Document store over SQLite
///
/// Every collection is a table of JSON documents keyed by an integer `id`
/// (or by the string `cle` for settings). The store stamps
/// `date_creation`/`date_modification` on writes, preserves unknown fields,
/// and publishes a `DataChanged` event after each mutation.
///
/// Writes to a typed collection are refused unless the document decodes
/// into that collection's record type, so typed reads never meet a row they
/// cannot decode.
///
/// # Example
///
/// ```no_run
/// use cotisations_shared::db::pool::DatabaseConfig;
/// use cotisations_shared::events::EventBus;
/// use cotisations_shared::models::canton::Canton;
/// use cotisations_shared::store::Store;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (store, seed) = Store::initialize(DatabaseConfig::default(), EventBus::default()).await?;
/// println!("Seeded {} cantons", seed.cantons);
///
/// let id = store.add(&Canton::new("Zio")).await?;
/// let canton: Option<Canton> = store.get_by_id(id).await?;
/// # Ok(())
/// # }
/// ```

mod collection;
mod error;
pub mod filter;
pub mod seed;
pub mod snapshot;

pub use collection::{Collection, Record};
pub use error::{StoreError, StoreResult};
pub use filter::Filters;
pub use seed::SeedReport;
pub use snapshot::{ImportReport, Snapshot};

use crate::db::migrations::{get_migration_status, run_migrations};
use crate::db::pool::{create_pool, DatabaseConfig};
use crate::events::{AppEvent, DataChange, EventBus, Operation};
use crate::models::canton::Canton;
use crate::models::contribution_type::ContributionType;
use crate::models::member::Member;
use crate::models::payment::Payment;
use crate::models::quarter::Quarter;
use crate::models::village::Village;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::sqlite::SqlitePool;
use std::fmt;
use tracing::{debug, info};

/// Field stamped when a record is first stored
pub const CREATED_FIELD: &str = "date_creation";

/// Field re-stamped on every write
pub const MODIFIED_FIELD: &str = "date_modification";

/// Primary key of a stored document
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DocumentKey {
    /// Auto-incrementing key of numeric collections
    Id(i64),

    /// String key of the settings collection
    Name(String),
}

impl DocumentKey {
    /// Returns the numeric key, if any
    pub fn as_id(&self) -> Option<i64> {
        match self {
            DocumentKey::Id(id) => Some(*id),
            DocumentKey::Name(_) => None,
        }
    }

    fn to_value(&self) -> Value {
        match self {
            DocumentKey::Id(id) => Value::from(*id),
            DocumentKey::Name(name) => Value::from(name.as_str()),
        }
    }

    /// Reads the key of `collection` from a document, if present and well typed
    fn from_document(collection: Collection, document: &Map<String, Value>) -> Option<Self> {
        let raw = document.get(collection.key_field())?;
        if collection.has_numeric_key() {
            raw.as_i64().map(DocumentKey::Id)
        } else {
            raw.as_str().map(|s| DocumentKey::Name(s.to_string()))
        }
    }
}

impl fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentKey::Id(id) => write!(f, "{}", id),
            DocumentKey::Name(name) => f.write_str(name),
        }
    }
}

impl From<i64> for DocumentKey {
    fn from(id: i64) -> Self {
        DocumentKey::Id(id)
    }
}

impl From<&str> for DocumentKey {
    fn from(name: &str) -> Self {
        DocumentKey::Name(name.to_string())
    }
}

impl From<String> for DocumentKey {
    fn from(name: String) -> Self {
        DocumentKey::Name(name)
    }
}

/// Stored setting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Setting {
    /// Setting key
    pub cle: String,

    /// JSON value
    pub valeur: Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_creation: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_modification: Option<DateTime<Utc>>,
}

/// Handle on the document store
///
/// Cloning is cheap: clones share the pool and the event bus.
#[derive(Debug, Clone)]
pub struct Store {
    pool: SqlitePool,
    events: EventBus,
}

impl Store {
    /// Opens the database, applies pending migrations and seeds reference data
    ///
    /// Seeding only happens when the canton collection is empty, so calling
    /// this on an already initialized database inserts nothing.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Open` when the database cannot be opened and
    /// `StoreError::Migration` when the schema cannot be brought up to date.
    /// Both are fatal to the application.
    pub async fn initialize(config: DatabaseConfig, events: EventBus) -> StoreResult<(Self, SeedReport)> {
        info!(url = %config.url, "Initializing document store");

        let pool = create_pool(config).await.map_err(StoreError::Open)?;
        run_migrations(&pool).await?;

        let store = Self::open(pool, events);
        let report = seed::seed_if_empty(&store).await?;

        info!(
            cantons = report.cantons,
            contribution_types = report.contribution_types,
            "Document store ready"
        );

        Ok((store, report))
    }

    /// Wraps an already migrated pool
    pub fn open(pool: SqlitePool, events: EventBus) -> Self {
        Self { pool, events }
    }

    /// Underlying connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Event bus mutations are published on
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Schema version: number of applied migrations, 0 before any
    pub async fn schema_version(&self) -> StoreResult<i64> {
        let status = get_migration_status(&self.pool).await?;
        Ok(i64::try_from(status.applied_migrations).unwrap_or(i64::MAX))
    }

    /// Inserts a document and returns its key
    ///
    /// Both timestamps are stamped with the current time. A document that
    /// already carries its key keeps it.
    ///
    /// # Errors
    ///
    /// - `StoreError::InvalidDocument` if the document is not a JSON object,
    ///   its key has the wrong type or it does not match the record type
    /// - `StoreError::MissingKey` for a setting without `cle`
    /// - `StoreError::Constraint` on a unique index violation
    pub async fn add_document(&self, collection: Collection, document: Value) -> StoreResult<DocumentKey> {
        let mut body = into_object(collection, document)?;
        let key = take_key(collection, &mut body)?;

        let now = timestamp(Utc::now());
        body.insert(CREATED_FIELD.to_string(), Value::String(now.clone()));
        body.insert(MODIFIED_FIELD.to_string(), Value::String(now));
        check_shape(collection, &body)?;

        let key = self.insert_body(collection, key, &body).await?;

        debug!(collection = %collection, key = %key, "Document added");
        self.notify(collection, Operation::Added, Some(key.clone()));

        Ok(key)
    }

    /// Fetches one document, with its key field restored
    pub async fn get_document(&self, collection: Collection, key: &DocumentKey) -> StoreResult<Option<Value>> {
        let sql = format!(
            "SELECT body FROM {} WHERE {} = ?",
            collection.as_str(),
            collection.key_field()
        );
        let query = sqlx::query_scalar::<_, String>(&sql);
        let query = match key {
            DocumentKey::Id(id) => query.bind(*id),
            DocumentKey::Name(name) => query.bind(name.clone()),
        };

        match query.fetch_optional(&self.pool).await? {
            Some(body) => Ok(Some(hydrate(collection, key, &body)?)),
            None => Ok(None),
        }
    }

    /// Fetches every document of a collection in key order
    pub async fn all_documents(&self, collection: Collection) -> StoreResult<Vec<Value>> {
        let sql = format!(
            "SELECT {key}, body FROM {table} ORDER BY {key}",
            key = collection.key_field(),
            table = collection.as_str()
        );

        if collection.has_numeric_key() {
            let rows: Vec<(i64, String)> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;
            rows.into_iter()
                .map(|(id, body)| hydrate(collection, &DocumentKey::Id(id), &body))
                .collect()
        } else {
            let rows: Vec<(String, String)> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;
            rows.into_iter()
                .map(|(name, body)| hydrate(collection, &DocumentKey::Name(name), &body))
                .collect()
        }
    }

    /// Replaces a stored document
    ///
    /// The document must carry its key. `date_creation` is kept from the
    /// stored record and `date_modification` is re-stamped, always later
    /// than the previous value.
    ///
    /// # Errors
    ///
    /// - `StoreError::MissingKey` if the document has no key
    /// - `StoreError::NotFound` if no record has this key
    /// - `StoreError::InvalidDocument` if the replacement does not match the
    ///   record type; the stored document is left as it was
    /// - `StoreError::Constraint` on a unique index violation
    pub async fn update_document(&self, collection: Collection, document: Value) -> StoreResult<DocumentKey> {
        let mut body = into_object(collection, document)?;
        let key = take_key(collection, &mut body)?.ok_or(StoreError::MissingKey(collection))?;

        let previous = self
            .get_document(collection, &key)
            .await?
            .ok_or_else(|| StoreError::not_found(collection, &key))?;

        let now = Utc::now();
        let previous_modified = previous
            .get(MODIFIED_FIELD)
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc));
        let modified = match previous_modified {
            Some(prev) if prev >= now => prev + Duration::microseconds(1),
            _ => now,
        };

        let created = previous
            .get(CREATED_FIELD)
            .cloned()
            .unwrap_or_else(|| Value::String(timestamp(now)));
        body.insert(CREATED_FIELD.to_string(), created);
        body.insert(MODIFIED_FIELD.to_string(), Value::String(timestamp(modified)));
        check_shape(collection, &body)?;

        let sql = format!(
            "UPDATE {} SET body = ? WHERE {} = ?",
            collection.as_str(),
            collection.key_field()
        );
        let query = sqlx::query(&sql).bind(Value::Object(body).to_string());
        let query = match &key {
            DocumentKey::Id(id) => query.bind(*id),
            DocumentKey::Name(name) => query.bind(name.clone()),
        };
        let result = query
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::from_write(collection, e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(collection, &key));
        }

        debug!(collection = %collection, key = %key, "Document updated");
        self.notify(collection, Operation::Modified, Some(key.clone()));

        Ok(key)
    }

    /// Removes a document
    ///
    /// Dependent records are left untouched.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if no record has this key.
    pub async fn delete(&self, collection: Collection, key: impl Into<DocumentKey>) -> StoreResult<()> {
        let key = key.into();
        let sql = format!(
            "DELETE FROM {} WHERE {} = ?",
            collection.as_str(),
            collection.key_field()
        );
        let query = sqlx::query(&sql);
        let query = match &key {
            DocumentKey::Id(id) => query.bind(*id),
            DocumentKey::Name(name) => query.bind(name.clone()),
        };
        let result = query.execute(&self.pool).await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(collection, &key));
        }

        debug!(collection = %collection, key = %key, "Document deleted");
        self.notify(collection, Operation::Deleted, Some(key));

        Ok(())
    }

    /// Returns the documents matching every filter
    ///
    /// See [`filter::matches`] for the matching rules.
    pub async fn search_documents(&self, collection: Collection, filters: &Filters) -> StoreResult<Vec<Value>> {
        let documents = self.all_documents(collection).await?;
        Ok(documents
            .into_iter()
            .filter(|doc| filter::matches(doc, filters))
            .collect())
    }

    /// Number of documents in a collection
    pub async fn count(&self, collection: Collection) -> StoreResult<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", collection.as_str());
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
        Ok(count)
    }

    /// Inserts a typed record and returns its id
    pub async fn add<R: Record>(&self, record: &R) -> StoreResult<i64> {
        let document = serde_json::to_value(record)?;
        let key = self.add_document(R::COLLECTION, document).await?;
        key.as_id().ok_or(StoreError::MissingKey(R::COLLECTION))
    }

    /// Fetches a typed record by id
    pub async fn get_by_id<R: Record>(&self, id: i64) -> StoreResult<Option<R>> {
        self.get_document(R::COLLECTION, &DocumentKey::Id(id))
            .await?
            .map(decode::<R>)
            .transpose()
    }

    /// Fetches every record of a type in id order
    pub async fn get_all<R: Record>(&self) -> StoreResult<Vec<R>> {
        self.all_documents(R::COLLECTION)
            .await?
            .into_iter()
            .map(decode::<R>)
            .collect()
    }

    /// Replaces a typed record; it must carry its id
    pub async fn update<R: Record>(&self, record: &R) -> StoreResult<()> {
        if record.id().is_none() {
            return Err(StoreError::MissingKey(R::COLLECTION));
        }
        let document = serde_json::to_value(record)?;
        self.update_document(R::COLLECTION, document).await?;
        Ok(())
    }

    /// Typed variant of [`Store::search_documents`]
    pub async fn search<R: Record>(&self, filters: &Filters) -> StoreResult<Vec<R>> {
        self.search_documents(R::COLLECTION, filters)
            .await?
            .into_iter()
            .map(decode::<R>)
            .collect()
    }

    /// Reads a setting value
    pub async fn get_setting<T: DeserializeOwned>(&self, key: &str) -> StoreResult<Option<T>> {
        let document = self
            .get_document(Collection::Settings, &DocumentKey::from(key))
            .await?;

        match document {
            Some(doc) => {
                let setting: Setting = serde_json::from_value(doc)
                    .map_err(|e| StoreError::invalid(Collection::Settings, e.to_string()))?;
                Ok(Some(serde_json::from_value(setting.valeur)?))
            }
            None => Ok(None),
        }
    }

    /// Writes a setting value, creating the setting if needed
    pub async fn set_setting<T: Serialize>(&self, key: &str, value: &T) -> StoreResult<()> {
        let setting = Setting {
            cle: key.to_string(),
            valeur: serde_json::to_value(value)?,
            date_creation: None,
            date_modification: None,
        };
        let document = serde_json::to_value(&setting)?;

        let exists = self
            .get_document(Collection::Settings, &DocumentKey::from(key))
            .await?
            .is_some();

        if exists {
            self.update_document(Collection::Settings, document).await?;
        } else {
            self.add_document(Collection::Settings, document).await?;
        }
        Ok(())
    }

    /// Removes a setting; returns false if it did not exist
    pub async fn delete_setting(&self, key: &str) -> StoreResult<bool> {
        match self.delete(Collection::Settings, key).await {
            Ok(()) => Ok(true),
            Err(StoreError::NotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn insert_body(
        &self,
        collection: Collection,
        key: Option<DocumentKey>,
        body: &Map<String, Value>,
    ) -> StoreResult<DocumentKey> {
        let table = collection.as_str();
        let key_field = collection.key_field();
        let body = Value::Object(body.clone()).to_string();

        let result = match &key {
            Some(DocumentKey::Id(id)) => {
                sqlx::query(&format!("INSERT INTO {} ({}, body) VALUES (?, ?)", table, key_field))
                    .bind(*id)
                    .bind(body)
                    .execute(&self.pool)
                    .await
            }
            Some(DocumentKey::Name(name)) => {
                sqlx::query(&format!("INSERT INTO {} ({}, body) VALUES (?, ?)", table, key_field))
                    .bind(name.clone())
                    .bind(body)
                    .execute(&self.pool)
                    .await
            }
            None => {
                sqlx::query(&format!("INSERT INTO {} (body) VALUES (?)", table))
                    .bind(body)
                    .execute(&self.pool)
                    .await
            }
        }
        .map_err(|e| StoreError::from_write(collection, e))?;

        Ok(key.unwrap_or(DocumentKey::Id(result.last_insert_rowid())))
    }

    fn notify(&self, collection: Collection, operation: Operation, key: Option<DocumentKey>) {
        self.events.publish(AppEvent::DataChanged(DataChange {
            collection,
            operation,
            key,
        }));
    }
}

/// RFC 3339 timestamp with microsecond precision
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn into_object(collection: Collection, document: Value) -> StoreResult<Map<String, Value>> {
    match document {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::invalid(
            collection,
            format!("expected a JSON object, got {}", json_kind(&other)),
        )),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Removes the key field from a document body
///
/// A null or absent key yields `None`; settings require their key.
fn take_key(collection: Collection, body: &mut Map<String, Value>) -> StoreResult<Option<DocumentKey>> {
    let key = DocumentKey::from_document(collection, body);

    match body.remove(collection.key_field()) {
        None | Some(Value::Null) => {}
        Some(_) if key.is_none() => {
            return Err(StoreError::invalid(
                collection,
                format!("field '{}' has the wrong type", collection.key_field()),
            ));
        }
        Some(_) => {}
    }

    if key.is_none() && !collection.has_numeric_key() {
        return Err(StoreError::MissingKey(collection));
    }

    Ok(key)
}

/// Rebuilds a document from its stored body and key
fn hydrate(collection: Collection, key: &DocumentKey, body: &str) -> StoreResult<Value> {
    let mut document = into_object(collection, serde_json::from_str(body)?)?;
    document.insert(collection.key_field().to_string(), key.to_value());
    Ok(Value::Object(document))
}

fn decode<R: Record>(document: Value) -> StoreResult<R> {
    serde_json::from_value(document).map_err(|e| StoreError::invalid(R::COLLECTION, e.to_string()))
}

/// Refuses a body that would not decode into its collection's record type
///
/// Settings hold arbitrary values and are not checked.
fn check_shape(collection: Collection, body: &Map<String, Value>) -> StoreResult<()> {
    let document = Value::Object(body.clone());
    match collection {
        Collection::Members => decode::<Member>(document).map(|_| ()),
        Collection::Payments => decode::<Payment>(document).map(|_| ()),
        Collection::Cantons => decode::<Canton>(document).map(|_| ()),
        Collection::Villages => decode::<Village>(document).map(|_| ()),
        Collection::Quarters => decode::<Quarter>(document).map(|_| ()),
        Collection::ContributionTypes => decode::<ContributionType>(document).map(|_| ()),
        Collection::Settings => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_take_key_strips_numeric_id() {
        let mut body = json!({"id": 4, "nom": "Bè"}).as_object().cloned().unwrap();
        let key = take_key(Collection::Villages, &mut body).unwrap();
        assert_eq!(key, Some(DocumentKey::Id(4)));
        assert!(!body.contains_key("id"));
    }

    #[test]
    fn test_take_key_accepts_missing_or_null_id() {
        let mut body = json!({"id": null, "nom": "Bè"}).as_object().cloned().unwrap();
        assert_eq!(take_key(Collection::Villages, &mut body).unwrap(), None);

        let mut body = json!({"nom": "Bè"}).as_object().cloned().unwrap();
        assert_eq!(take_key(Collection::Villages, &mut body).unwrap(), None);
    }

    #[test]
    fn test_take_key_rejects_wrong_type() {
        let mut body = json!({"id": "quatre"}).as_object().cloned().unwrap();
        let err = take_key(Collection::Cantons, &mut body).unwrap_err();
        assert!(matches!(err, StoreError::InvalidDocument { .. }));
    }

    #[test]
    fn test_settings_require_their_key() {
        let mut body = json!({"valeur": 1}).as_object().cloned().unwrap();
        let err = take_key(Collection::Settings, &mut body).unwrap_err();
        assert!(matches!(err, StoreError::MissingKey(Collection::Settings)));
    }

    #[test]
    fn test_hydrate_restores_key() {
        let doc = hydrate(Collection::Settings, &DocumentKey::from("theme"), r#"{"valeur":"sombre"}"#).unwrap();
        assert_eq!(doc, json!({"cle": "theme", "valeur": "sombre"}));
    }

    #[test]
    fn test_document_key_serializes_untagged() {
        assert_eq!(serde_json::to_value(DocumentKey::Id(3)).unwrap(), json!(3));
        assert_eq!(serde_json::to_value(DocumentKey::from("x")).unwrap(), json!("x"));
        assert_eq!(DocumentKey::Id(3).to_string(), "3");
    }

    #[test]
    fn test_timestamp_has_microseconds() {
        let at = DateTime::parse_from_rfc3339("2024-01-02T03:04:05.123456Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(timestamp(at), "2024-01-02T03:04:05.123456Z");
    }
}
