/// Full-database export and import
///
/// An export captures every collection as an array of documents, keys and
/// timestamps included. Importing a snapshot replaces each collection it
/// names: the collection is cleared then repopulated inside one
/// transaction. Collections are processed one after another, so a failure
/// part-way through leaves earlier collections replaced and later ones
/// untouched. Import is a manual administrative operation and is not atomic
/// across collections. A document that does not match its record type
/// rolls back the whole collection it belongs to.

use super::{
    check_shape, into_object, take_key, timestamp, Collection, DocumentKey, Store, StoreError, StoreResult,
    CREATED_FIELD, MODIFIED_FIELD,
};
use crate::events::Operation;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Serialized copy of the whole store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Schema version the snapshot was taken at
    pub version: i64,

    /// When the snapshot was taken
    #[serde(rename = "exportDate", alias = "date_export")]
    pub export_date: DateTime<Utc>,

    /// Documents per collection name
    #[serde(alias = "donnees")]
    pub collections: BTreeMap<String, Vec<Value>>,
}

/// Outcome of an import
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportReport {
    /// Number of documents written per replaced collection
    pub imported: BTreeMap<String, usize>,

    /// Collection names present in the snapshot but unknown to the store
    pub skipped: Vec<String>,
}

impl Store {
    /// Exports every collection
    pub async fn export_all(&self) -> StoreResult<Snapshot> {
        let mut collections = BTreeMap::new();
        for collection in Collection::ALL {
            let documents = self.all_documents(collection).await?;
            collections.insert(collection.as_str().to_string(), documents);
        }

        let snapshot = Snapshot {
            version: self.schema_version().await?,
            export_date: Utc::now(),
            collections,
        };

        info!(
            version = snapshot.version,
            collections = snapshot.collections.len(),
            "Exported snapshot"
        );

        Ok(snapshot)
    }

    /// Replaces the collections named in `snapshot`
    ///
    /// Keys and timestamps carried by the documents are kept. Documents
    /// without timestamps are stamped with the import time.
    ///
    /// # Errors
    ///
    /// Fails on the first collection that cannot be written, including one
    /// holding a document that does not match its record type
    /// (`StoreError::InvalidDocument`). Collections imported before it stay
    /// replaced; the failing one keeps its previous content.
    pub async fn import_all(&self, snapshot: &Snapshot) -> StoreResult<ImportReport> {
        let mut report = ImportReport::default();

        for (name, documents) in &snapshot.collections {
            let Some(collection) = Collection::parse(name) else {
                warn!(collection = %name, "Skipping unknown collection in snapshot");
                report.skipped.push(name.clone());
                continue;
            };

            let written = self.replace_collection(collection, documents).await?;
            report.imported.insert(name.clone(), written);
            self.notify(collection, Operation::Imported, None);
        }

        info!(
            imported = report.imported.len(),
            skipped = report.skipped.len(),
            "Imported snapshot"
        );

        Ok(report)
    }

    async fn replace_collection(&self, collection: Collection, documents: &[Value]) -> StoreResult<usize> {
        let table = collection.as_str();
        let key_field = collection.key_field();
        let now = Value::String(timestamp(Utc::now()));

        let mut tx = self.pool.begin().await?;

        sqlx::query(&format!("DELETE FROM {}", table))
            .execute(&mut *tx)
            .await?;

        for (position, document) in documents.iter().enumerate() {
            let mut body = into_object(collection, document.clone())?;
            let key = take_key(collection, &mut body)?;
            body.entry(CREATED_FIELD).or_insert_with(|| now.clone());
            body.entry(MODIFIED_FIELD).or_insert_with(|| now.clone());
            if let Err(e) = check_shape(collection, &body) {
                warn!(collection = %collection, position, error = %e, "Rejecting snapshot collection");
                return Err(e);
            }
            let body = Value::Object(body).to_string();

            let result = match key {
                Some(DocumentKey::Id(id)) => {
                    sqlx::query(&format!("INSERT INTO {} ({}, body) VALUES (?, ?)", table, key_field))
                        .bind(id)
                        .bind(body)
                        .execute(&mut *tx)
                        .await
                }
                Some(DocumentKey::Name(name)) => {
                    sqlx::query(&format!("INSERT INTO {} ({}, body) VALUES (?, ?)", table, key_field))
                        .bind(name)
                        .bind(body)
                        .execute(&mut *tx)
                        .await
                }
                None => {
                    sqlx::query(&format!("INSERT INTO {} (body) VALUES (?)", table))
                        .bind(body)
                        .execute(&mut *tx)
                        .await
                }
            };
            result.map_err(|e| StoreError::from_write(collection, e))?;
        }

        tx.commit().await?;

        Ok(documents.len())
    }
}
