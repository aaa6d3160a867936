/// Errors raised by the document store

use super::Collection;

/// Store result type alias
pub type StoreResult<T> = Result<T, StoreError>;

/// Document store error types
///
/// `Open` and `Migration` are fatal to the application; every other variant
/// is an operation failure returned to the caller.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The database could not be opened
    #[error("Failed to open the database: {0}")]
    Open(#[source] sqlx::Error),

    /// Schema migration failed
    #[error("Schema migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A uniqueness constraint was violated (e.g., duplicate canton name)
    #[error("Constraint violated in {collection}: {message}")]
    Constraint {
        collection: Collection,
        message: String,
    },

    /// The record does not carry the key required by the operation
    #[error("Record in {0} has no key")]
    MissingKey(Collection),

    /// No record with this key
    #[error("No record {key} in {collection}")]
    NotFound { collection: Collection, key: String },

    /// The document is not a JSON object or does not match the record type
    #[error("Invalid document for {collection}: {message}")]
    InvalidDocument {
        collection: Collection,
        message: String,
    },

    /// JSON (de)serialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Any other database failure
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    pub(crate) fn not_found(collection: Collection, key: impl ToString) -> Self {
        StoreError::NotFound {
            collection,
            key: key.to_string(),
        }
    }

    pub(crate) fn invalid(collection: Collection, message: impl Into<String>) -> Self {
        StoreError::InvalidDocument {
            collection,
            message: message.into(),
        }
    }

    /// Maps a write failure, turning unique violations into `Constraint`
    pub(crate) fn from_write(collection: Collection, err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                StoreError::Constraint {
                    collection,
                    message: db_err.message().to_string(),
                }
            }
            other => StoreError::Database(other),
        }
    }

    /// Whether the error is fatal for the application
    pub fn is_fatal(&self) -> bool {
        matches!(self, StoreError::Open(_) | StoreError::Migration(_))
    }
}
