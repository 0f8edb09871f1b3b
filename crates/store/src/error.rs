use thiserror::Error;

/// Engine-level cause of a failed statement.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The database driver reported an error (connectivity, constraint, statement).
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A backend without a driver refused the write.
    #[error("write rejected: {0}")]
    Rejected(String),
}

/// Failure of the multi-row order write.
#[derive(Debug, Error)]
pub enum TransactionError {
    /// Inserting the order row failed; the transaction was rolled back.
    #[error("error inserting order: {0}")]
    OrderInsert(#[source] BackendError),

    /// Inserting the item at `position` (zero-based, caller order) failed;
    /// the transaction was rolled back.
    #[error("error inserting order item {position}: {source}")]
    ItemInsert {
        position: usize,
        #[source]
        source: BackendError,
    },

    /// Every insert succeeded but the commit did not.
    #[error("error committing order transaction: {0}")]
    Commit(#[source] BackendError),

    /// An insert failed and the rollback that followed failed too.
    /// The database may hold partial state.
    #[error("error rolling back order transaction after `{cause}`: {rollback}")]
    RollbackFailed {
        cause: Box<TransactionError>,
        #[source]
        rollback: BackendError,
    },
}

impl TransactionError {
    /// True when the database may be left in an unknown state.
    pub fn is_fatal(&self) -> bool {
        matches!(self, TransactionError::RollbackFailed { .. })
    }
}

/// Errors returned by the storage contract.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No row matches the requested identity (or lookup key).
    #[error("{entity} {key} not found")]
    NotFound { entity: &'static str, key: String },

    /// An operation that needs a persisted record received an unidentified one.
    #[error("cannot {operation} {entity} without an identity")]
    MissingIdentity {
        entity: &'static str,
        operation: &'static str,
    },

    /// The backend failed outside the order transaction.
    #[error("{entity} {operation} failed: {source}")]
    Persistence {
        entity: &'static str,
        operation: &'static str,
        #[source]
        source: BackendError,
    },

    /// The order transaction failed.
    #[error("order transaction failed: {0}")]
    Transaction(#[from] TransactionError),
}

impl StoreError {
    /// Builds a `NotFound` for the record identified by `key`.
    pub fn not_found(entity: &'static str, key: impl std::fmt::Display) -> Self {
        StoreError::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    /// Builds a persistence error for `operation` on `entity`.
    pub fn persistence(
        entity: &'static str,
        operation: &'static str,
        source: impl Into<BackendError>,
    ) -> Self {
        StoreError::Persistence {
            entity,
            operation,
            source: source.into(),
        }
    }

    /// Returns true for `NotFound`.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    /// True when the database may be left in an unknown state.
    pub fn is_fatal(&self) -> bool {
        matches!(self, StoreError::Transaction(e) if e.is_fatal())
    }
}

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RecordId;

    #[test]
    fn rollback_failure_is_fatal_and_keeps_cause() {
        let err = TransactionError::RollbackFailed {
            cause: Box::new(TransactionError::ItemInsert {
                position: 0,
                source: BackendError::Rejected("quantity must be positive".into()),
            }),
            rollback: BackendError::Rejected("connection reset".into()),
        };

        assert!(err.is_fatal());
        let message = err.to_string();
        assert!(message.contains("order item 0"));
        assert!(message.contains("connection reset"));

        let store_err = StoreError::from(err);
        assert!(store_err.is_fatal());
    }

    #[test]
    fn insert_failure_is_not_fatal() {
        let err = StoreError::from(TransactionError::OrderInsert(BackendError::Rejected(
            "boom".into(),
        )));
        assert!(!err.is_fatal());
        assert!(!err.is_not_found());
    }

    #[test]
    fn not_found_names_entity_and_id() {
        let err = StoreError::not_found("product", RecordId::new(9));
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "product 9 not found");
    }
}
