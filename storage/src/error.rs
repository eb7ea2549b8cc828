//! Mapping of sqlx errors onto the store's error taxonomy.

use escrow_core::StoreError;
use sqlx::error::ErrorKind;

/// Constraint failures are per-record; everything else means the store is unavailable.
pub(crate) fn store_error(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        match db.kind() {
            ErrorKind::UniqueViolation
            | ErrorKind::ForeignKeyViolation
            | ErrorKind::NotNullViolation
            | ErrorKind::CheckViolation => {
                return StoreError::ConstraintViolation(db.message().to_string());
            }
            _ => {}
        }
    }
    StoreError::Unavailable(e.to_string())
}
