//! Database error handling utilities
//!
//! ```rust,ignore
//! sqlx::query("INSERT INTO spaces ...")
//!     .execute(&mut *conn)
//!     .await
//!     .map_err(|e| map_unique_violation(e, || format!("Space {} already exists", code)))?;
//! ```

use sqlx::Error as SqlxError;

use crate::error::ApiError;

/// Check if the error is a unique constraint violation
pub fn is_unique_violation(error: &SqlxError) -> bool {
    if let SqlxError::Database(db_err) = error {
        return db_err.is_unique_violation();
    }
    false
}

/// Check if the error is a foreign key violation
pub fn is_foreign_key_violation(error: &SqlxError) -> bool {
    if let SqlxError::Database(db_err) = error {
        return db_err.is_foreign_key_violation();
    }
    false
}

/// Turn a unique violation into a user failure with the given message
pub fn map_unique_violation(error: SqlxError, message: impl FnOnce() -> String) -> ApiError {
    if is_unique_violation(&error) {
        ApiError::UserFailure(message())
    } else {
        ApiError::Database(error)
    }
}

/// Turn a foreign key violation into an "is being used" failure
pub fn map_foreign_key_violation(error: SqlxError, what: impl FnOnce() -> String) -> ApiError {
    if is_foreign_key_violation(&error) {
        ApiError::being_used(what())
    } else {
        ApiError::Database(error)
    }
}
