use chrono::{DateTime, Utc};
use flowgate_core::errors::RepositoryError;

pub mod booking;
pub mod conversation;
pub mod definition;

pub use booking::SqlBookingRepository;
pub use conversation::SqlConversationLog;
pub use definition::SqlDefinitionRepository;

pub(crate) fn db_error(error: sqlx::Error) -> RepositoryError {
    RepositoryError::Database(error.to_string())
}

pub(crate) fn decode_error(error: sqlx::Error) -> RepositoryError {
    RepositoryError::Decode(error.to_string())
}

pub(crate) fn parse_timestamp(column: &str, value: String) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(&value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("invalid timestamp in `{column}`: {e}")))
}
