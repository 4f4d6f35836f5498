use std::fmt::{self, Display};

use sqlx::error::ErrorKind;
use thiserror::Error;
use warp::{http::StatusCode, reject::Reject};

#[derive(Debug)]
pub struct QueryError {
    info: String,
}

impl QueryError {
    pub fn new(info: String) -> Self {
        Self { info }
    }

    pub fn info(&self) -> &str {
        &self.info
    }
}

impl From<sqlx::Error> for QueryError {
    fn from(value: sqlx::Error) -> Self {
        match value {
            sqlx::Error::Configuration(e) => Self::new(format!("{e}")),
            sqlx::Error::Database(e) => Self::new(format!("{e}")),
            sqlx::Error::Io(e) => Self::new(format!("{e}")),
            sqlx::Error::Tls(e) => Self::new(format!("{e}")),
            sqlx::Error::Protocol(e) => Self::new(e),
            sqlx::Error::RowNotFound => Self::new(String::from("RowNotFound")),
            sqlx::Error::TypeNotFound { type_name } => {
                Self::new(format!("Type not found: {type_name}"))
            }
            sqlx::Error::ColumnIndexOutOfBounds { index, len } => {
                Self::new(format!("Column index out of bounds {index} ({len})"))
            }
            sqlx::Error::ColumnNotFound(e) => Self::new(e),
            sqlx::Error::ColumnDecode { index, source } => {
                Self::new(format!("Column decode {index} ({source})"))
            }
            sqlx::Error::Decode(e) => Self::new(format!("{e}")),
            sqlx::Error::PoolTimedOut => Self::new(String::from("Pool timed out")),
            sqlx::Error::PoolClosed => Self::new(String::from("Pool closed")),
            sqlx::Error::WorkerCrashed => Self::new(String::from("Worker crashed")),
            sqlx::Error::Migrate(e) => Self::new(format!("{e}")),
            _ => Self::new(String::from("Unknown error")),
        }
    }
}

impl Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.info)
    }
}

impl std::error::Error for QueryError {}

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("Internal server error")]
    Query(#[source] QueryError),
}

impl ServiceError {
    pub fn validation(info: &str) -> Self {
        Self::Validation(info.to_string())
    }

    pub fn not_found(info: &str) -> Self {
        Self::NotFound(info.to_string())
    }

    /// Conflicts are reported as 400 like any other rejected input.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::Conflict(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Query(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for ServiceError {
    fn from(value: sqlx::Error) -> Self {
        if let sqlx::Error::RowNotFound = value {
            return Self::not_found("Not found");
        }

        if let Some(database_error) = value.as_database_error() {
            let info = database_error.message().to_string();
            match database_error.kind() {
                ErrorKind::UniqueViolation => return Self::Conflict(info),
                ErrorKind::ForeignKeyViolation => return Self::NotFound(info),
                ErrorKind::CheckViolation => return Self::Validation(info),
                _ => {}
            }
        }

        let error = QueryError::from(value);
        log::error!("Query failed: {error}");
        Self::Query(error)
    }
}

impl Reject for ServiceError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_error_taxonomy() {
        assert_eq!(
            ServiceError::validation("bad").status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::Conflict(String::from("exists")).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::not_found("missing").status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServiceError::Unauthorized(String::from("who")).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ServiceError::Forbidden(String::from("no")).status(),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn row_not_found_becomes_not_found() {
        let error = ServiceError::from(sqlx::Error::RowNotFound);
        assert!(matches!(error, ServiceError::NotFound(_)));
    }

    #[test]
    fn driver_failures_hide_their_details() {
        let error = ServiceError::from(sqlx::Error::PoolTimedOut);

        assert_eq!(error.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error.to_string(), "Internal server error");
        match error {
            ServiceError::Query(query) => assert_eq!(query.info(), "Pool timed out"),
            other => panic!("unexpected error {other:?}"),
        }
    }
}
