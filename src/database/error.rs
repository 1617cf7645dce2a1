use std::fmt::{self, Display};

use crate::error::{Error, HttpError};

pub struct QueryError {
    info: String,
    constraint: Option<String>,
}

impl QueryError {
    pub fn new(info: String) -> Self {
        Self {
            info,
            constraint: None,
        }
    }

    /// Name of the unique constraint the statement violated, if any.
    pub fn unique_violation(&self) -> Option<&str> {
        self.constraint.as_deref()
    }
}

impl From<sqlx::Error> for QueryError {
    fn from(value: sqlx::Error) -> Self {
        match value {
            sqlx::Error::Database(e) => {
                let constraint = if e.is_unique_violation() {
                    e.constraint().map(String::from)
                } else {
                    None
                };

                Self {
                    info: format!("{e}"),
                    constraint,
                }
            }
            sqlx::Error::RowNotFound => Self::new(String::from("Row not found")),
            sqlx::Error::PoolTimedOut => Self::new(String::from("Pool timed out")),
            sqlx::Error::PoolClosed => Self::new(String::from("Pool closed")),
            sqlx::Error::WorkerCrashed => Self::new(String::from("Worker crashed")),
            sqlx::Error::ColumnNotFound(e) => Self::new(format!("Column not found: {e}")),
            sqlx::Error::ColumnDecode { index, source } => {
                Self::new(format!("Column decode {index} ({source})"))
            }
            e => Self::new(format!("{e}")),
        }
    }
}

impl Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.info)
    }
}

impl From<QueryError> for Error {
    fn from(value: QueryError) -> Self {
        log::error!("> Query failed: {value}");
        HttpError::InternalServerError.default()
    }
}

pub struct CacheError {
    info: String,
}

impl From<redis::RedisError> for CacheError {
    fn from(value: redis::RedisError) -> Self {
        Self {
            info: format!("{:?} - {:?}", value.code(), value.detail()),
        }
    }
}

impl From<CacheError> for Error {
    fn from(value: CacheError) -> Self {
        log::error!("> Cache failed: {}", value.info);
        HttpError::InternalServerError.default()
    }
}
