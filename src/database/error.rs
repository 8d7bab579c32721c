use std::fmt;

use crate::error::{AppError, AppErrorKind};

/// Storage error kinds
#[derive(Debug, Clone)]
pub enum DatabaseErrorKind {
    /// Connection pool is exhausted
    PoolExhausted,
    /// Record not found
    NotFound {
        entity: String,
        id: String,
    },
    /// Unique constraint violation (e.g., duplicate external id)
    UniqueConstraintViolation {
        column: String,
        value: String,
    },
    /// Foreign key constraint violation
    ForeignKeyViolation {
        table: String,
        column: String,
    },
    /// Query execution error
    QueryError {
        message: String,
    },
    /// Stored row cannot be mapped back to a domain value
    Corrupt {
        message: String,
    },
    /// Database connection error
    ConnectionError {
        message: String,
    },
    /// Unknown error
    Unknown {
        message: String,
    },
}

/// Result type for database operations
pub type DbResult<T> = Result<T, DatabaseError>;

#[derive(Debug, Clone)]
pub struct DatabaseError {
    pub kind: DatabaseErrorKind,
    pub context: Option<String>,
    pub is_retryable: bool,
}

impl DatabaseError {
    pub fn new(kind: DatabaseErrorKind) -> Self {
        let is_retryable = matches!(
            kind,
            DatabaseErrorKind::PoolExhausted | DatabaseErrorKind::ConnectionError { .. }
        );

        Self {
            kind,
            context: None,
            is_retryable,
        }
    }

    pub fn not_found(entity: impl Into<String>, id: impl fmt::Display) -> Self {
        Self::new(DatabaseErrorKind::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        })
    }

    pub fn with_context<S: Into<String>>(mut self, context: S) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn is_retryable(&self) -> bool {
        self.is_retryable
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.kind, DatabaseErrorKind::NotFound { .. })
    }

    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self.kind,
            DatabaseErrorKind::UniqueConstraintViolation { .. }
                | DatabaseErrorKind::ForeignKeyViolation { .. }
        )
    }

    /// Map SQLx error to our custom error type
    #[cfg(feature = "database")]
    pub fn from_sqlx(error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::RowNotFound => Self::not_found("Record", "unknown"),
            sqlx::Error::PoolTimedOut => Self::new(DatabaseErrorKind::PoolExhausted),
            sqlx::Error::PoolClosed => Self::new(DatabaseErrorKind::ConnectionError {
                message: "Connection pool is closed".to_string(),
            }),
            sqlx::Error::Database(db_err) => {
                let constraint = db_err.constraint().unwrap_or("unknown").to_string();
                match db_err.code().as_deref() {
                    // Postgres unique_violation
                    Some("23505") => Self::new(DatabaseErrorKind::UniqueConstraintViolation {
                        column: constraint,
                        value: "provided value".to_string(),
                    }),
                    // Postgres foreign_key_violation
                    Some("23503") => Self::new(DatabaseErrorKind::ForeignKeyViolation {
                        table: db_err.table().unwrap_or("unknown").to_string(),
                        column: constraint,
                    }),
                    _ => Self::new(DatabaseErrorKind::QueryError {
                        message: db_err.message().to_string(),
                    }),
                }
            }
            sqlx::Error::Io(io_err) => Self::new(DatabaseErrorKind::ConnectionError {
                message: io_err.to_string(),
            }),
            sqlx::Error::ColumnDecode { index, source } => Self::new(DatabaseErrorKind::Corrupt {
                message: format!("column {}: {}", index, source),
            }),
            _ => Self::new(DatabaseErrorKind::Unknown {
                message: error.to_string(),
            }),
        }
    }
}

impl fmt::Display for DatabaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match &self.kind {
            DatabaseErrorKind::PoolExhausted => {
                "Database connection pool exhausted. Please try again.".to_string()
            }
            DatabaseErrorKind::NotFound { entity, id } => {
                format!("{} with ID '{}' not found", entity, id)
            }
            DatabaseErrorKind::UniqueConstraintViolation { column, value } => {
                format!("A record with {} '{}' already exists", column, value)
            }
            DatabaseErrorKind::ForeignKeyViolation { table, column } => {
                format!(
                    "Cannot perform operation: referenced {} in {} does not exist",
                    column, table
                )
            }
            DatabaseErrorKind::QueryError { message } => {
                format!("Database query failed: {}", message)
            }
            DatabaseErrorKind::Corrupt { message } => {
                format!("Stored record is invalid: {}", message)
            }
            DatabaseErrorKind::ConnectionError { message } => {
                format!("Database connection error: {}", message)
            }
            DatabaseErrorKind::Unknown { message } => {
                format!("Unknown database error: {}", message)
            }
        };

        if let Some(context) = &self.context {
            write!(f, "{} ({})", message, context)
        } else {
            write!(f, "{}", message)
        }
    }
}

impl std::error::Error for DatabaseError {}

impl From<DatabaseError> for AppError {
    fn from(error: DatabaseError) -> Self {
        AppError::new(AppErrorKind::Persistence {
            retryable: error.is_retryable(),
            message: error.to_string(),
        })
    }
}
