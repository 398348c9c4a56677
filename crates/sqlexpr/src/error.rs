//! Error types for sqlexpr

use thiserror::Error;

/// Result type alias for sqlexpr operations
pub type ExprResult<T> = Result<T, ExprError>;

/// Error types for expression resolution and query compilation
#[derive(Debug, Error)]
pub enum ExprError {
    /// No fragment registered for the requested driver
    #[error("Grammar not defined for database driver {driver}\nregistered: {registered}")]
    GrammarNotDefinedForDriver { driver: String, registered: String },

    /// Every fragment registered for the driver requires a newer version
    #[error(
        "Grammar not defined for database version {version} of driver {driver}\nregistered: {registered}"
    )]
    GrammarNotDefinedForVersion {
        driver: String,
        version: String,
        registered: String,
    },

    /// A grammar was resolved without any driver context
    #[error("Grammar resolved without a database driver (driver null)\nregistered: {registered}")]
    DriverNotConfigured { registered: String },

    /// Rendered SQL and collected bindings disagree
    #[error("Placeholder mismatch: {placeholders} placeholder(s) but {bindings} binding(s) in `{sql}`")]
    PlaceholderMismatch {
        placeholders: usize,
        bindings: usize,
        sql: String,
    },

    /// The dialect cannot express the requested statement
    #[error("{feature} is not supported by the {driver} dialect")]
    Unsupported { driver: String, feature: String },

    /// Invalid builder input (e.g. ragged insert rows)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Connection setup error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Error reported by the Postgres driver
    #[error("Query error: {0}")]
    Query(#[from] tokio_postgres::Error),
}

impl ExprError {
    /// Create an unsupported-feature error for a driver
    pub fn unsupported(driver: impl Into<String>, feature: impl Into<String>) -> Self {
        Self::Unsupported {
            driver: driver.into(),
            feature: feature.into(),
        }
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Check if this is any of the grammar resolution errors
    pub fn is_grammar_error(&self) -> bool {
        matches!(
            self,
            Self::GrammarNotDefinedForDriver { .. }
                | Self::GrammarNotDefinedForVersion { .. }
                | Self::DriverNotConfigured { .. }
        )
    }

    /// Check if this is a placeholder/binding mismatch
    pub fn is_placeholder_mismatch(&self) -> bool {
        matches!(self, Self::PlaceholderMismatch { .. })
    }

    /// Check if this is an unsupported-feature error
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported { .. })
    }
}
