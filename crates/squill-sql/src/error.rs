use thiserror::Error;

/// Errors raised while rendering SQL.
///
/// All of these are programmer errors in the query or migration AST, not
/// user-data errors: they are raised synchronously at rendering time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("unsupported feature: {0}")]
    Unsupported(String),

    #[error(
        "cannot select all fields from {source_name} without a schema; \
         specify exactly which fields to select"
    )]
    MissingSchema { source_name: String },

    #[error("bad identifier {0:?} (\" is not permitted)")]
    BadIdentifier(String),

    #[error("bad default value: {0}")]
    BadDefault(String),
}

impl RenderError {
    pub(crate) fn unsupported(message: impl Into<String>) -> Self {
        RenderError::Unsupported(message.into())
    }
}
