//! Error taxonomy for textdb corpora.
//!
//! Errors fall into two groups:
//!
//! - **Fatal**: [`TextdbError::SchemaFormat`], [`TextdbError::UnknownField`] and
//!   [`TextdbError::Io`] abort the current run.
//! - **Row-recoverable**: [`TextdbError::Decode`], [`TextdbError::RowShape`] and
//!   [`TextdbError::Transform`] are caught by the row stream processor, logged,
//!   counted and the offending row is dropped.
//!
//! Orchestration code (opening files, writing corpora) returns [`anyhow::Result`]
//! with path context attached; the domain error stays reachable through
//! `err.downcast_ref::<TextdbError>()`.

use thiserror::Error;

/// Result alias for operations that only fail with a [`TextdbError`].
pub type Result<T, E = TextdbError> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum TextdbError {
    /// Malformed or missing schema file, or an invalid field list.
    #[error("schema format error: {0}")]
    SchemaFormat(String),

    /// Code referenced a field that the schema does not declare.
    #[error("unknown field '{0}'")]
    UnknownField(String),

    /// Malformed escape sequence or compound-field encoding.
    #[error("decode error: {0}")]
    Decode(String),

    /// A data line does not carry as many values as the schema has fields.
    #[error("row has {found} fields, schema expects {expected}")]
    RowShape { expected: usize, found: usize },

    /// A per-row transform failed.
    #[error("transform failed: {0}")]
    Transform(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TextdbError {
    /// Whether the row stream processor may drop the row and keep going.
    pub fn is_row_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Decode(_) | Self::RowShape { .. } | Self::Transform(_)
        )
    }

    pub(crate) fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    pub(crate) fn schema(msg: impl Into<String>) -> Self {
        Self::SchemaFormat(msg.into())
    }
}
