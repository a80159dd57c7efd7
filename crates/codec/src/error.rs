//! Decode errors.

use thiserror::Error;

/// Errors that can occur while decoding an attestation payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Payload is empty but the schema requires data.
    #[error("Empty payload for schema {schema}")]
    Empty { schema: &'static str },

    /// ABI layout does not match the schema (truncated, bad offsets, type mismatch).
    #[error("ABI decode error for schema {schema}: {reason}")]
    Abi {
        schema: &'static str,
        reason: String,
    },

    /// String payload is not valid JSON for the expected type.
    #[error("JSON decode error for schema {schema}: {reason}")]
    Json {
        schema: &'static str,
        reason: String,
    },
}

impl DecodeError {
    pub(crate) fn abi(schema: &'static str, err: impl std::fmt::Display) -> Self {
        DecodeError::Abi {
            schema,
            reason: err.to_string(),
        }
    }
}
