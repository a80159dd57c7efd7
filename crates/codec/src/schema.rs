//! The codec capability bound to one attestation schema.

use crate::DecodeError;
use alloy::primitives::{Address, Bytes};

/// Encodes and decodes the `data` field of attestations of one schema.
///
/// # Guarantees
///
/// - **Total**: `decode` returns an error for malformed input, never panics
/// - **Round-trip**: `decode(&encode(x)) == Ok(x)` for every valid `x`
pub trait ObligationSchema: Send + Sync {
    /// The typed payload.
    type Value;

    /// Human-readable schema name, used in logs and errors.
    fn name(&self) -> &'static str;

    /// Decode attestation data.
    fn decode(&self, data: &[u8]) -> Result<Self::Value, DecodeError>;

    /// Encode a value into attestation data.
    fn encode(&self, value: &Self::Value) -> Bytes;
}

/// A demand that designates the oracle allowed to arbitrate its escrow.
pub trait DemandOracle {
    /// The designated oracle, if the demand names one.
    fn oracle(&self) -> Option<Address>;
}

impl<S: ObligationSchema + ?Sized> ObligationSchema for std::sync::Arc<S> {
    type Value = S::Value;

    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn decode(&self, data: &[u8]) -> Result<Self::Value, DecodeError> {
        (**self).decode(data)
    }

    fn encode(&self, value: &Self::Value) -> Bytes {
        (**self).encode(value)
    }
}
