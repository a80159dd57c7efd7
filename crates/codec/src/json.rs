//! String obligations whose item is serde JSON.

use crate::{DecodeError, ObligationSchema, StringObligation, StringObligationCodec};
use alloy::primitives::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use tracing::warn;

/// Typed view over a [`StringObligation`] carrying JSON.
pub struct JsonObligationCodec<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonObligationCodec<T> {
    pub const fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T: Serialize> JsonObligationCodec<T> {
    /// Encode `value`, failing when it has no JSON form (for example a map
    /// with non-string keys).
    pub fn try_encode(&self, value: &T) -> Result<Bytes, serde_json::Error> {
        let item = serde_json::to_string(value)?;
        Ok(StringObligationCodec.encode(&StringObligation::new(item)))
    }
}

impl<T> Default for JsonObligationCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for JsonObligationCodec<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> ObligationSchema for JsonObligationCodec<T>
where
    T: Serialize + DeserializeOwned,
{
    type Value = T;

    fn name(&self) -> &'static str {
        "JsonStringObligation"
    }

    fn decode(&self, data: &[u8]) -> Result<T, DecodeError> {
        let obligation = StringObligationCodec.decode(data)?;
        serde_json::from_str(&obligation.item).map_err(|e| DecodeError::Json {
            schema: self.name(),
            reason: e.to_string(),
        })
    }

    /// Values without a JSON form encode as `null`, which does not decode
    /// back. Use [`try_encode`](JsonObligationCodec::try_encode) to catch them.
    fn encode(&self, value: &T) -> Bytes {
        self.try_encode(value).unwrap_or_else(|err| {
            warn!(
                schema = self.name(),
                error = %err,
                "Obligation has no JSON form, encoding null"
            );
            StringObligationCodec.encode(&StringObligation::new("null"))
        })
    }
}
