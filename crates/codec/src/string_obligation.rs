//! Free-form string obligations.

use crate::{DecodeError, ObligationSchema};
use alloy::primitives::Bytes;
use alloy::sol;
use alloy::sol_types::SolValue;

sol! {
    /// Statement data of the string obligation contract.
    #[derive(Debug, PartialEq, Eq)]
    struct StringObligation {
        string item;
    }
}

impl StringObligation {
    pub fn new(item: impl Into<String>) -> Self {
        Self { item: item.into() }
    }
}

/// Codec for [`StringObligation`] statement data.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringObligationCodec;

impl StringObligationCodec {
    pub const NAME: &'static str = "StringObligation";

    /// Encode a JSON value as a string obligation.
    pub fn encode_json(&self, value: &serde_json::Value) -> Bytes {
        self.encode(&StringObligation::new(value.to_string()))
    }

    /// Decode a string obligation whose item is JSON.
    pub fn decode_json(&self, data: &[u8]) -> Result<serde_json::Value, DecodeError> {
        let obligation = self.decode(data)?;
        serde_json::from_str(&obligation.item).map_err(|e| DecodeError::Json {
            schema: Self::NAME,
            reason: e.to_string(),
        })
    }
}

impl ObligationSchema for StringObligationCodec {
    type Value = StringObligation;

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn decode(&self, data: &[u8]) -> Result<StringObligation, DecodeError> {
        if data.is_empty() {
            return Err(DecodeError::Empty { schema: Self::NAME });
        }
        StringObligation::abi_decode(data).map_err(|e| DecodeError::abi(Self::NAME, e))
    }

    fn encode(&self, value: &StringObligation) -> Bytes {
        Bytes::from(value.abi_encode())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let codec = StringObligationCodec;
        for item in ["", "good", "bad", "ünïcødé ✓", &"x".repeat(1000)] {
            let value = StringObligation::new(item);
            assert_eq!(codec.decode(&codec.encode(&value)).unwrap(), value);
        }
    }

    #[test]
    fn test_truncated_is_error() {
        let codec = StringObligationCodec;
        let encoded = codec.encode(&StringObligation::new("a longer obligation string"));
        for len in [1, 31, 32, 63, encoded.len() - 1] {
            let result = codec.decode(&encoded[..len]);
            assert!(
                matches!(result, Err(DecodeError::Abi { .. })),
                "len {} should fail",
                len
            );
        }
    }

    #[test]
    fn test_garbage_is_error() {
        let codec = StringObligationCodec;
        assert!(codec.decode(&[0xff; 96]).is_err());
        assert!(codec.decode(&[]).is_err());
    }

    #[test]
    fn test_json_roundtrip() {
        let codec = StringObligationCodec;
        let value = serde_json::json!({ "claim": "delivered", "items": [1, 2, 3] });
        let encoded = codec.encode_json(&value);
        assert_eq!(codec.decode_json(&encoded).unwrap(), value);
    }

    #[test]
    fn test_json_rejects_plain_string() {
        let codec = StringObligationCodec;
        let encoded = codec.encode(&StringObligation::new("not json"));
        assert!(matches!(
            codec.decode_json(&encoded),
            Err(DecodeError::Json { .. })
        ));
    }
}
