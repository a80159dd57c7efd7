//! Generic ABI codec for any `SolValue`.

use crate::{DecodeError, ObligationSchema};
use alloy::primitives::Bytes;
use alloy::sol_types::{SolType, SolValue};
use std::fmt;
use std::marker::PhantomData;

/// ABI codec for a `sol!` type or any other `SolValue`.
///
/// Values are encoded as a single ABI value (`abi_encode`), which is how the
/// obligation contracts store their statement data.
pub struct AbiCodec<T> {
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> AbiCodec<T> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }
}

impl<T> Clone for AbiCodec<T> {
    fn clone(&self) -> Self {
        Self::new(self.name)
    }
}

impl<T> fmt::Debug for AbiCodec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AbiCodec({})", self.name)
    }
}

impl<T> ObligationSchema for AbiCodec<T>
where
    T: SolValue + From<<T::SolType as SolType>::RustType>,
{
    type Value = T;

    fn name(&self) -> &'static str {
        self.name
    }

    fn decode(&self, data: &[u8]) -> Result<T, DecodeError> {
        if data.is_empty() {
            return Err(DecodeError::Empty { schema: self.name });
        }
        T::abi_decode(data).map_err(|e| DecodeError::abi(self.name, e))
    }

    fn encode(&self, value: &T) -> Bytes {
        Bytes::from(value.abi_encode())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{Address, U256};

    #[test]
    fn test_tuple_roundtrip() {
        let codec: AbiCodec<(Address, U256)> = AbiCodec::new("pair");
        let value = (Address::repeat_byte(5), U256::from(42u64));
        assert_eq!(codec.decode(&codec.encode(&value)).unwrap(), value);
    }

    #[test]
    fn test_empty_rejected() {
        let codec: AbiCodec<(Address, U256)> = AbiCodec::new("pair");
        assert_eq!(
            codec.decode(&[]),
            Err(DecodeError::Empty { schema: "pair" })
        );
    }
}
