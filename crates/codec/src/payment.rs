//! Structured ERC20 payment claims.

use crate::{DecodeError, ObligationSchema};
use alloy::primitives::Bytes;
use alloy::sol;
use alloy::sol_types::SolValue;

sol! {
    /// Statement data of the ERC20 payment obligation contract.
    #[derive(Debug, PartialEq, Eq)]
    struct Erc20PaymentObligation {
        address token;
        uint256 amount;
        address payee;
    }
}

/// Codec for [`Erc20PaymentObligation`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Erc20PaymentObligationCodec;

impl Erc20PaymentObligationCodec {
    pub const NAME: &'static str = "Erc20PaymentObligation";
}

impl ObligationSchema for Erc20PaymentObligationCodec {
    type Value = Erc20PaymentObligation;

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn decode(&self, data: &[u8]) -> Result<Erc20PaymentObligation, DecodeError> {
        if data.is_empty() {
            return Err(DecodeError::Empty { schema: Self::NAME });
        }
        Erc20PaymentObligation::abi_decode(data).map_err(|e| DecodeError::abi(Self::NAME, e))
    }

    fn encode(&self, value: &Erc20PaymentObligation) -> Bytes {
        Bytes::from(value.abi_encode())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{Address, U256};

    #[test]
    fn test_roundtrip() {
        let codec = Erc20PaymentObligationCodec;
        let value = Erc20PaymentObligation {
            token: Address::repeat_byte(0x20),
            amount: U256::from(1_000_000u64),
            payee: Address::repeat_byte(0x0b),
        };
        assert_eq!(codec.decode(&codec.encode(&value)).unwrap(), value);
    }

    #[test]
    fn test_short_input_is_error() {
        assert!(Erc20PaymentObligationCodec.decode(&[0u8; 64]).is_err());
    }
}
