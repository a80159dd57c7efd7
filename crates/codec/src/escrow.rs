//! ERC20 escrow obligations and the demand nested inside them.

use crate::{DecodeError, ObligationSchema};
use alloy::primitives::{Address, Bytes, U256};
use alloy::sol;
use alloy::sol_types::SolValue;

sol! {
    /// Statement data of the ERC20 escrow obligation contract.
    ///
    /// `demand` is opaque here; its layout is fixed by `arbiter`.
    #[derive(Debug, PartialEq, Eq)]
    struct Erc20EscrowObligation {
        address arbiter;
        bytes demand;
        address token;
        uint256 amount;
    }
}

/// Codec for [`Erc20EscrowObligation`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Erc20EscrowObligationCodec;

impl Erc20EscrowObligationCodec {
    pub const NAME: &'static str = "Erc20EscrowObligation";
}

impl ObligationSchema for Erc20EscrowObligationCodec {
    type Value = Erc20EscrowObligation;

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn decode(&self, data: &[u8]) -> Result<Erc20EscrowObligation, DecodeError> {
        if data.is_empty() {
            return Err(DecodeError::Empty { schema: Self::NAME });
        }
        Erc20EscrowObligation::abi_decode(data).map_err(|e| DecodeError::abi(Self::NAME, e))
    }

    fn encode(&self, value: &Erc20EscrowObligation) -> Bytes {
        Bytes::from(value.abi_encode())
    }
}

/// Reads the arbiter demand out of an ERC20 escrow attestation.
///
/// Decodes the escrow envelope, then the nested `demand` bytes with `inner`.
/// Encoding wraps a demand in an envelope carrying this codec's arbiter,
/// token and amount.
#[derive(Debug, Clone)]
pub struct EscrowDemandCodec<C> {
    inner: C,
    arbiter: Address,
    token: Address,
    amount: U256,
}

impl<C> EscrowDemandCodec<C> {
    pub fn new(inner: C, arbiter: Address) -> Self {
        Self {
            inner,
            arbiter,
            token: Address::ZERO,
            amount: U256::ZERO,
        }
    }

    /// Set the token and amount written by `encode`.
    pub fn with_price(mut self, token: Address, amount: U256) -> Self {
        self.token = token;
        self.amount = amount;
        self
    }
}

impl<C: ObligationSchema> ObligationSchema for EscrowDemandCodec<C> {
    type Value = C::Value;

    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn decode(&self, data: &[u8]) -> Result<C::Value, DecodeError> {
        let escrow = Erc20EscrowObligationCodec.decode(data)?;
        self.inner.decode(&escrow.demand)
    }

    fn encode(&self, value: &C::Value) -> Bytes {
        Erc20EscrowObligationCodec.encode(&Erc20EscrowObligation {
            arbiter: self.arbiter,
            demand: self.inner.encode(value),
            token: self.token,
            amount: self.amount,
        })
    }
}
