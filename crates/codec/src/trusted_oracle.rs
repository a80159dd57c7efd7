//! Demands for the trusted-oracle arbiter.

use crate::{DecodeError, DemandOracle, ObligationSchema};
use alloy::primitives::{Address, Bytes};
use alloy::sol;
use alloy::sol_types::SolValue;

sol! {
    /// Demand naming the oracle trusted to arbitrate an escrow.
    #[derive(Debug, PartialEq, Eq)]
    struct TrustedOracleDemand {
        address oracle;
        bytes data;
    }
}

impl TrustedOracleDemand {
    pub fn new(oracle: Address, data: Bytes) -> Self {
        Self { oracle, data }
    }
}

impl DemandOracle for TrustedOracleDemand {
    fn oracle(&self) -> Option<Address> {
        Some(self.oracle)
    }
}

/// Encoded demand designating `oracle` with no extra data.
pub fn create_trusted_oracle_demand(oracle: Address) -> Bytes {
    TrustedOracleDemandCodec.encode(&TrustedOracleDemand::new(oracle, Bytes::new()))
}

/// Codec for [`TrustedOracleDemand`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TrustedOracleDemandCodec;

impl TrustedOracleDemandCodec {
    pub const NAME: &'static str = "TrustedOracleDemand";
}

impl ObligationSchema for TrustedOracleDemandCodec {
    type Value = TrustedOracleDemand;

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn decode(&self, data: &[u8]) -> Result<TrustedOracleDemand, DecodeError> {
        if data.is_empty() {
            return Err(DecodeError::Empty { schema: Self::NAME });
        }
        TrustedOracleDemand::abi_decode(data).map_err(|e| DecodeError::abi(Self::NAME, e))
    }

    fn encode(&self, value: &TrustedOracleDemand) -> Bytes {
        Bytes::from(value.abi_encode())
    }
}
