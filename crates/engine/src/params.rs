//! Parameter objects describing where to find attestations and how to decode
//! them.

use oracle_codec::ObligationSchema;
use oracle_core::ConfigurationError;
use oracle_types::{Address, ArbitrateOptions, AttestationFilter};

/// Fulfillments for direct mode.
///
/// The filter usually pins one escrow through `ref_uid`. When it does not,
/// each fulfillment is tied to the escrow named by its own `ref_uid`.
#[derive(Debug, Clone)]
pub struct FulfillmentParams<C> {
    pub obligation_codec: C,
    pub filter: AttestationFilter,
}

impl<C: ObligationSchema> FulfillmentParams<C> {
    pub fn new(obligation_codec: C, filter: AttestationFilter) -> Self {
        Self {
            obligation_codec,
            filter,
        }
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigurationError> {
        validate_range(&self.filter)
    }
}

/// Fulfillments for escrow-scanning mode, discovered without pinning an
/// escrow and matched afterwards.
#[derive(Debug, Clone)]
pub struct FulfillmentParamsWithoutRefUid<C> {
    pub obligation_codec: C,
    pub filter: AttestationFilter,
}

impl<C: ObligationSchema> FulfillmentParamsWithoutRefUid<C> {
    pub fn new(obligation_codec: C, filter: AttestationFilter) -> Self {
        Self {
            obligation_codec,
            filter,
        }
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigurationError> {
        if self.filter.ref_uid.is_some() {
            return Err(ConfigurationError::RefUidInScanningMode);
        }
        validate_range(&self.filter)
    }
}

/// Escrows to scan and the codec for their demands.
#[derive(Debug, Clone)]
pub struct EscrowParams<C> {
    pub demand_codec: C,
    pub filter: AttestationFilter,
}

impl<C: ObligationSchema> EscrowParams<C> {
    pub fn new(demand_codec: C, filter: AttestationFilter) -> Self {
        Self {
            demand_codec,
            filter,
        }
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigurationError> {
        validate_range(&self.filter)
    }
}

fn validate_range(filter: &AttestationFilter) -> Result<(), ConfigurationError> {
    match filter.to_block {
        Some(to) if filter.from_block > to => Err(ConfigurationError::InvalidBlockRange {
            from: filter.from_block,
            to,
        }),
        _ => Ok(()),
    }
}

/// Options that gate on the oracle identity need one to compare against.
pub(crate) fn validate_options(
    options: &ArbitrateOptions,
    identity: Address,
) -> Result<(), ConfigurationError> {
    if identity.is_zero() {
        if options.require_oracle {
            return Err(ConfigurationError::MissingIdentity {
                option: "require_oracle",
            });
        }
        if options.require_request {
            return Err(ConfigurationError::MissingIdentity {
                option: "require_request",
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use oracle_codec::StringObligationCodec;
    use oracle_types::Uid;

    #[test]
    fn test_block_range() {
        let params = FulfillmentParams::new(
            StringObligationCodec,
            AttestationFilter::new().with_blocks(10, Some(5)),
        );
        assert_eq!(
            params.validate(),
            Err(ConfigurationError::InvalidBlockRange { from: 10, to: 5 })
        );

        let params = FulfillmentParams::new(
            StringObligationCodec,
            AttestationFilter::new().with_blocks(5, Some(5)),
        );
        assert_eq!(params.validate(), Ok(()));
    }

    #[test]
    fn test_scanning_mode_rejects_ref_uid() {
        let params = FulfillmentParamsWithoutRefUid::new(
            StringObligationCodec,
            AttestationFilter::new().with_ref_uid(Uid::repeat_byte(1)),
        );
        assert_eq!(params.validate(), Err(ConfigurationError::RefUidInScanningMode));
    }

    #[test]
    fn test_identity_required_for_gates() {
        let options = ArbitrateOptions::new().with_require_oracle(true);
        assert_eq!(
            validate_options(&options, Address::ZERO),
            Err(ConfigurationError::MissingIdentity {
                option: "require_oracle"
            })
        );
        assert_eq!(validate_options(&options, Address::repeat_byte(1)), Ok(()));
        assert_eq!(
            validate_options(&ArbitrateOptions::new().with_skip_arbitrated(true), Address::ZERO),
            Ok(())
        );
    }
}
