//! Shared test fixtures.
//!
//! Alice escrows funds, Bob fulfills and also acts as the oracle, Charlie is
//! an unrelated oracle.

use crate::{AttestationRequest, InMemoryRegistry};
use oracle_codec::{
    ObligationSchema, StringObligation, StringObligationCodec, TrustedOracleDemand,
    TrustedOracleDemandCodec,
};
use oracle_types::{Address, AttestationFilter, Bytes, LoggedAttestation, Uid};

pub const ALICE: Address = Address::repeat_byte(0xa1);
pub const BOB: Address = Address::repeat_byte(0xb0);
pub const CHARLIE: Address = Address::repeat_byte(0xc4);

/// Contract address attesting escrows.
pub const ESCROW_CONTRACT: Address = Address::repeat_byte(0xe5);
/// Contract address attesting string obligations.
pub const STRING_OBLIGATION_CONTRACT: Address = Address::repeat_byte(0x50);

pub const ESCROW_SCHEMA: Uid = Uid::repeat_byte(0xee);
pub const STRING_SCHEMA: Uid = Uid::repeat_byte(0x55);

/// Alice escrows, naming `oracle` in a trusted-oracle demand.
pub fn escrow(registry: &InMemoryRegistry, oracle: Address) -> LoggedAttestation {
    let demand = TrustedOracleDemandCodec.encode(&TrustedOracleDemand::new(oracle, Bytes::new()));
    registry.attest(
        AttestationRequest::new(ESCROW_SCHEMA, ESCROW_CONTRACT, demand).with_recipient(ALICE),
    )
}

/// Bob fulfills `escrow_uid` with a string obligation.
pub fn fulfillment(registry: &InMemoryRegistry, escrow_uid: Uid, item: &str) -> LoggedAttestation {
    registry.attest(fulfillment_request(escrow_uid, item))
}

/// Bob's string obligation as a request, for batching into one block.
pub fn fulfillment_request(escrow_uid: Uid, item: &str) -> AttestationRequest {
    AttestationRequest::new(
        STRING_SCHEMA,
        STRING_OBLIGATION_CONTRACT,
        StringObligationCodec.encode(&StringObligation::new(item)),
    )
    .with_recipient(BOB)
    .with_ref_uid(escrow_uid)
}

/// A string-schema attestation whose data is not a valid string obligation.
pub fn malformed_fulfillment(registry: &InMemoryRegistry, escrow_uid: Uid) -> LoggedAttestation {
    registry.attest(
        AttestationRequest::new(
            STRING_SCHEMA,
            STRING_OBLIGATION_CONTRACT,
            Bytes::from(vec![0xde, 0xad, 0xbe, 0xef]),
        )
        .with_recipient(BOB)
        .with_ref_uid(escrow_uid),
    )
}

/// Filter for Bob's string obligations.
pub fn fulfillment_filter() -> AttestationFilter {
    AttestationFilter::new()
        .with_attester(STRING_OBLIGATION_CONTRACT)
        .with_recipient(BOB)
}

/// Filter for Alice's escrows.
pub fn escrow_filter() -> AttestationFilter {
    AttestationFilter::new().with_attester(ESCROW_CONTRACT)
}
