//! Attestation query filters.

use crate::{LoggedAttestation, Uid};
use alloy::primitives::Address;

/// Query over registry attestations.
///
/// Unset optional fields are wildcards. `to_block = None` means "chain head
/// at query time" for one-shot scans and "open-ended" for live listeners.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AttestationFilter {
    pub attester: Option<Address>,
    pub recipient: Option<Address>,
    pub schema_uid: Option<Uid>,
    pub uid: Option<Uid>,
    pub ref_uid: Option<Uid>,
    pub from_block: u64,
    pub to_block: Option<u64>,
}

impl AttestationFilter {
    /// Create a filter matching everything from genesis onwards.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to attestations created by `attester`.
    pub fn with_attester(mut self, attester: Address) -> Self {
        self.attester = Some(attester);
        self
    }

    /// Restrict to attestations addressed to `recipient`.
    pub fn with_recipient(mut self, recipient: Address) -> Self {
        self.recipient = Some(recipient);
        self
    }

    /// Restrict to a schema.
    pub fn with_schema(mut self, schema_uid: Uid) -> Self {
        self.schema_uid = Some(schema_uid);
        self
    }

    /// Restrict to one attestation.
    pub fn with_uid(mut self, uid: Uid) -> Self {
        self.uid = Some(uid);
        self
    }

    /// Restrict to attestations referencing `ref_uid`.
    pub fn with_ref_uid(mut self, ref_uid: Uid) -> Self {
        self.ref_uid = Some(ref_uid);
        self
    }

    /// Set the block range. `to_block = None` leaves the upper end open.
    pub fn with_blocks(mut self, from_block: u64, to_block: Option<u64>) -> Self {
        self.from_block = from_block;
        self.to_block = to_block;
        self
    }

    /// Copy of this filter with the `ref_uid` constraint removed.
    pub fn without_ref_uid(&self) -> Self {
        Self {
            ref_uid: None,
            ..self.clone()
        }
    }

    /// Whether the non-block fields match `attestation`.
    pub fn matches_fields(&self, attestation: &crate::Attestation) -> bool {
        self.attester.is_none_or(|a| a == attestation.attester)
            && self.recipient.is_none_or(|r| r == attestation.recipient)
            && self.schema_uid.is_none_or(|s| s == attestation.schema)
            && self.uid.is_none_or(|u| u == attestation.uid)
            && self.ref_uid.is_none_or(|r| r == attestation.ref_uid)
    }

    /// Whether `block` lies inside the filter's block range.
    pub fn contains_block(&self, block: u64) -> bool {
        block >= self.from_block && self.to_block.is_none_or(|to| block <= to)
    }

    /// Whether a logged attestation matches every constraint of this filter.
    pub fn matches(&self, logged: &LoggedAttestation) -> bool {
        self.contains_block(logged.position.block_number) && self.matches_fields(&logged.attestation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Attestation, LogPosition};
    use alloy::primitives::Bytes;

    fn logged(block: u64, attester: Address, ref_uid: Uid) -> LoggedAttestation {
        LoggedAttestation::new(
            Attestation {
                uid: Uid::repeat_byte(block as u8),
                schema: Uid::repeat_byte(0xee),
                time: 0,
                expiration_time: 0,
                revocation_time: 0,
                ref_uid,
                recipient: Address::repeat_byte(0x0b),
                attester,
                revocable: false,
                data: Bytes::new(),
            },
            LogPosition::new(block, 0),
        )
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        let filter = AttestationFilter::new();
        assert!(filter.matches(&logged(0, Address::ZERO, Uid::ZERO)));
        assert!(filter.matches(&logged(99, Address::repeat_byte(1), Uid::repeat_byte(2))));
    }

    #[test]
    fn test_field_constraints() {
        let attester = Address::repeat_byte(0xaa);
        let escrow = Uid::repeat_byte(0x42);
        let filter = AttestationFilter::new()
            .with_attester(attester)
            .with_ref_uid(escrow);

        assert!(filter.matches(&logged(1, attester, escrow)));
        assert!(!filter.matches(&logged(1, Address::ZERO, escrow)));
        assert!(!filter.matches(&logged(1, attester, Uid::ZERO)));

        let relaxed = filter.without_ref_uid();
        assert!(relaxed.matches(&logged(1, attester, Uid::ZERO)));
        assert_eq!(relaxed.attester, Some(attester));
    }

    #[test]
    fn test_block_range() {
        let filter = AttestationFilter::new().with_blocks(10, Some(20));
        assert!(!filter.contains_block(9));
        assert!(filter.contains_block(10));
        assert!(filter.contains_block(20));
        assert!(!filter.contains_block(21));

        let open = AttestationFilter::new().with_blocks(10, None);
        assert!(open.contains_block(u64::MAX));
    }
}
