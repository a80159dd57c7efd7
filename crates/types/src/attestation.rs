//! Attestation records as stored by the registry.

use crate::{LogPosition, Uid};
use alloy::primitives::{Address, Bytes};

/// An immutable, schema-typed record in the attestation registry.
///
/// `data` is opaque here; it is interpreted by the codec registered for
/// `schema`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attestation {
    /// Globally unique identifier.
    pub uid: Uid,
    /// Schema the `data` field conforms to.
    pub schema: Uid,
    /// Creation time (unix seconds).
    pub time: u64,
    /// Expiration time (unix seconds, 0 = never).
    pub expiration_time: u64,
    /// Revocation time (unix seconds, 0 = not revoked).
    pub revocation_time: u64,
    /// Attestation this one refers to, or zero.
    pub ref_uid: Uid,
    /// Subject of the attestation.
    pub recipient: Address,
    /// Creator of the attestation.
    pub attester: Address,
    /// Whether the attester may revoke it.
    pub revocable: bool,
    /// Schema-encoded payload.
    pub data: Bytes,
}

impl Attestation {
    /// Whether this attestation has been revoked.
    pub fn is_revoked(&self) -> bool {
        self.revocation_time != 0
    }

    /// The referenced attestation, if any.
    pub fn reference(&self) -> Option<Uid> {
        if self.ref_uid.is_zero() {
            None
        } else {
            Some(self.ref_uid)
        }
    }

    /// Whether this attestation has expired at `now` (unix seconds).
    pub fn is_expired_at(&self, now: u64) -> bool {
        self.expiration_time != 0 && self.expiration_time <= now
    }
}

/// An attestation together with where its creation log sits in the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggedAttestation {
    pub attestation: Attestation,
    pub position: LogPosition,
}

impl LoggedAttestation {
    pub fn new(attestation: Attestation, position: LogPosition) -> Self {
        Self {
            attestation,
            position,
        }
    }

    pub fn uid(&self) -> Uid {
        self.attestation.uid
    }
}
