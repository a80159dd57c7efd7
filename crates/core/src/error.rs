//! Error types for arbitration.

use oracle_types::Uid;
use thiserror::Error;

/// The attestation source failed to answer or the live subscription dropped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// A historical query or lookup failed.
    #[error("Attestation query failed: {0}")]
    Query(String),

    /// The live subscription could not be established or dropped mid-stream.
    #[error("Attestation subscription dropped: {0}")]
    Subscription(String),

    /// The live subscription ended without an error.
    #[error("Attestation subscription closed")]
    Closed,
}

/// Settlement submission failed after a positive decision.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmissionError {
    /// The arbitration transaction reverted.
    #[error("Arbitration reverted: {0}")]
    Reverted(String),

    /// The fulfillment already carries an on-chain arbitration.
    #[error("Fulfillment {0} already arbitrated on-chain")]
    AlreadyArbitrated(Uid),

    /// The transaction could not be sent.
    #[error("Arbitration submission failed: {0}")]
    Rpc(String),
}

/// The caller's decision predicate did not produce a verdict.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecisionError {
    /// The predicate returned an error.
    #[error("Decision failed: {0}")]
    Failed(String),

    /// The predicate panicked.
    #[error("Decision panicked: {0}")]
    Panicked(String),
}

/// Invalid parameters detected before touching the attestation source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// `from_block` lies after `to_block`.
    #[error("Invalid block range: from {from} > to {to}")]
    InvalidBlockRange { from: u64, to: u64 },

    /// Escrow-scanning fulfillments must not pin an escrow.
    #[error("Escrow-scanning fulfillment filter must not set ref_uid")]
    RefUidInScanningMode,

    /// Oracle gating needs the oracle identity the engine runs as.
    #[error("Option {option} requires a non-zero oracle identity")]
    MissingIdentity { option: &'static str },

    /// A config file could not be read or parsed.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Fatal errors of an arbitration run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArbitrationError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Two escrow attestations share a uid. Uids are unique in the registry,
    /// so this means the source is corrupt.
    #[error("Duplicate escrow attestation {0}")]
    DuplicateEscrow(Uid),

    /// A decision callback panicked under the abort policy.
    #[error("Decision callback failed for {uid}: {reason}")]
    Callback { uid: Uid, reason: String },

    /// A background listener task ended abnormally.
    #[error("Listener task failed: {0}")]
    Task(String),
}
