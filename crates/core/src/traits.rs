//! Traits for the engine's external collaborators.

use crate::{SubmissionError, TransportError};
use async_trait::async_trait;
use futures::stream::BoxStream;
use oracle_types::{Address, Attestation, AttestationFilter, Bytes, LoggedAttestation, TxHash, Uid};

/// Live attestations, in the order the chain produced them.
///
/// Ends only on error or when dropped by the consumer.
pub type AttestationStream = BoxStream<'static, Result<LoggedAttestation, TransportError>>;

/// Read access to the attestation registry.
///
/// # Guarantees
///
/// - **Ordered**: `scan_historical` returns attestations sorted by
///   [`LogPosition`](oracle_types::LogPosition); `subscribe` yields them in
///   production order
/// - **Filter semantics**: unset filter fields are wildcards, applied the same
///   way for both queries
/// - **No partial corruption**: a subscription error is surfaced as an `Err`
///   item; items delivered before it remain valid
///
/// # Example
///
/// ```ignore
/// let head = source.head_block().await?;
/// let live = source.subscribe(&filter).await?;
/// let past = source.scan_historical(&filter, head).await?;
/// ```
#[async_trait]
pub trait AttestationSource: Send + Sync {
    /// Current chain head block number.
    async fn head_block(&self) -> Result<u64, TransportError>;

    /// Attestations matching `filter` from `filter.from_block` up to and
    /// including `to_block`.
    ///
    /// `filter.to_block` is ignored; the caller resolves the upper bound.
    async fn scan_historical(
        &self,
        filter: &AttestationFilter,
        to_block: u64,
    ) -> Result<Vec<LoggedAttestation>, TransportError>;

    /// Subscribe to attestations matching `filter` as they are produced.
    ///
    /// Every attestation produced after this call returns is delivered.
    async fn subscribe(&self, filter: &AttestationFilter)
        -> Result<AttestationStream, TransportError>;

    /// Look up a single attestation by uid.
    async fn get_attestation(&self, uid: Uid) -> Result<Option<Attestation>, TransportError>;
}

/// Settlement side of the trusted-oracle arbiter contract.
#[async_trait]
pub trait OracleArbiter: Send + Sync {
    /// Submit an arbitration attestation approving `fulfillment`.
    ///
    /// `evidence` is the fulfillment payload that justified the decision.
    async fn submit_arbitration(
        &self,
        fulfillment: Uid,
        evidence: Bytes,
    ) -> Result<TxHash, SubmissionError>;

    /// Whether someone requested `oracle` to arbitrate `fulfillment`.
    async fn arbitration_requested(
        &self,
        fulfillment: Uid,
        oracle: Address,
    ) -> Result<bool, TransportError>;
}

/// The set of fulfillments this oracle has already arbitrated.
///
/// Written after a successful submission and read by the `skip_arbitrated`
/// gate. Implementations decide how long entries survive; the engine only
/// requires that an inserted uid is visible to every later `contains` call on
/// the same store.
pub trait ArbitratedStore: Send + Sync {
    /// Whether `uid` was arbitrated.
    fn contains(&self, uid: &Uid) -> bool;

    /// Record `uid`. Returns false if it was already present.
    fn insert(&self, uid: Uid) -> bool;

    /// Number of recorded fulfillments.
    fn len(&self) -> usize;

    /// Whether nothing has been recorded.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
