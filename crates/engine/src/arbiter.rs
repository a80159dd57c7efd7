//! Settlement submission.

use oracle_core::{ArbitratedStore, OracleArbiter, SubmissionError};
use oracle_types::{Bytes, TxHash, Uid};
use tracing::{info, warn};

/// Submits arbitrations for approved fulfillments and keeps the arbitrated
/// store in step with the chain.
pub struct Arbiter<'a> {
    backend: &'a dyn OracleArbiter,
    store: &'a dyn ArbitratedStore,
}

impl<'a> Arbiter<'a> {
    pub fn new(backend: &'a dyn OracleArbiter, store: &'a dyn ArbitratedStore) -> Self {
        Self { backend, store }
    }

    /// Submit an arbitration for `fulfillment`.
    ///
    /// On success the uid is recorded as arbitrated. A fulfillment the chain
    /// reports as already arbitrated is recorded too, but still returns the
    /// error since this run produced no transaction.
    pub async fn submit(&self, fulfillment: Uid, evidence: Bytes) -> Result<TxHash, SubmissionError> {
        match self.backend.submit_arbitration(fulfillment, evidence).await {
            Ok(tx) => {
                self.store.insert(fulfillment);
                info!(uid = %fulfillment, tx = %tx, "Arbitration submitted");
                Ok(tx)
            }
            Err(err) => {
                if matches!(err, SubmissionError::AlreadyArbitrated(_)) {
                    self.store.insert(fulfillment);
                }
                warn!(uid = %fulfillment, error = %err, "Arbitration submission failed");
                Err(err)
            }
        }
    }
}
