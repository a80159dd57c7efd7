//! Recording settlement backend.

use alloy::primitives::keccak256;
use async_trait::async_trait;
use oracle_core::{OracleArbiter, SubmissionError, TransportError};
use oracle_types::{Address, Bytes, TxHash, Uid};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Default)]
struct ArbiterState {
    submissions: Vec<Uid>,
    on_chain: HashSet<Uid>,
    failing: HashSet<Uid>,
    fail_all: bool,
    requests: HashSet<(Uid, Address)>,
    nonce: u64,
}

/// [`OracleArbiter`] that records every submission in memory.
///
/// Mirrors the contract's behaviour of rejecting a second arbitration for the
/// same fulfillment.
#[derive(Debug, Default)]
pub struct RecordingArbiter {
    state: Mutex<ArbiterState>,
    submit_delay: Option<Duration>,
}

impl RecordingArbiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep for `delay` inside every submission.
    pub fn with_submit_delay(mut self, delay: Duration) -> Self {
        self.submit_delay = Some(delay);
        self
    }

    /// Make submissions for `uid` revert.
    pub fn fail_for(&self, uid: Uid) {
        self.state.lock().failing.insert(uid);
    }

    /// Make every submission revert.
    pub fn set_fail_all(&self, fail: bool) {
        self.state.lock().fail_all = fail;
    }

    /// Record an arbitration request naming `oracle`.
    pub fn request_arbitration(&self, fulfillment: Uid, oracle: Address) {
        self.state.lock().requests.insert((fulfillment, oracle));
    }

    /// Fulfillments submitted successfully, in submission order.
    pub fn submissions(&self) -> Vec<Uid> {
        self.state.lock().submissions.clone()
    }

    pub fn submission_count(&self) -> usize {
        self.state.lock().submissions.len()
    }
}

#[async_trait]
impl OracleArbiter for RecordingArbiter {
    async fn submit_arbitration(
        &self,
        fulfillment: Uid,
        evidence: Bytes,
    ) -> Result<TxHash, SubmissionError> {
        if let Some(delay) = self.submit_delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock();
        if state.fail_all || state.failing.contains(&fulfillment) {
            return Err(SubmissionError::Reverted("execution reverted".into()));
        }
        if !state.on_chain.insert(fulfillment) {
            return Err(SubmissionError::AlreadyArbitrated(fulfillment));
        }

        state.nonce += 1;
        let mut preimage = fulfillment.to_vec();
        preimage.extend_from_slice(&state.nonce.to_be_bytes());
        preimage.extend_from_slice(&evidence);
        let tx: TxHash = keccak256(&preimage);

        state.submissions.push(fulfillment);
        debug!(uid = %fulfillment, tx = %tx, "Recorded arbitration");
        Ok(tx)
    }

    async fn arbitration_requested(
        &self,
        fulfillment: Uid,
        oracle: Address,
    ) -> Result<bool, TransportError> {
        Ok(self.state.lock().requests.contains(&(fulfillment, oracle)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_submit_and_reject_duplicate() {
        let arbiter = RecordingArbiter::new();
        let uid = Uid::repeat_byte(1);

        let tx = arbiter.submit_arbitration(uid, Bytes::new()).await.unwrap();
        assert_eq!(tx.to_string().len(), 66);
        assert_eq!(
            arbiter.submit_arbitration(uid, Bytes::new()).await,
            Err(SubmissionError::AlreadyArbitrated(uid))
        );
        assert_eq!(arbiter.submissions(), vec![uid]);
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let arbiter = RecordingArbiter::new();
        let uid = Uid::repeat_byte(2);
        arbiter.fail_for(uid);
        assert!(matches!(
            arbiter.submit_arbitration(uid, Bytes::new()).await,
            Err(SubmissionError::Reverted(_))
        ));
        assert_eq!(arbiter.submission_count(), 0);
    }
}
