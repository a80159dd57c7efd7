//! Arbitration output: per-fulfillment decisions and aggregate results.

use crate::{Attestation, LogPosition, TxHash, Uid};
use std::fmt;

/// Verdict on one fulfillment.
///
/// `transaction_hash` is set only when `decision` is true and the settlement
/// submission succeeded. A failed submission keeps `decision = true` and
/// records the reason in `submission_error`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision<T, D = ()> {
    /// The fulfillment attestation that was evaluated.
    pub fulfillment: Attestation,
    /// Where the fulfillment was logged.
    pub position: LogPosition,
    /// Decoded obligation payload.
    pub obligation: T,
    /// Decoded demand of the matched escrow (escrow-scanning mode only).
    pub demand: Option<D>,
    /// Predicate verdict.
    pub decision: bool,
    /// Settlement transaction, when submitted successfully.
    pub transaction_hash: Option<TxHash>,
    /// Why settlement failed after a positive verdict.
    pub submission_error: Option<String>,
}

impl<T, D> Decision<T, D> {
    pub fn fulfillment_uid(&self) -> Uid {
        self.fulfillment.uid
    }

    /// Whether this decision resulted in a settled arbitration.
    pub fn is_settled(&self) -> bool {
        self.decision && self.transaction_hash.is_some()
    }
}

/// Pipeline stage at which an attestation failed evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureStage {
    /// Obligation bytes did not match the fulfillment schema.
    DecodeObligation,
    /// Escrow demand bytes did not match the demand schema.
    DecodeDemand,
    /// The decision predicate failed or panicked.
    Decision,
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureStage::DecodeObligation => write!(f, "decode-obligation"),
            FailureStage::DecodeDemand => write!(f, "decode-demand"),
            FailureStage::Decision => write!(f, "decision"),
        }
    }
}

/// An attestation that could not be evaluated. Not counted in `total_count`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationFailure {
    pub uid: Uid,
    pub position: LogPosition,
    pub stage: FailureStage,
    pub reason: String,
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Termination {
    /// Ran to the end of its range or timeout.
    #[default]
    Completed,
    /// Stopped by an external cancellation request.
    Cancelled,
    /// Stopped by a fatal error; decisions made so far are kept.
    Failed { reason: String },
}

impl Termination {
    pub fn is_failed(&self) -> bool {
        matches!(self, Termination::Failed { .. })
    }
}

/// Aggregate result of an arbitration run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArbitrationResult<T, D = ()> {
    /// Number of fulfillments the predicate returned a verdict for.
    pub total_count: u64,
    /// Number of positive verdicts that were settled on-chain.
    pub successful_count: u64,
    /// Decisions in log order.
    pub decisions: Vec<Decision<T, D>>,
    /// Attestations that failed decoding or evaluation.
    pub failures: Vec<EvaluationFailure>,
    /// How the run ended.
    pub termination: Termination,
}

impl<T, D> Default for ArbitrationResult<T, D> {
    fn default() -> Self {
        Self {
            total_count: 0,
            successful_count: 0,
            decisions: Vec::new(),
            failures: Vec::new(),
            termination: Termination::Completed,
        }
    }
}

impl<T, D> ArbitrationResult<T, D> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a decision and update the counters.
    pub fn record(&mut self, decision: Decision<T, D>) {
        self.total_count += 1;
        if decision.is_settled() {
            self.successful_count += 1;
        }
        self.decisions.push(decision);
    }

    /// Add an evaluation failure.
    pub fn record_failure(&mut self, failure: EvaluationFailure) {
        self.failures.push(failure);
    }

    /// Decisions with a positive verdict.
    pub fn approved(&self) -> impl Iterator<Item = &Decision<T, D>> {
        self.decisions.iter().filter(|d| d.decision)
    }
}

/// Result of an escrow-scanning run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EscrowArbitrationResult<T, D> {
    /// Decisions and counters, as for direct runs.
    pub arbitration: ArbitrationResult<T, D>,
    /// Every escrow discovered, in log order.
    pub escrow_attestations: Vec<Attestation>,
    /// Decoded demand of each escrow, parallel to `escrow_attestations`.
    pub escrow_demands: Vec<D>,
    /// Fulfillments whose `ref_uid` matched no discovered escrow.
    pub unmatched_fulfillments: Vec<Uid>,
}

impl<T, D> Default for EscrowArbitrationResult<T, D> {
    fn default() -> Self {
        Self {
            arbitration: ArbitrationResult::default(),
            escrow_attestations: Vec::new(),
            escrow_demands: Vec::new(),
            unmatched_fulfillments: Vec::new(),
        }
    }
}

impl<T, D> EscrowArbitrationResult<T, D> {
    pub fn decisions(&self) -> &[Decision<T, D>] {
        &self.arbitration.decisions
    }

    pub fn total_count(&self) -> u64 {
        self.arbitration.total_count
    }

    pub fn successful_count(&self) -> u64 {
        self.arbitration.successful_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{Address, Bytes};

    fn decision(decision: bool, tx: Option<TxHash>) -> Decision<String> {
        Decision {
            fulfillment: Attestation {
                uid: Uid::repeat_byte(1),
                schema: Uid::ZERO,
                time: 0,
                expiration_time: 0,
                revocation_time: 0,
                ref_uid: Uid::ZERO,
                recipient: Address::ZERO,
                attester: Address::ZERO,
                revocable: false,
                data: Bytes::new(),
            },
            position: LogPosition::new(1, 0),
            obligation: "x".to_string(),
            demand: None,
            decision,
            transaction_hash: tx,
            submission_error: None,
        }
    }

    #[test]
    fn test_counts() {
        let mut result = ArbitrationResult::new();
        result.record(decision(true, Some(TxHash::new([1; 32]))));
        result.record(decision(false, None));
        // Approved but settlement failed
        result.record(decision(true, None));

        assert_eq!(result.total_count, 3);
        assert_eq!(result.successful_count, 1);
        assert_eq!(result.approved().count(), 2);
    }

    #[test]
    fn test_failures_not_counted() {
        let mut result: ArbitrationResult<String> = ArbitrationResult::new();
        result.record_failure(EvaluationFailure {
            uid: Uid::repeat_byte(2),
            position: LogPosition::new(3, 1),
            stage: FailureStage::DecodeObligation,
            reason: "truncated".into(),
        });
        assert_eq!(result.total_count, 0);
        assert_eq!(result.failures.len(), 1);
    }
}
