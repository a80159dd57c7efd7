//! Per-attestation evaluation: gate, decode, decide, settle.

use crate::arbiter::Arbiter;
use crate::config::CallbackErrorPolicy;
use crate::decision::{panic_message, DecisionEngine, SkipReason};
use crate::matcher::{DirectEscrows, EscrowIndex};
use oracle_codec::{DemandOracle, ObligationSchema};
use oracle_core::{
    ArbitrationError, AttestationSource, DecisionCallback, DecisionError, EscrowDecider,
    ObligationDecider,
};
use oracle_types::{
    ArbitrationResult, AttestationFilter, Decision, EscrowArbitrationResult, EvaluationFailure,
    FailureStage, LoggedAttestation, Uid,
};
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{debug, warn};

/// What happened to one attestation.
#[derive(Debug)]
pub(crate) enum Outcome<T, D> {
    Decided(Decision<T, D>),
    Skipped(Uid, SkipReason),
    Failed(EvaluationFailure),
}

fn failure(logged: &LoggedAttestation, stage: FailureStage, reason: String) -> EvaluationFailure {
    EvaluationFailure {
        uid: logged.uid(),
        position: logged.position,
        stage,
        reason,
    }
}

/// Gates, predicate and settlement for one run.
pub(crate) struct Pipeline<'a> {
    source: &'a dyn AttestationSource,
    engine: DecisionEngine<'a>,
    arbiter: Arbiter<'a>,
    direct: DirectEscrows,
}

impl<'a> Pipeline<'a> {
    pub(crate) fn new(
        source: &'a dyn AttestationSource,
        engine: DecisionEngine<'a>,
        arbiter: Arbiter<'a>,
    ) -> Self {
        Self {
            source,
            engine,
            arbiter,
            direct: DirectEscrows::new(),
        }
    }

    /// Evaluate a direct-mode fulfillment.
    pub(crate) async fn evaluate_direct<C, P>(
        &mut self,
        codec: &C,
        decider: &P,
        logged: LoggedAttestation,
    ) -> Result<Outcome<C::Value, ()>, ArbitrationError>
    where
        C: ObligationSchema,
        P: ObligationDecider<C::Value> + ?Sized,
    {
        let uid = logged.uid();
        if let Some(reason) = self.engine.check_arbitrated(&uid) {
            return Ok(Outcome::Skipped(uid, reason));
        }
        if self.engine.options().require_oracle {
            let designated = self
                .direct
                .designated_oracle(self.source, &logged.attestation)
                .await?;
            if let Some(reason) = self.engine.check_oracle(designated) {
                return Ok(Outcome::Skipped(uid, reason));
            }
        }
        if let Some(reason) = self.engine.check_request(uid).await? {
            return Ok(Outcome::Skipped(uid, reason));
        }

        let obligation = match codec.decode(&logged.attestation.data) {
            Ok(obligation) => obligation,
            Err(err) => {
                return Ok(Outcome::Failed(failure(
                    &logged,
                    FailureStage::DecodeObligation,
                    err.to_string(),
                )))
            }
        };
        let verdict = self.engine.decide(decider, &obligation);
        Ok(self.conclude(logged, obligation, None, verdict).await)
    }

    /// Evaluate a fulfillment paired with its escrow's demand.
    pub(crate) async fn evaluate_escrowed<C, D, P>(
        &mut self,
        codec: &C,
        decider: &P,
        logged: LoggedAttestation,
        demand: D,
    ) -> Result<Outcome<C::Value, D>, ArbitrationError>
    where
        C: ObligationSchema,
        D: DemandOracle,
        P: EscrowDecider<C::Value, D> + ?Sized,
    {
        let uid = logged.uid();
        if let Some(reason) = self.engine.check_arbitrated(&uid) {
            return Ok(Outcome::Skipped(uid, reason));
        }
        if let Some(reason) = self.engine.check_oracle(demand.oracle()) {
            return Ok(Outcome::Skipped(uid, reason));
        }
        if let Some(reason) = self.engine.check_request(uid).await? {
            return Ok(Outcome::Skipped(uid, reason));
        }

        let obligation = match codec.decode(&logged.attestation.data) {
            Ok(obligation) => obligation,
            Err(err) => {
                return Ok(Outcome::Failed(failure(
                    &logged,
                    FailureStage::DecodeObligation,
                    err.to_string(),
                )))
            }
        };
        let verdict = self.engine.decide_with_demand(decider, &obligation, &demand);
        Ok(self.conclude(logged, obligation, Some(demand), verdict).await)
    }

    async fn conclude<T, D>(
        &self,
        logged: LoggedAttestation,
        obligation: T,
        demand: Option<D>,
        verdict: Result<bool, DecisionError>,
    ) -> Outcome<T, D> {
        let decision = match verdict {
            Ok(decision) => decision,
            Err(err) => {
                return Outcome::Failed(failure(&logged, FailureStage::Decision, err.to_string()))
            }
        };

        let uid = logged.uid();
        let (transaction_hash, submission_error) = if decision {
            match self
                .arbiter
                .submit(uid, logged.attestation.data.clone())
                .await
            {
                Ok(tx) => (Some(tx), None),
                Err(err) => (None, Some(err.to_string())),
            }
        } else {
            (None, None)
        };
        debug!(uid = %uid, decision, position = %logged.position, "Decided fulfillment");

        Outcome::Decided(Decision {
            fulfillment: logged.attestation,
            position: logged.position,
            obligation,
            demand,
            decision,
            transaction_hash,
            submission_error,
        })
    }
}

/// Accumulates outcomes into a result and feeds the decision callback.
pub(crate) struct Collector<'a, T, D> {
    result: ArbitrationResult<T, D>,
    callback: Option<&'a dyn DecisionCallback<T, D>>,
    policy: CallbackErrorPolicy,
}

impl<'a, T, D> Collector<'a, T, D> {
    pub(crate) fn new(
        callback: Option<&'a dyn DecisionCallback<T, D>>,
        policy: CallbackErrorPolicy,
    ) -> Self {
        Self {
            result: ArbitrationResult::new(),
            callback,
            policy,
        }
    }

    /// Record an outcome. Fails only when the callback panics under
    /// [`CallbackErrorPolicy::Abort`]; the decision is kept either way.
    pub(crate) fn apply(&mut self, outcome: Outcome<T, D>) -> Result<(), ArbitrationError> {
        match outcome {
            Outcome::Skipped(uid, reason) => {
                debug!(uid = %uid, reason = %reason, "Skipped fulfillment");
            }
            Outcome::Failed(failure) => {
                warn!(
                    uid = %failure.uid,
                    stage = %failure.stage,
                    reason = %failure.reason,
                    "Attestation evaluation failed"
                );
                self.result.record_failure(failure);
            }
            Outcome::Decided(decision) => {
                let uid = decision.fulfillment_uid();
                let delivered = self
                    .callback
                    .map(|callback| catch_unwind(AssertUnwindSafe(|| callback.on_decision(&decision))));
                self.result.record(decision);

                if let Some(Err(payload)) = delivered {
                    let reason = panic_message(payload);
                    match self.policy {
                        CallbackErrorPolicy::Continue => {
                            warn!(uid = %uid, reason = %reason, "Decision callback panicked");
                        }
                        CallbackErrorPolicy::Abort => {
                            return Err(ArbitrationError::Callback { uid, reason });
                        }
                    }
                }
            }
        }
        Ok(())
    }

    pub(crate) fn into_result(self) -> ArbitrationResult<T, D> {
        self.result
    }
}

/// Escrow-scanning state shared by batch and streaming runs.
///
/// A batch run has seen every escrow before its first fulfillment, so a
/// fulfillment without a known escrow is unmatched at once. A streaming run
/// parks it when its escrow exists, passes the escrow filter and can still
/// be delivered.
pub(crate) struct EscrowRun<'a, E: ObligationSchema, C: ObligationSchema, P: ?Sized> {
    pipeline: Pipeline<'a>,
    collector: Collector<'a, C::Value, E::Value>,
    index: EscrowIndex<E::Value>,
    unmatched: Vec<Uid>,
    demand_codec: &'a E,
    obligation_codec: &'a C,
    decider: &'a P,
    /// Escrow filter of a streaming run whose escrow feed is still open.
    pending_escrows: Option<&'a AttestationFilter>,
}

impl<'a, E, C, P> EscrowRun<'a, E, C, P>
where
    E: ObligationSchema,
    E::Value: DemandOracle + Clone,
    C: ObligationSchema,
    P: EscrowDecider<C::Value, E::Value> + ?Sized,
{
    pub(crate) fn new(
        pipeline: Pipeline<'a>,
        collector: Collector<'a, C::Value, E::Value>,
        demand_codec: &'a E,
        obligation_codec: &'a C,
        decider: &'a P,
    ) -> Self {
        Self {
            pipeline,
            collector,
            index: EscrowIndex::new(),
            unmatched: Vec::new(),
            demand_codec,
            obligation_codec,
            decider,
            pending_escrows: None,
        }
    }

    /// Park early fulfillments whose escrow `escrow_filter` may still deliver.
    pub(crate) fn streaming(mut self, escrow_filter: &'a AttestationFilter) -> Self {
        self.pending_escrows = Some(escrow_filter);
        self
    }

    /// Index an escrow and evaluate fulfillments that were waiting for it.
    pub(crate) async fn on_escrow(&mut self, logged: LoggedAttestation) -> Result<(), ArbitrationError> {
        let uid = logged.uid();
        match self.demand_codec.decode(&logged.attestation.data) {
            Ok(demand) => {
                debug!(escrow = %uid, "Indexed escrow");
                let waiting = self.index.insert(logged.attestation, demand.clone())?;
                for fulfillment in waiting {
                    self.evaluate(fulfillment, demand.clone()).await?;
                }
                Ok(())
            }
            Err(err) => {
                self.index.insert_undecodable(uid)?;
                self.collector.apply(Outcome::Failed(failure(
                    &logged,
                    FailureStage::DecodeDemand,
                    err.to_string(),
                )))
            }
        }
    }

    /// Evaluate a fulfillment against its escrow, or park it until the escrow
    /// is seen.
    pub(crate) async fn on_fulfillment(
        &mut self,
        logged: LoggedAttestation,
    ) -> Result<(), ArbitrationError> {
        let demand = self
            .index
            .resolve(&logged.attestation)
            .map(|(_, demand)| demand.clone());
        if let Some(demand) = demand {
            return self.evaluate(logged, demand).await;
        }

        let uid = logged.uid();
        let can_arrive =
            escrow_can_arrive(self.pipeline.source, self.pending_escrows, &logged).await?;
        if !(can_arrive && self.index.park(logged)) {
            debug!(uid = %uid, "Fulfillment references no usable escrow");
            self.unmatched.push(uid);
        }
        Ok(())
    }

    /// The escrow feed has ended; fulfillments still waiting are unmatched.
    pub(crate) fn on_escrows_ended(&mut self) {
        self.pending_escrows = None;
        let released = self.index.drain_parked();
        if !released.is_empty() {
            debug!(count = released.len(), "Escrow feed ended with fulfillments waiting");
        }
        self.unmatched.extend(released.iter().map(LoggedAttestation::uid));
    }

    async fn evaluate(
        &mut self,
        logged: LoggedAttestation,
        demand: E::Value,
    ) -> Result<(), ArbitrationError> {
        let outcome = self
            .pipeline
            .evaluate_escrowed(self.obligation_codec, self.decider, logged, demand)
            .await?;
        self.collector.apply(outcome)
    }

    pub(crate) fn finish(self) -> EscrowArbitrationResult<C::Value, E::Value> {
        let (escrow_attestations, escrow_demands, parked) = self.index.finish();
        let mut unmatched_fulfillments = self.unmatched;
        unmatched_fulfillments.extend(parked);
        if !unmatched_fulfillments.is_empty() {
            debug!(count = unmatched_fulfillments.len(), "Unmatched fulfillments");
        }
        EscrowArbitrationResult {
            arbitration: self.collector.into_result(),
            escrow_attestations,
            escrow_demands,
            unmatched_fulfillments,
        }
    }
}

/// Whether the escrow named by `fulfillment` can still be delivered by a feed
/// over `pending`. An escrow is logged no later than the fulfillment
/// referencing it, so it must be in `pending`'s range up to that block.
async fn escrow_can_arrive(
    source: &dyn AttestationSource,
    pending: Option<&AttestationFilter>,
    fulfillment: &LoggedAttestation,
) -> Result<bool, ArbitrationError> {
    let (Some(filter), Some(escrow)) = (pending, fulfillment.attestation.reference()) else {
        return Ok(false);
    };
    let block = fulfillment.position.block_number;
    let upper = filter.to_block.map_or(block, |to| to.min(block));
    if filter.from_block > upper {
        return Ok(false);
    }
    let found = source
        .scan_historical(&filter.clone().with_uid(escrow), upper)
        .await?;
    Ok(!found.is_empty())
}
