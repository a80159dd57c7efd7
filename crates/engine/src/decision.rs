//! Gates and predicate invocation.
//!
//! Before the predicate runs, a fulfillment passes three optional gates in
//! this order:
//!
//! | option | skipped when |
//! |---|---|
//! | `skip_arbitrated` | the uid is in the arbitrated store |
//! | `require_oracle` | the escrow demand names another oracle, or none |
//! | `require_request` | nobody requested this oracle's arbitration |
//!
//! Skipped fulfillments produce no decision and are not counted.

use oracle_core::{
    ArbitratedStore, DecisionError, EscrowDecider, ObligationDecider, OracleArbiter,
    TransportError,
};
use oracle_types::{Address, ArbitrateOptions, Uid};
use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Why a fulfillment was not evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    AlreadyArbitrated,
    NotDesignatedOracle,
    NotRequested,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::AlreadyArbitrated => write!(f, "already arbitrated"),
            SkipReason::NotDesignatedOracle => write!(f, "not the designated oracle"),
            SkipReason::NotRequested => write!(f, "arbitration not requested"),
        }
    }
}

/// Applies [`ArbitrateOptions`] gates and runs caller predicates.
pub struct DecisionEngine<'a> {
    identity: Address,
    options: ArbitrateOptions,
    store: &'a dyn ArbitratedStore,
    requests: &'a dyn OracleArbiter,
}

impl<'a> DecisionEngine<'a> {
    pub fn new(
        identity: Address,
        options: ArbitrateOptions,
        store: &'a dyn ArbitratedStore,
        requests: &'a dyn OracleArbiter,
    ) -> Self {
        Self {
            identity,
            options,
            store,
            requests,
        }
    }

    pub fn options(&self) -> &ArbitrateOptions {
        &self.options
    }

    /// `skip_arbitrated` gate.
    pub fn check_arbitrated(&self, uid: &Uid) -> Option<SkipReason> {
        (self.options.skip_arbitrated && self.store.contains(uid))
            .then_some(SkipReason::AlreadyArbitrated)
    }

    /// `require_oracle` gate, given the oracle the escrow designates.
    pub fn check_oracle(&self, designated: Option<Address>) -> Option<SkipReason> {
        (self.options.require_oracle && designated != Some(self.identity))
            .then_some(SkipReason::NotDesignatedOracle)
    }

    /// `require_request` gate.
    pub async fn check_request(&self, uid: Uid) -> Result<Option<SkipReason>, TransportError> {
        if !self.options.require_request {
            return Ok(None);
        }
        let requested = self.requests.arbitration_requested(uid, self.identity).await?;
        Ok((!requested).then_some(SkipReason::NotRequested))
    }

    /// Run a direct-mode predicate. Panics become [`DecisionError::Panicked`].
    pub fn decide<T, P>(&self, decider: &P, obligation: &T) -> Result<bool, DecisionError>
    where
        P: ObligationDecider<T> + ?Sized,
    {
        catch_unwind(AssertUnwindSafe(|| decider.decide(obligation)))
            .unwrap_or_else(|payload| Err(DecisionError::Panicked(panic_message(payload))))
    }

    /// Run an escrow-mode predicate. Panics become [`DecisionError::Panicked`].
    pub fn decide_with_demand<T, D, P>(
        &self,
        decider: &P,
        obligation: &T,
        demand: &D,
    ) -> Result<bool, DecisionError>
    where
        P: EscrowDecider<T, D> + ?Sized,
    {
        catch_unwind(AssertUnwindSafe(|| decider.decide(obligation, demand)))
            .unwrap_or_else(|payload| Err(DecisionError::Panicked(panic_message(payload))))
    }
}

pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
