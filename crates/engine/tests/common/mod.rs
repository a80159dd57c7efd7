//! Shared setup for engine integration tests.

#![allow(dead_code)]

use oracle_codec::{StringObligation, StringObligationCodec};
use oracle_engine::{FulfillmentParams, FulfillmentParamsWithoutRefUid, Oracle, OracleConfig};
use oracle_test_helpers::fixtures::{self, BOB};
use oracle_test_helpers::{InMemoryRegistry, RecordingArbiter};
use oracle_types::{Decision, Uid};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub struct Harness {
    pub registry: Arc<InMemoryRegistry>,
    pub arbiter: Arc<RecordingArbiter>,
    pub oracle: Oracle,
}

impl Harness {
    /// Oracle running as Bob.
    pub fn new() -> Self {
        Self::with_config(OracleConfig::new(BOB))
    }

    pub fn with_config(config: OracleConfig) -> Self {
        Self::with_arbiter(RecordingArbiter::new(), config)
    }

    pub fn with_arbiter(arbiter: RecordingArbiter, config: OracleConfig) -> Self {
        Self::with_parts(InMemoryRegistry::new(), arbiter, config)
    }

    /// Oracle running as Bob over a preconfigured registry.
    pub fn with_registry(registry: InMemoryRegistry) -> Self {
        Self::with_parts(registry, RecordingArbiter::new(), OracleConfig::new(BOB))
    }

    pub fn with_parts(
        registry: InMemoryRegistry,
        arbiter: RecordingArbiter,
        config: OracleConfig,
    ) -> Self {
        let registry = Arc::new(registry);
        let arbiter = Arc::new(arbiter);
        let oracle = Oracle::new(registry.clone(), arbiter.clone(), config);
        Self {
            registry,
            arbiter,
            oracle,
        }
    }
}

/// String fulfillments of one escrow.
pub fn direct_params(escrow: Uid) -> FulfillmentParams<StringObligationCodec> {
    FulfillmentParams::new(
        StringObligationCodec,
        fixtures::fulfillment_filter().with_ref_uid(escrow),
    )
}

/// String fulfillments of any escrow.
pub fn scan_params() -> FulfillmentParamsWithoutRefUid<StringObligationCodec> {
    FulfillmentParamsWithoutRefUid::new(StringObligationCodec, fixtures::fulfillment_filter())
}

/// `item == "good"`, counting invocations.
#[derive(Clone, Default)]
pub struct CountingPredicate {
    calls: Arc<AtomicUsize>,
}

impl CountingPredicate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn direct(&self) -> impl Fn(&StringObligation) -> bool + Send + Sync + 'static {
        let calls = self.calls.clone();
        move |obligation: &StringObligation| {
            calls.fetch_add(1, Ordering::SeqCst);
            obligation.item == "good"
        }
    }

    pub fn with_demand<D: 'static>(
        &self,
    ) -> impl Fn(&StringObligation, &D) -> bool + Send + Sync + 'static {
        let calls = self.calls.clone();
        move |obligation: &StringObligation, _: &D| {
            calls.fetch_add(1, Ordering::SeqCst);
            obligation.item == "good"
        }
    }
}

/// Records the fulfillment uid of every decision delivered.
#[derive(Clone, Default)]
pub struct Recorder {
    seen: Arc<Mutex<Vec<Uid>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn callback<D: 'static>(
        &self,
    ) -> impl Fn(&Decision<StringObligation, D>) + Send + Sync + 'static {
        let seen = self.seen.clone();
        move |decision: &Decision<StringObligation, D>| {
            seen.lock().push(decision.fulfillment_uid())
        }
    }

    pub fn seen(&self) -> Vec<Uid> {
        self.seen.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.seen.lock().len()
    }
}

/// Poll `condition` until it holds, failing the test after five seconds.
pub async fn wait_for(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached in time"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
