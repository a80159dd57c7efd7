//! The [`Oracle`] runner and its public operations.
//!
//! | operation | mode | scope |
//! |---|---|---|
//! | [`arbitrate_past`](Oracle::arbitrate_past) | batch | direct |
//! | [`arbitrate_past_for_escrow`](Oracle::arbitrate_past_for_escrow) | batch | escrow scan |
//! | [`listen_and_arbitrate`](Oracle::listen_and_arbitrate) | streaming | direct |
//! | [`listen_and_arbitrate_for_escrow`](Oracle::listen_and_arbitrate_for_escrow) | streaming | escrow scan |
//! | `*_new_fulfillments*` | streaming, `only_new` | either |
//!
//! Streaming runs go through a spawned task. Awaiting one of the
//! `listen_*` futures and dropping it early cancels the task; the
//! `spawn_*` variants hand back a [`ListenHandle`] instead.

use crate::arbiter::Arbiter;
use crate::config::OracleConfig;
use crate::decision::DecisionEngine;
use crate::feed::{scan_range, AttestationFeed, EscrowFeed, FeedConfig, FeedItem};
use crate::params::{
    validate_options, EscrowParams, FulfillmentParams, FulfillmentParamsWithoutRefUid,
};
use crate::pipeline::{Collector, EscrowRun, Pipeline};
use oracle_codec::{DemandOracle, ObligationSchema};
use oracle_core::{
    ArbitratedStore, ArbitrationError, AttestationSource, DecisionCallback, EscrowDecider,
    InMemoryArbitratedStore, ObligationDecider, OracleArbiter, TransportError,
};
use oracle_types::{
    ArbitrateOptions, ArbitrationResult, EscrowArbitrationResult, SubscriptionId, Termination,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn, Instrument};

struct OracleInner {
    source: Arc<dyn AttestationSource>,
    arbiter: Arc<dyn OracleArbiter>,
    store: Arc<dyn ArbitratedStore>,
    config: OracleConfig,
    listeners: Mutex<HashMap<SubscriptionId, CancellationToken>>,
    next_listener: AtomicU64,
}

impl OracleInner {
    fn pipeline(&self, options: ArbitrateOptions) -> Pipeline<'_> {
        Pipeline::new(
            self.source.as_ref(),
            DecisionEngine::new(
                self.config.identity,
                options,
                self.store.as_ref(),
                self.arbiter.as_ref(),
            ),
            Arbiter::new(self.arbiter.as_ref(), self.store.as_ref()),
        )
    }
}

/// Removes a listener from the registry when its task ends, however it ends.
struct Registration {
    inner: Arc<OracleInner>,
    id: SubscriptionId,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.inner.listeners.lock().remove(&self.id);
    }
}

/// A background listener started by one of the `spawn_*` operations.
#[derive(Debug)]
pub struct ListenHandle<R> {
    id: SubscriptionId,
    cancel: CancellationToken,
    task: JoinHandle<Result<R, ArbitrationError>>,
}

impl<R> ListenHandle<R> {
    /// Local id, accepted by [`Oracle::unsubscribe`].
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Stop the listener. A submission already in flight completes first.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the listener to end and take its result.
    pub async fn join(self) -> Result<R, ArbitrationError> {
        self.task
            .await
            .map_err(|e| ArbitrationError::Task(e.to_string()))?
    }
}

/// Escrow arbitration oracle.
///
/// Owns the collaborators and the arbitrated store. The store lives as long
/// as the oracle, so `skip_arbitrated` sees every settlement made through
/// this instance, across runs. Cloning is cheap and shares all state.
#[derive(Clone)]
pub struct Oracle {
    inner: Arc<OracleInner>,
}

impl Oracle {
    /// Create an oracle with an in-memory arbitrated store.
    pub fn new(
        source: Arc<dyn AttestationSource>,
        arbiter: Arc<dyn OracleArbiter>,
        config: OracleConfig,
    ) -> Self {
        Self::with_store(source, arbiter, Arc::new(InMemoryArbitratedStore::new()), config)
    }

    /// Create an oracle backed by an external arbitrated store.
    pub fn with_store(
        source: Arc<dyn AttestationSource>,
        arbiter: Arc<dyn OracleArbiter>,
        store: Arc<dyn ArbitratedStore>,
        config: OracleConfig,
    ) -> Self {
        Self {
            inner: Arc::new(OracleInner {
                source,
                arbiter,
                store,
                config,
                listeners: Mutex::new(HashMap::new()),
                next_listener: AtomicU64::new(0),
            }),
        }
    }

    pub fn config(&self) -> &OracleConfig {
        &self.inner.config
    }

    pub fn arbitrated_store(&self) -> &dyn ArbitratedStore {
        self.inner.store.as_ref()
    }

    /// Ids of listeners still running.
    pub fn active_listeners(&self) -> Vec<SubscriptionId> {
        let mut ids: Vec<_> = self.inner.listeners.lock().keys().copied().collect();
        ids.sort();
        ids
    }

    /// Cancel a background listener by id.
    ///
    /// Returns false if no listener with this id is running.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        match self.inner.listeners.lock().remove(&id) {
            Some(cancel) => {
                info!(id = %id, "Unsubscribing listener");
                cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Arbitrate every matching fulfillment up to the chain head (or the
    /// filter's `to_block`).
    ///
    /// Fails on the first transport error. `only_new` has no effect.
    pub async fn arbitrate_past<C, P>(
        &self,
        fulfillment: &FulfillmentParams<C>,
        decider: &P,
        options: ArbitrateOptions,
    ) -> Result<ArbitrationResult<C::Value>, ArbitrationError>
    where
        C: ObligationSchema,
        P: ObligationDecider<C::Value> + ?Sized,
    {
        fulfillment.validate()?;
        validate_options(&options, self.inner.config.identity)?;

        let span = info_span!("arbitrate_past", schema = fulfillment.obligation_codec.name());
        async move {
            let source = self.inner.source.as_ref();
            let head = source.head_block().await?;
            let attestations = scan_range(source, &fulfillment.filter, head).await?;
            info!(head, found = attestations.len(), "Scanned fulfillments");

            let mut pipeline = self.inner.pipeline(options);
            let mut collector = Collector::new(None, self.inner.config.callback_error_policy);
            for logged in attestations {
                let outcome = pipeline
                    .evaluate_direct(&fulfillment.obligation_codec, decider, logged)
                    .await?;
                collector.apply(outcome)?;
            }

            let result = collector.into_result();
            info!(
                total = result.total_count,
                successful = result.successful_count,
                failures = result.failures.len(),
                "Arbitration complete"
            );
            Ok::<_, ArbitrationError>(result)
        }
        .instrument(span)
        .await
    }

    /// Scan escrows and fulfillments up to the chain head, pair them by
    /// `ref_uid` and arbitrate each pair.
    pub async fn arbitrate_past_for_escrow<E, C, P>(
        &self,
        escrow: &EscrowParams<E>,
        fulfillment: &FulfillmentParamsWithoutRefUid<C>,
        decider: &P,
        options: ArbitrateOptions,
    ) -> Result<EscrowArbitrationResult<C::Value, E::Value>, ArbitrationError>
    where
        E: ObligationSchema,
        E::Value: DemandOracle + Clone,
        C: ObligationSchema,
        P: EscrowDecider<C::Value, E::Value> + ?Sized,
    {
        escrow.validate()?;
        fulfillment.validate()?;
        validate_options(&options, self.inner.config.identity)?;

        let span = info_span!(
            "arbitrate_past_for_escrow",
            demand = escrow.demand_codec.name(),
            schema = fulfillment.obligation_codec.name()
        );
        async move {
            let source = self.inner.source.as_ref();
            let head = source.head_block().await?;
            let escrows = scan_range(source, &escrow.filter, head).await?;
            let fulfillments = scan_range(source, &fulfillment.filter, head).await?;
            info!(
                head,
                escrows = escrows.len(),
                fulfillments = fulfillments.len(),
                "Scanned escrows and fulfillments"
            );

            let mut run = EscrowRun::new(
                self.inner.pipeline(options),
                Collector::new(None, self.inner.config.callback_error_policy),
                &escrow.demand_codec,
                &fulfillment.obligation_codec,
                decider,
            );
            for logged in escrows {
                run.on_escrow(logged).await?;
            }
            for logged in fulfillments {
                run.on_fulfillment(logged).await?;
            }

            let result = run.finish();
            info!(
                total = result.total_count(),
                successful = result.successful_count(),
                unmatched = result.unmatched_fulfillments.len(),
                "Arbitration complete"
            );
            Ok::<_, ArbitrationError>(result)
        }
        .instrument(span)
        .await
    }

    /// Replay history, then arbitrate new fulfillments as they appear until
    /// `timeout` elapses (never, if `None`) or the run is cancelled.
    ///
    /// Each decision goes to `callback` before the next attestation is
    /// processed. Timeout and cancellation return the partial result; a
    /// transport failure ends the run with [`Termination::Failed`].
    pub async fn listen_and_arbitrate<C, P, K>(
        &self,
        fulfillment: FulfillmentParams<C>,
        decider: P,
        callback: K,
        options: ArbitrateOptions,
        timeout: Option<Duration>,
    ) -> Result<ArbitrationResult<C::Value>, ArbitrationError>
    where
        C: ObligationSchema + 'static,
        C::Value: Send + 'static,
        P: ObligationDecider<C::Value> + 'static,
        K: DecisionCallback<C::Value> + 'static,
    {
        let handle =
            self.spawn_listen_and_arbitrate(fulfillment, decider, callback, options, timeout)?;
        join_cancelling_on_drop(handle).await
    }

    /// [`listen_and_arbitrate`](Self::listen_and_arbitrate) without the
    /// historical replay.
    pub async fn listen_and_arbitrate_new_fulfillments<C, P, K>(
        &self,
        fulfillment: FulfillmentParams<C>,
        decider: P,
        callback: K,
        options: ArbitrateOptions,
        timeout: Option<Duration>,
    ) -> Result<ArbitrationResult<C::Value>, ArbitrationError>
    where
        C: ObligationSchema + 'static,
        C::Value: Send + 'static,
        P: ObligationDecider<C::Value> + 'static,
        K: DecisionCallback<C::Value> + 'static,
    {
        self.listen_and_arbitrate(
            fulfillment,
            decider,
            callback,
            options.with_only_new(true),
            timeout,
        )
        .await
    }

    /// Escrow-scanning counterpart of
    /// [`listen_and_arbitrate`](Self::listen_and_arbitrate).
    ///
    /// A fulfillment seen before its escrow waits for it, provided the escrow
    /// filter can still deliver that escrow; otherwise it is unmatched at
    /// once. Fulfillments still waiting when the run ends are unmatched too.
    pub async fn listen_and_arbitrate_for_escrow<E, C, P, K>(
        &self,
        escrow: EscrowParams<E>,
        fulfillment: FulfillmentParamsWithoutRefUid<C>,
        decider: P,
        callback: K,
        options: ArbitrateOptions,
        timeout: Option<Duration>,
    ) -> Result<EscrowArbitrationResult<C::Value, E::Value>, ArbitrationError>
    where
        E: ObligationSchema + 'static,
        E::Value: DemandOracle + Clone + Send + 'static,
        C: ObligationSchema + 'static,
        C::Value: Send + 'static,
        P: EscrowDecider<C::Value, E::Value> + 'static,
        K: DecisionCallback<C::Value, E::Value> + 'static,
    {
        let handle = self.spawn_listen_and_arbitrate_for_escrow(
            escrow,
            fulfillment,
            decider,
            callback,
            options,
            timeout,
        )?;
        join_cancelling_on_drop(handle).await
    }

    /// [`listen_and_arbitrate_for_escrow`](Self::listen_and_arbitrate_for_escrow)
    /// without the historical replay of fulfillments. Escrows are still
    /// replayed so new fulfillments of old escrows match.
    pub async fn listen_and_arbitrate_new_fulfillments_for_escrow<E, C, P, K>(
        &self,
        escrow: EscrowParams<E>,
        fulfillment: FulfillmentParamsWithoutRefUid<C>,
        decider: P,
        callback: K,
        options: ArbitrateOptions,
        timeout: Option<Duration>,
    ) -> Result<EscrowArbitrationResult<C::Value, E::Value>, ArbitrationError>
    where
        E: ObligationSchema + 'static,
        E::Value: DemandOracle + Clone + Send + 'static,
        C: ObligationSchema + 'static,
        C::Value: Send + 'static,
        P: EscrowDecider<C::Value, E::Value> + 'static,
        K: DecisionCallback<C::Value, E::Value> + 'static,
    {
        self.listen_and_arbitrate_for_escrow(
            escrow,
            fulfillment,
            decider,
            callback,
            options.with_only_new(true),
            timeout,
        )
        .await
    }

    /// Start [`listen_and_arbitrate`](Self::listen_and_arbitrate) on a
    /// background task. Must be called within a tokio runtime.
    pub fn spawn_listen_and_arbitrate<C, P, K>(
        &self,
        fulfillment: FulfillmentParams<C>,
        decider: P,
        callback: K,
        options: ArbitrateOptions,
        timeout: Option<Duration>,
    ) -> Result<ListenHandle<ArbitrationResult<C::Value>>, ArbitrationError>
    where
        C: ObligationSchema + 'static,
        C::Value: Send + 'static,
        P: ObligationDecider<C::Value> + 'static,
        K: DecisionCallback<C::Value> + 'static,
    {
        fulfillment.validate()?;
        validate_options(&options, self.inner.config.identity)?;
        let deadline = timeout.map(|t| Instant::now() + t);
        let schema = fulfillment.obligation_codec.name();

        Ok(self.spawn_listener(schema, move |inner, cancel| {
            listen_direct(inner, fulfillment, decider, callback, options, deadline, cancel)
        }))
    }

    /// Start [`listen_and_arbitrate_for_escrow`](Self::listen_and_arbitrate_for_escrow)
    /// on a background task. Must be called within a tokio runtime.
    pub fn spawn_listen_and_arbitrate_for_escrow<E, C, P, K>(
        &self,
        escrow: EscrowParams<E>,
        fulfillment: FulfillmentParamsWithoutRefUid<C>,
        decider: P,
        callback: K,
        options: ArbitrateOptions,
        timeout: Option<Duration>,
    ) -> Result<ListenHandle<EscrowArbitrationResult<C::Value, E::Value>>, ArbitrationError>
    where
        E: ObligationSchema + 'static,
        E::Value: DemandOracle + Clone + Send + 'static,
        C: ObligationSchema + 'static,
        C::Value: Send + 'static,
        P: EscrowDecider<C::Value, E::Value> + 'static,
        K: DecisionCallback<C::Value, E::Value> + 'static,
    {
        escrow.validate()?;
        fulfillment.validate()?;
        validate_options(&options, self.inner.config.identity)?;
        let deadline = timeout.map(|t| Instant::now() + t);
        let schema = fulfillment.obligation_codec.name();

        Ok(self.spawn_listener(schema, move |inner, cancel| {
            listen_escrow(
                inner,
                escrow,
                fulfillment,
                decider,
                callback,
                options,
                deadline,
                cancel,
            )
        }))
    }

    fn spawn_listener<R, F>(
        &self,
        schema: &'static str,
        run: impl FnOnce(Arc<OracleInner>, CancellationToken) -> F,
    ) -> ListenHandle<R>
    where
        F: Future<Output = Result<R, ArbitrationError>> + Send + 'static,
        R: Send + 'static,
    {
        let id = SubscriptionId(self.inner.next_listener.fetch_add(1, Ordering::Relaxed) + 1);
        let cancel = CancellationToken::new();
        self.inner.listeners.lock().insert(id, cancel.clone());

        let registration = Registration {
            inner: self.inner.clone(),
            id,
        };
        let run = run(self.inner.clone(), cancel.clone());
        let task = tokio::spawn(
            async move {
                let _registration = registration;
                run.await
            }
            .instrument(info_span!("listen", id = %id, schema)),
        );
        info!(id = %id, schema, "Listener started");

        ListenHandle { id, cancel, task }
    }
}

/// Join a listener, cancelling it if the join future is dropped.
async fn join_cancelling_on_drop<R>(handle: ListenHandle<R>) -> Result<R, ArbitrationError> {
    let guard = handle.cancel.clone().drop_guard();
    let result = handle.join().await;
    guard.disarm();
    result
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Run `work` unless the listener is cancelled or times out first.
async fn interruptible<T>(
    work: impl Future<Output = T>,
    cancel: &CancellationToken,
    deadline: Option<Instant>,
) -> Result<T, Termination> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Termination::Cancelled),
        _ = wait_until(deadline) => Err(Termination::Completed),
        out = work => Ok(out),
    }
}

fn failed(err: impl std::fmt::Display) -> Termination {
    warn!(error = %err, "Listener stopped");
    Termination::Failed {
        reason: err.to_string(),
    }
}

async fn listen_direct<C, P, K>(
    inner: Arc<OracleInner>,
    fulfillment: FulfillmentParams<C>,
    decider: P,
    callback: K,
    options: ArbitrateOptions,
    deadline: Option<Instant>,
    cancel: CancellationToken,
) -> Result<ArbitrationResult<C::Value>, ArbitrationError>
where
    C: ObligationSchema,
    P: ObligationDecider<C::Value>,
    K: DecisionCallback<C::Value>,
{
    let open = AttestationFeed::open(
        inner.source.clone(),
        fulfillment.filter.clone(),
        !options.only_new,
        FeedConfig::from(&inner.config),
    );
    let mut feed = match interruptible(open, &cancel, deadline).await {
        Ok(feed) => feed?,
        Err(termination) => {
            info!(termination = ?termination, "Listener stopped while opening its feed");
            return Ok(ArbitrationResult {
                termination,
                ..ArbitrationResult::new()
            });
        }
    };

    let callback: &dyn DecisionCallback<C::Value> = &callback;
    let mut pipeline = inner.pipeline(options);
    let mut collector = Collector::new(Some(callback), inner.config.callback_error_policy);

    let termination = loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => break Termination::Cancelled,
            _ = wait_until(deadline) => break Termination::Completed,
            next = feed.next() => next,
        };
        let logged = match next {
            Ok(Some(logged)) => logged,
            Ok(None) => break Termination::Completed,
            Err(err) => break failed(err),
        };

        let outcome = match pipeline
            .evaluate_direct(&fulfillment.obligation_codec, &decider, logged)
            .await
        {
            Ok(outcome) => outcome,
            Err(err) => break failed(err),
        };
        if let Err(err) = collector.apply(outcome) {
            break failed(err);
        }
    };

    let mut result = collector.into_result();
    result.termination = termination;
    info!(
        total = result.total_count,
        successful = result.successful_count,
        termination = ?result.termination,
        "Listener finished"
    );
    Ok(result)
}

#[allow(clippy::too_many_arguments)]
async fn listen_escrow<E, C, P, K>(
    inner: Arc<OracleInner>,
    escrow: EscrowParams<E>,
    fulfillment: FulfillmentParamsWithoutRefUid<C>,
    decider: P,
    callback: K,
    options: ArbitrateOptions,
    deadline: Option<Instant>,
    cancel: CancellationToken,
) -> Result<EscrowArbitrationResult<C::Value, E::Value>, ArbitrationError>
where
    E: ObligationSchema,
    E::Value: DemandOracle + Clone,
    C: ObligationSchema,
    P: EscrowDecider<C::Value, E::Value>,
    K: DecisionCallback<C::Value, E::Value>,
{
    let feed_config = FeedConfig::from(&inner.config);
    let open = async {
        let escrows = AttestationFeed::open(
            inner.source.clone(),
            escrow.filter.clone(),
            true,
            feed_config,
        )
        .await?;
        let fulfillments = AttestationFeed::open(
            inner.source.clone(),
            fulfillment.filter.clone(),
            !options.only_new,
            feed_config,
        )
        .await?;
        Ok::<_, TransportError>(EscrowFeed::new(escrows, fulfillments))
    };
    let mut feed = match interruptible(open, &cancel, deadline).await {
        Ok(feed) => feed?,
        Err(termination) => {
            info!(termination = ?termination, "Listener stopped while opening its feeds");
            let mut result = EscrowArbitrationResult::default();
            result.arbitration.termination = termination;
            return Ok(result);
        }
    };

    let callback: &dyn DecisionCallback<C::Value, E::Value> = &callback;
    let mut run = EscrowRun::new(
        inner.pipeline(options),
        Collector::new(Some(callback), inner.config.callback_error_policy),
        &escrow.demand_codec,
        &fulfillment.obligation_codec,
        &decider,
    )
    .streaming(&escrow.filter);

    let termination = loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => break Termination::Cancelled,
            _ = wait_until(deadline) => break Termination::Completed,
            next = feed.next() => next,
        };
        let step = match next {
            Ok(Some(FeedItem::Escrow(logged))) => run.on_escrow(logged).await,
            Ok(Some(FeedItem::Fulfillment(logged))) => run.on_fulfillment(logged).await,
            Ok(Some(FeedItem::EscrowsEnded)) => {
                run.on_escrows_ended();
                Ok(())
            }
            Ok(None) => break Termination::Completed,
            Err(err) => break failed(err),
        };
        if let Err(err) = step {
            break failed(err);
        }
    };

    let mut result = run.finish();
    result.arbitration.termination = termination;
    info!(
        total = result.total_count(),
        successful = result.successful_count(),
        unmatched = result.unmatched_fulfillments.len(),
        termination = ?result.arbitration.termination,
        "Listener finished"
    );
    Ok(result)
}
