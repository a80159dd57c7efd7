//! In-memory attestation registry.

use async_trait::async_trait;
use futures::future::ready;
use futures::StreamExt;
use oracle_core::{AttestationSource, AttestationStream, TransportError};
use oracle_types::{
    Address, Attestation, AttestationFilter, Bytes, LogPosition, LoggedAttestation, Uid,
};
use parking_lot::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::debug;

/// Fields of a new attestation. The registry assigns uid, time and position.
#[derive(Debug, Clone, Default)]
pub struct AttestationRequest {
    pub schema: Uid,
    pub attester: Address,
    pub recipient: Address,
    pub ref_uid: Uid,
    pub expiration_time: u64,
    pub revocable: bool,
    pub data: Bytes,
}

impl AttestationRequest {
    pub fn new(schema: Uid, attester: Address, data: Bytes) -> Self {
        Self {
            schema,
            attester,
            data,
            ..Default::default()
        }
    }

    pub fn with_recipient(mut self, recipient: Address) -> Self {
        self.recipient = recipient;
        self
    }

    pub fn with_ref_uid(mut self, ref_uid: Uid) -> Self {
        self.ref_uid = ref_uid;
        self
    }
}

#[derive(Debug, Default)]
struct RegistryState {
    log: Vec<LoggedAttestation>,
    head: u64,
    next_uid: u64,
    fail_queries: bool,
    fail_subscribe: bool,
}

/// Append-only attestation log with live fan-out.
///
/// Each [`attest`](Self::attest) mines a new block holding one log. Use
/// [`attest_block`](Self::attest_block) to put several logs in one block.
pub struct InMemoryRegistry {
    state: Mutex<RegistryState>,
    live: broadcast::Sender<Result<LoggedAttestation, TransportError>>,
    scan_delay: Option<Duration>,
}

impl Default for InMemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::with_live_capacity(1024)
    }

    /// Registry whose subscribers lag once more than `capacity` logs are
    /// waiting to be read.
    pub fn with_live_capacity(capacity: usize) -> Self {
        let (live, _) = broadcast::channel(capacity);
        Self {
            state: Mutex::new(RegistryState::default()),
            live,
            scan_delay: None,
        }
    }

    /// Delay every historical scan by `delay`.
    pub fn with_scan_delay(mut self, delay: Duration) -> Self {
        self.scan_delay = Some(delay);
        self
    }

    /// Mine a block containing one attestation.
    pub fn attest(&self, request: AttestationRequest) -> LoggedAttestation {
        self.attest_block(vec![request]).remove(0)
    }

    /// Mine a block containing the given attestations, in order.
    pub fn attest_block(&self, requests: Vec<AttestationRequest>) -> Vec<LoggedAttestation> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();

        // Log and broadcast under one lock so a subscriber that reads the
        // head afterwards sees every block either in history or live.
        let mut state = self.state.lock();
        state.head += 1;
        let block = state.head;

        let mut created = Vec::with_capacity(requests.len());
        for (log_index, request) in requests.into_iter().enumerate() {
            state.next_uid += 1;
            let uid = Uid::left_padding_from(&state.next_uid.to_be_bytes());
            let logged = LoggedAttestation::new(
                Attestation {
                    uid,
                    schema: request.schema,
                    time: now,
                    expiration_time: request.expiration_time,
                    revocation_time: 0,
                    ref_uid: request.ref_uid,
                    recipient: request.recipient,
                    attester: request.attester,
                    revocable: request.revocable,
                    data: request.data,
                },
                LogPosition::new(block, log_index as u64),
            );
            debug!(uid = %uid, block, "Attested");
            state.log.push(logged.clone());
            // No receivers is fine
            let _ = self.live.send(Ok(logged.clone()));
            created.push(logged);
        }
        created
    }

    /// Mine an empty block.
    pub fn mine_empty(&self) -> u64 {
        let mut state = self.state.lock();
        state.head += 1;
        state.head
    }

    /// Make historical queries and lookups fail.
    pub fn set_fail_queries(&self, fail: bool) {
        self.state.lock().fail_queries = fail;
    }

    /// Make new subscriptions fail.
    pub fn set_fail_subscribe(&self, fail: bool) {
        self.state.lock().fail_subscribe = fail;
    }

    /// Push a transport error to every live subscriber.
    pub fn drop_subscriptions(&self, reason: &str) {
        let _ = self
            .live
            .send(Err(TransportError::Subscription(reason.to_string())));
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.live.receiver_count()
    }

    /// Every attestation, in log order.
    pub fn all(&self) -> Vec<LoggedAttestation> {
        self.state.lock().log.clone()
    }
}

#[async_trait]
impl AttestationSource for InMemoryRegistry {
    async fn head_block(&self) -> Result<u64, TransportError> {
        let state = self.state.lock();
        if state.fail_queries {
            return Err(TransportError::Query("registry unavailable".into()));
        }
        Ok(state.head)
    }

    async fn scan_historical(
        &self,
        filter: &AttestationFilter,
        to_block: u64,
    ) -> Result<Vec<LoggedAttestation>, TransportError> {
        if let Some(delay) = self.scan_delay {
            tokio::time::sleep(delay).await;
        }
        let state = self.state.lock();
        if state.fail_queries {
            return Err(TransportError::Query("registry unavailable".into()));
        }
        Ok(state
            .log
            .iter()
            .filter(|l| {
                let block = l.position.block_number;
                block >= filter.from_block
                    && block <= to_block
                    && filter.matches_fields(&l.attestation)
            })
            .cloned()
            .collect())
    }

    async fn subscribe(
        &self,
        filter: &AttestationFilter,
    ) -> Result<AttestationStream, TransportError> {
        // Subscribe while holding the state lock so no block slips between
        // the caller's subscription and its next head query.
        let state = self.state.lock();
        if state.fail_subscribe {
            return Err(TransportError::Subscription("subscribe refused".into()));
        }
        let rx = self.live.subscribe();
        drop(state);

        let filter = filter.clone();
        // A lagged receiver has lost logs; report it as a dropped subscription.
        let stream = futures::stream::unfold(rx, |mut rx| async move {
            match rx.recv().await {
                Ok(item) => Some((item, rx)),
                Err(RecvError::Lagged(missed)) => {
                    let err = TransportError::Subscription(format!("lagged by {missed} logs"));
                    Some((Err(err), rx))
                }
                Err(RecvError::Closed) => None,
            }
        })
        .filter(move |item| {
            ready(match item {
                Ok(logged) => filter.matches(logged),
                Err(_) => true,
            })
        });

        Ok(stream.boxed())
    }

    async fn get_attestation(&self, uid: Uid) -> Result<Option<Attestation>, TransportError> {
        let state = self.state.lock();
        if state.fail_queries {
            return Err(TransportError::Query("registry unavailable".into()));
        }
        Ok(state
            .log
            .iter()
            .find(|l| l.attestation.uid == uid)
            .map(|l| l.attestation.clone()))
    }
}
