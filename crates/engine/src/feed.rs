//! Ordered attestation feeds: historical replay merged with the live
//! subscription.
//!
//! ```text
//!   subscribe ──► head ──► scan [from, head] ──► backlog ─┐
//!       │                                                 ├──► next()
//!       └──────── live (drop block <= head, dedupe uid) ──┘
//! ```
//!
//! The subscription is opened before the head is read, so every attestation
//! lands either in the replayed range or in the live stream. Items in both
//! are dropped from the live side. Uids are remembered only for blocks a
//! later gap scan can revisit, so a long-running feed stays bounded.

use crate::config::{OracleConfig, TransportErrorPolicy};
use futures::StreamExt;
use oracle_core::{AttestationSource, AttestationStream, TransportError};
use oracle_types::{AttestationFilter, LoggedAttestation, Uid};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Resolve the upper bound of a batch scan and run it.
pub(crate) async fn scan_range(
    source: &dyn AttestationSource,
    filter: &AttestationFilter,
    head: u64,
) -> Result<Vec<LoggedAttestation>, TransportError> {
    let upper = filter.to_block.unwrap_or(head);
    if filter.from_block > upper {
        return Ok(Vec::new());
    }
    source.scan_historical(filter, upper).await
}

/// Transport settings of a feed.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FeedConfig {
    pub policy: TransportErrorPolicy,
    pub resubscribe_delay: Duration,
    pub max_resubscribes: u32,
}

impl From<&OracleConfig> for FeedConfig {
    fn from(config: &OracleConfig) -> Self {
        Self {
            policy: config.transport_error_policy,
            resubscribe_delay: config.resubscribe_delay(),
            max_resubscribes: config.max_resubscribes,
        }
    }
}

enum Live {
    Active(AttestationStream),
    Lost(TransportError),
    Ended,
}

/// One filter's attestations, history first, then live.
pub(crate) struct AttestationFeed {
    source: Arc<dyn AttestationSource>,
    filter: AttestationFilter,
    config: FeedConfig,
    backlog: VecDeque<LoggedAttestation>,
    live: Live,
    /// Live items at or below this block were covered by a scan.
    watermark: u64,
    /// First block a gap scan has to cover after a reconnect.
    resume_from: u64,
    /// Delivered uids at or above `resume_from`, with their block.
    seen: HashMap<Uid, u64>,
    resubscribes: u32,
}

impl AttestationFeed {
    /// Subscribe, then replay history up to the head unless `replay` is off.
    pub(crate) async fn open(
        source: Arc<dyn AttestationSource>,
        filter: AttestationFilter,
        replay: bool,
        config: FeedConfig,
    ) -> Result<Self, TransportError> {
        let stream = source.subscribe(&filter).await?;
        let head = source.head_block().await?;

        let backlog: VecDeque<_> = if replay {
            let upper = filter.to_block.map_or(head, |to| to.min(head));
            if filter.from_block <= upper {
                source.scan_historical(&filter, upper).await?.into()
            } else {
                VecDeque::new()
            }
        } else {
            VecDeque::new()
        };

        // Nothing can arrive live once the range ends at or below the head.
        let live = if filter.to_block.is_some_and(|to| to <= head) {
            Live::Ended
        } else {
            Live::Active(stream)
        };

        debug!(
            head,
            replayed = backlog.len(),
            replay,
            "Opened attestation feed"
        );

        Ok(Self {
            source,
            filter,
            config,
            backlog,
            live,
            watermark: if replay { head } else { 0 },
            resume_from: head + 1,
            seen: HashMap::new(),
            resubscribes: 0,
        })
    }

    /// Next replayed item, if any remain.
    pub(crate) fn peek_backlog(&self) -> Option<&LoggedAttestation> {
        self.backlog.front()
    }

    pub(crate) fn pop_backlog(&mut self) -> Option<LoggedAttestation> {
        self.backlog.pop_front()
    }

    /// Next attestation, or `None` once the feed's block range is exhausted.
    ///
    /// Cancel safe: dropping the future loses no attestation.
    pub(crate) async fn next(&mut self) -> Result<Option<LoggedAttestation>, TransportError> {
        loop {
            if let Some(item) = self.backlog.pop_front() {
                return Ok(Some(item));
            }
            if matches!(self.live, Live::Ended) {
                return Ok(None);
            }
            if matches!(self.live, Live::Lost(_)) {
                self.resubscribe().await?;
                continue;
            }
            let Live::Active(stream) = &mut self.live else {
                continue;
            };
            match stream.next().await {
                Some(Ok(logged)) => {
                    if let Some(item) = self.admit(logged) {
                        return Ok(Some(item));
                    }
                }
                Some(Err(err)) => self.live = Live::Lost(err),
                None => self.live = Live::Lost(TransportError::Closed),
            }
        }
    }

    fn admit(&mut self, logged: LoggedAttestation) -> Option<LoggedAttestation> {
        let block = logged.position.block_number;
        if self.filter.to_block.is_some_and(|to| block > to) {
            self.live = Live::Ended;
            return None;
        }
        if block <= self.watermark || !self.filter.matches(&logged) {
            return None;
        }
        if self.seen.contains_key(&logged.uid()) {
            return None;
        }
        if block > self.resume_from {
            self.resume_from = block;
            self.prune_seen();
        }
        self.seen.insert(logged.uid(), block);
        Some(logged)
    }

    /// Forget uids below `resume_from`; neither the live side nor a gap scan
    /// can produce them again.
    fn prune_seen(&mut self) {
        let from = self.resume_from;
        self.seen.retain(|_, block| *block >= from);
    }

    async fn resubscribe(&mut self) -> Result<(), TransportError> {
        let Live::Lost(err) = std::mem::replace(&mut self.live, Live::Ended) else {
            return Ok(());
        };
        if self.config.policy == TransportErrorPolicy::Abort
            || self.resubscribes >= self.config.max_resubscribes
        {
            return Err(err);
        }

        self.resubscribes += 1;
        warn!(
            attempt = self.resubscribes,
            error = %err,
            "Live subscription lost, resubscribing"
        );
        self.live = Live::Lost(err);
        tokio::time::sleep(self.config.resubscribe_delay).await;

        if let Err(err) = self.reopen().await {
            warn!(error = %err, "Resubscribe failed");
            self.live = Live::Lost(err);
        }
        Ok(())
    }

    /// Resubscribe and replay the blocks produced while disconnected.
    async fn reopen(&mut self) -> Result<(), TransportError> {
        let stream = self.source.subscribe(&self.filter).await?;
        let head = self.source.head_block().await?;

        let from = self.resume_from.max(self.filter.from_block);
        let upper = self.filter.to_block.map_or(head, |to| to.min(head));
        if from <= upper {
            let gap = self
                .filter
                .clone()
                .with_blocks(from, self.filter.to_block);
            for item in self.source.scan_historical(&gap, upper).await? {
                if !self.seen.contains_key(&item.uid()) {
                    self.backlog.push_back(item);
                }
            }
        }

        debug!(head, recovered = self.backlog.len(), "Resubscribed");
        self.watermark = self.watermark.max(head);
        // Blocks up to the head are now backlogged or delivered
        self.resume_from = self.resume_from.max(head + 1);
        self.prune_seen();
        self.live = if self.filter.to_block.is_some_and(|to| to <= head) {
            Live::Ended
        } else {
            Live::Active(stream)
        };
        Ok(())
    }
}

/// An attestation from one of the two feeds of escrow-scanning mode.
#[derive(Debug, Clone)]
pub(crate) enum FeedItem {
    Escrow(LoggedAttestation),
    Fulfillment(LoggedAttestation),
    /// The escrow range is exhausted; no further escrows follow.
    EscrowsEnded,
}

/// Escrow and fulfillment feeds merged into one sequence.
///
/// Replayed items interleave in log order. Live items are taken from
/// whichever subscription delivers first.
pub(crate) struct EscrowFeed {
    escrows: AttestationFeed,
    fulfillments: AttestationFeed,
    escrows_done: bool,
    fulfillments_done: bool,
}

impl EscrowFeed {
    pub(crate) fn new(escrows: AttestationFeed, fulfillments: AttestationFeed) -> Self {
        Self {
            escrows,
            fulfillments,
            escrows_done: false,
            fulfillments_done: false,
        }
    }

    pub(crate) async fn next(&mut self) -> Result<Option<FeedItem>, TransportError> {
        let take_escrow = match (self.escrows.peek_backlog(), self.fulfillments.peek_backlog()) {
            (Some(e), Some(f)) => Some(e.position <= f.position),
            (Some(_), None) => Some(true),
            (None, Some(_)) => Some(false),
            (None, None) => None,
        };
        match take_escrow {
            Some(true) => return Ok(self.escrows.pop_backlog().map(FeedItem::Escrow)),
            Some(false) => {
                return Ok(self.fulfillments.pop_backlog().map(FeedItem::Fulfillment))
            }
            None => {}
        }

        loop {
            tokio::select! {
                item = self.escrows.next(), if !self.escrows_done => match item? {
                    Some(logged) => return Ok(Some(FeedItem::Escrow(logged))),
                    None => {
                        self.escrows_done = true;
                        return Ok(Some(FeedItem::EscrowsEnded));
                    }
                },
                item = self.fulfillments.next(), if !self.fulfillments_done => match item? {
                    Some(logged) => return Ok(Some(FeedItem::Fulfillment(logged))),
                    None => self.fulfillments_done = true,
                },
                else => return Ok(None),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oracle_test_helpers::fixtures::{self, BOB};
    use oracle_test_helpers::InMemoryRegistry;

    fn config(policy: TransportErrorPolicy) -> FeedConfig {
        FeedConfig {
            policy,
            resubscribe_delay: Duration::from_millis(1),
            max_resubscribes: 2,
        }
    }

    async fn open(registry: &Arc<InMemoryRegistry>, replay: bool) -> AttestationFeed {
        AttestationFeed::open(
            registry.clone(),
            fixtures::fulfillment_filter(),
            replay,
            config(TransportErrorPolicy::Resubscribe),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_history_then_live() {
        let registry = Arc::new(InMemoryRegistry::new());
        let escrow = fixtures::escrow(&registry, BOB);
        let first = fixtures::fulfillment(&registry, escrow.uid(), "one");

        let mut feed = open(&registry, true).await;
        let second = fixtures::fulfillment(&registry, escrow.uid(), "two");

        assert_eq!(feed.next().await.unwrap(), Some(first));
        assert_eq!(feed.next().await.unwrap(), Some(second));
    }

    #[tokio::test]
    async fn test_only_new_skips_history() {
        let registry = Arc::new(InMemoryRegistry::new());
        let escrow = fixtures::escrow(&registry, BOB);
        fixtures::fulfillment(&registry, escrow.uid(), "old");

        let mut feed = open(&registry, false).await;
        assert!(feed.peek_backlog().is_none());
        let fresh = fixtures::fulfillment(&registry, escrow.uid(), "new");
        assert_eq!(feed.next().await.unwrap(), Some(fresh));
    }

    #[tokio::test]
    async fn test_bounded_range_ends() {
        let registry = Arc::new(InMemoryRegistry::new());
        let escrow = fixtures::escrow(&registry, BOB);
        let only = fixtures::fulfillment(&registry, escrow.uid(), "one");
        let head = only.position.block_number;

        let mut feed = AttestationFeed::open(
            registry.clone(),
            fixtures::fulfillment_filter().with_blocks(0, Some(head)),
            true,
            config(TransportErrorPolicy::Abort),
        )
        .await
        .unwrap();

        assert_eq!(feed.next().await.unwrap(), Some(only));
        assert_eq!(feed.next().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_abort_policy_surfaces_drop() {
        let registry = Arc::new(InMemoryRegistry::new());
        let mut feed = AttestationFeed::open(
            registry.clone(),
            fixtures::fulfillment_filter(),
            true,
            config(TransportErrorPolicy::Abort),
        )
        .await
        .unwrap();

        registry.drop_subscriptions("node restarted");
        assert!(matches!(
            feed.next().await,
            Err(TransportError::Subscription(_))
        ));
    }

    #[tokio::test]
    async fn test_resubscribe_replays_gap() {
        let registry = Arc::new(InMemoryRegistry::new());
        let escrow = fixtures::escrow(&registry, BOB);
        let mut feed = open(&registry, true).await;

        registry.drop_subscriptions("node restarted");
        // Produced while the feed is disconnected
        let missed = fixtures::fulfillment(&registry, escrow.uid(), "missed");

        assert_eq!(feed.next().await.unwrap(), Some(missed.clone()));

        let after = fixtures::fulfillment(&registry, escrow.uid(), "after");
        assert_eq!(feed.next().await.unwrap(), Some(after.clone()));
        assert_eq!(feed.seen.len(), 1);
        assert!(feed.seen.contains_key(&after.uid()));
    }

    #[tokio::test]
    async fn test_seen_keeps_only_current_block() {
        let registry = Arc::new(InMemoryRegistry::new());
        let escrow = fixtures::escrow(&registry, BOB);
        let mut feed = open(&registry, true).await;

        for i in 0..20 {
            let item = fixtures::fulfillment(&registry, escrow.uid(), &format!("item-{i}"));
            assert_eq!(feed.next().await.unwrap(), Some(item));
        }
        assert_eq!(feed.seen.len(), 1);
        assert_eq!(feed.resume_from, registry.head_block().await.unwrap());
    }

    #[tokio::test]
    async fn test_lagged_subscription_recovered_by_gap_scan() {
        let registry = Arc::new(InMemoryRegistry::with_live_capacity(1));
        let escrow = fixtures::escrow(&registry, BOB);
        let mut feed = open(&registry, true).await;

        let first = fixtures::fulfillment(&registry, escrow.uid(), "one");
        let second = fixtures::fulfillment(&registry, escrow.uid(), "two");

        assert_eq!(feed.next().await.unwrap(), Some(first));
        assert_eq!(feed.next().await.unwrap(), Some(second));
        assert_eq!(feed.resubscribes, 1);
    }

    #[tokio::test]
    async fn test_resubscribe_limit() {
        let registry = Arc::new(InMemoryRegistry::new());
        let mut feed = open(&registry, true).await;

        registry.set_fail_subscribe(true);
        registry.drop_subscriptions("gone");
        assert!(feed.next().await.is_err());
        assert_eq!(feed.resubscribes, 2);
    }

    #[tokio::test]
    async fn test_escrow_feed_interleaves_history() {
        let registry = Arc::new(InMemoryRegistry::new());
        let e1 = fixtures::escrow(&registry, BOB);
        let f1 = fixtures::fulfillment(&registry, e1.uid(), "one");
        let e2 = fixtures::escrow(&registry, BOB);

        let cfg = config(TransportErrorPolicy::Abort);
        let escrows = AttestationFeed::open(registry.clone(), fixtures::escrow_filter(), true, cfg)
            .await
            .unwrap();
        let fulfillments =
            AttestationFeed::open(registry.clone(), fixtures::fulfillment_filter(), true, cfg)
                .await
                .unwrap();
        let mut feed = EscrowFeed::new(escrows, fulfillments);

        let order: Vec<Uid> = [
            feed.next().await.unwrap(),
            feed.next().await.unwrap(),
            feed.next().await.unwrap(),
        ]
        .into_iter()
        .map(|item| match item {
            Some(FeedItem::Escrow(l)) | Some(FeedItem::Fulfillment(l)) => l.uid(),
            Some(FeedItem::EscrowsEnded) | None => Uid::ZERO,
        })
        .collect();
        assert_eq!(order, vec![e1.uid(), f1.uid(), e2.uid()]);
    }

    #[tokio::test]
    async fn test_escrow_feed_signals_end_of_escrows() {
        let registry = Arc::new(InMemoryRegistry::new());
        let escrow = fixtures::escrow(&registry, BOB);
        let head = escrow.position.block_number;

        let cfg = config(TransportErrorPolicy::Abort);
        let escrows = AttestationFeed::open(
            registry.clone(),
            fixtures::escrow_filter().with_blocks(0, Some(head)),
            true,
            cfg,
        )
        .await
        .unwrap();
        let fulfillments =
            AttestationFeed::open(registry.clone(), fixtures::fulfillment_filter(), true, cfg)
                .await
                .unwrap();
        let mut feed = EscrowFeed::new(escrows, fulfillments);

        assert!(matches!(feed.next().await, Ok(Some(FeedItem::Escrow(_)))));
        assert!(matches!(feed.next().await, Ok(Some(FeedItem::EscrowsEnded))));

        let live = fixtures::fulfillment(&registry, escrow.uid(), "live");
        match feed.next().await {
            Ok(Some(FeedItem::Fulfillment(l))) => assert_eq!(l, live),
            other => panic!("unexpected item {other:?}"),
        }
    }
}
