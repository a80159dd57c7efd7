//! Escrow matching.
//!
//! Direct mode resolves the escrow named by a fulfillment's `ref_uid` on
//! demand ([`DirectEscrows`]). Escrow-scanning mode indexes every discovered
//! escrow with its decoded demand and pairs fulfillments against that index
//! ([`EscrowIndex`]); fulfillments that arrive before their escrow are parked
//! until it shows up.

use indexmap::IndexMap;
use oracle_codec::{DemandOracle, ObligationSchema, TrustedOracleDemandCodec};
use oracle_core::{ArbitrationError, AttestationSource, TransportError};
use oracle_types::{Address, Attestation, LoggedAttestation, Uid};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Escrows discovered in escrow-scanning mode, in log order.
#[derive(Debug)]
pub struct EscrowIndex<D> {
    escrows: IndexMap<Uid, (Attestation, D)>,
    undecodable: HashSet<Uid>,
    parked: IndexMap<Uid, Vec<LoggedAttestation>>,
}

impl<D> Default for EscrowIndex<D> {
    fn default() -> Self {
        Self {
            escrows: IndexMap::new(),
            undecodable: HashSet::new(),
            parked: IndexMap::new(),
        }
    }
}

impl<D> EscrowIndex<D> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index an escrow and its decoded demand.
    ///
    /// Returns the fulfillments that were waiting for it.
    pub fn insert(
        &mut self,
        escrow: Attestation,
        demand: D,
    ) -> Result<Vec<LoggedAttestation>, ArbitrationError> {
        let uid = escrow.uid;
        self.check_unique(uid)?;
        self.escrows.insert(uid, (escrow, demand));
        Ok(self.parked.shift_remove(&uid).unwrap_or_default())
    }

    /// Record an escrow whose demand failed to decode. Fulfillments naming it
    /// stay unmatched.
    pub fn insert_undecodable(&mut self, uid: Uid) -> Result<(), ArbitrationError> {
        self.check_unique(uid)?;
        self.undecodable.insert(uid);
        Ok(())
    }

    fn check_unique(&self, uid: Uid) -> Result<(), ArbitrationError> {
        if self.escrows.contains_key(&uid) || self.undecodable.contains(&uid) {
            return Err(ArbitrationError::DuplicateEscrow(uid));
        }
        Ok(())
    }

    /// The escrow a fulfillment settles, if known.
    pub fn resolve(&self, fulfillment: &Attestation) -> Option<&(Attestation, D)> {
        fulfillment
            .reference()
            .and_then(|escrow| self.escrows.get(&escrow))
    }

    /// Hold a fulfillment until its escrow is indexed.
    ///
    /// Returns false when the fulfillment can never match: it references no
    /// escrow, or one whose demand could not be decoded.
    pub fn park(&mut self, fulfillment: LoggedAttestation) -> bool {
        match fulfillment.attestation.reference() {
            Some(escrow) if !self.undecodable.contains(&escrow) => {
                debug!(
                    uid = %fulfillment.uid(),
                    escrow = %escrow,
                    "Parking fulfillment until its escrow is seen"
                );
                self.parked.entry(escrow).or_default().push(fulfillment);
                true
            }
            _ => false,
        }
    }

    /// Release every parked fulfillment, in log order.
    pub fn drain_parked(&mut self) -> Vec<LoggedAttestation> {
        let mut parked: Vec<LoggedAttestation> =
            self.parked.drain(..).flat_map(|(_, waiting)| waiting).collect();
        parked.sort_by_key(|l| l.position);
        parked
    }

    /// Number of parked fulfillments.
    pub fn parked_len(&self) -> usize {
        self.parked.values().map(Vec::len).sum()
    }

    pub fn len(&self) -> usize {
        self.escrows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.escrows.is_empty()
    }

    /// Split into the escrow attestations, their demands, and the uids of
    /// fulfillments still parked.
    pub fn finish(mut self) -> (Vec<Attestation>, Vec<D>, Vec<Uid>) {
        let unmatched = self.drain_parked().iter().map(LoggedAttestation::uid).collect();
        let (attestations, demands) = self.escrows.into_values().unzip();
        (attestations, demands, unmatched)
    }
}

/// Direct-mode escrow lookup, cached per run.
///
/// The escrow's data is read as a trusted-oracle demand. Escrows that are
/// missing or carry some other payload designate no oracle.
#[derive(Debug, Default)]
pub struct DirectEscrows {
    oracles: HashMap<Uid, Option<Address>>,
}

impl DirectEscrows {
    pub fn new() -> Self {
        Self::default()
    }

    /// The oracle designated by the escrow `fulfillment` references.
    pub async fn designated_oracle(
        &mut self,
        source: &dyn AttestationSource,
        fulfillment: &Attestation,
    ) -> Result<Option<Address>, TransportError> {
        let Some(escrow_uid) = fulfillment.reference() else {
            return Ok(None);
        };
        if let Some(oracle) = self.oracles.get(&escrow_uid) {
            return Ok(*oracle);
        }

        let oracle = match source.get_attestation(escrow_uid).await? {
            Some(escrow) => match TrustedOracleDemandCodec.decode(&escrow.data) {
                Ok(demand) => demand.oracle(),
                Err(err) => {
                    debug!(escrow = %escrow_uid, error = %err, "Escrow names no trusted oracle");
                    None
                }
            },
            None => {
                debug!(escrow = %escrow_uid, "Escrow not found");
                None
            }
        };
        self.oracles.insert(escrow_uid, oracle);
        Ok(oracle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oracle_test_helpers::fixtures::{self, BOB, CHARLIE};
    use oracle_test_helpers::InMemoryRegistry;

    #[test]
    fn test_resolve_and_duplicate() {
        let registry = InMemoryRegistry::new();
        let e1 = fixtures::escrow(&registry, BOB);
        let e2 = fixtures::escrow(&registry, CHARLIE);
        let f = fixtures::fulfillment(&registry, e2.uid(), "x");

        let mut index = EscrowIndex::new();
        index.insert(e1.attestation.clone(), "d1").unwrap();
        index.insert(e2.attestation.clone(), "d2").unwrap();

        let (escrow, demand) = index.resolve(&f.attestation).unwrap();
        assert_eq!(escrow.uid, e2.uid());
        assert_eq!(*demand, "d2");

        assert_eq!(
            index.insert(e1.attestation.clone(), "again"),
            Err(ArbitrationError::DuplicateEscrow(e1.uid()))
        );
    }

    #[test]
    fn test_parking() {
        let registry = InMemoryRegistry::new();
        let e1 = fixtures::escrow(&registry, BOB);
        let f1 = fixtures::fulfillment(&registry, e1.uid(), "early");
        let orphan = fixtures::fulfillment(&registry, Uid::repeat_byte(0x99), "orphan");

        let mut index = EscrowIndex::new();
        assert!(index.park(f1.clone()));
        assert!(index.park(orphan.clone()));
        assert_eq!(index.parked_len(), 2);

        let released = index.insert(e1.attestation.clone(), ()).unwrap();
        assert_eq!(released, vec![f1]);

        let (escrows, demands, unmatched) = index.finish();
        assert_eq!(escrows.len(), 1);
        assert_eq!(demands.len(), 1);
        assert_eq!(unmatched, vec![orphan.uid()]);
    }

    #[test]
    fn test_drain_parked_in_log_order() {
        let registry = InMemoryRegistry::new();
        let later = fixtures::escrow(&registry, BOB);
        let first = fixtures::fulfillment(&registry, Uid::repeat_byte(0x99), "a");
        let second = fixtures::fulfillment(&registry, later.uid(), "b");
        let third = fixtures::fulfillment(&registry, Uid::repeat_byte(0x99), "c");

        let mut index: EscrowIndex<()> = EscrowIndex::new();
        for f in [&first, &second, &third] {
            index.park(f.clone());
        }

        assert_eq!(index.drain_parked(), vec![first, second, third]);
        assert_eq!(index.parked_len(), 0);
        assert!(index.insert(later.attestation, ()).unwrap().is_empty());
    }

    #[test]
    fn test_undecodable_escrow_never_matches() {
        let registry = InMemoryRegistry::new();
        let e1 = fixtures::escrow(&registry, BOB);
        let f1 = fixtures::fulfillment(&registry, e1.uid(), "x");

        let mut index: EscrowIndex<()> = EscrowIndex::new();
        index.insert_undecodable(e1.uid()).unwrap();
        assert!(!index.park(f1));
        assert!(index.is_empty());
    }

    #[tokio::test]
    async fn test_direct_lookup_is_cached() {
        let registry = InMemoryRegistry::new();
        let escrow = fixtures::escrow(&registry, BOB);
        let f = fixtures::fulfillment(&registry, escrow.uid(), "x");

        let mut escrows = DirectEscrows::new();
        assert_eq!(
            escrows.designated_oracle(&registry, &f.attestation).await,
            Ok(Some(BOB))
        );

        // Served from cache even when the registry is down
        registry.set_fail_queries(true);
        assert_eq!(
            escrows.designated_oracle(&registry, &f.attestation).await,
            Ok(Some(BOB))
        );
    }

    #[tokio::test]
    async fn test_direct_lookup_without_escrow() {
        let registry = InMemoryRegistry::new();
        let f = fixtures::fulfillment(&registry, Uid::ZERO, "x");

        let mut escrows = DirectEscrows::new();
        assert_eq!(
            escrows.designated_oracle(&registry, &f.attestation).await,
            Ok(None)
        );
    }
}
