//! Caller-supplied decision and callback strategies.
//!
//! Plain closures implement these traits, so callers usually pass
//! `|obligation: &StringObligation| obligation.item == "good"` directly.
//! The engine treats every strategy as an opaque black box: it is called at
//! most once per fulfillment and never retried.

use crate::DecisionError;
use oracle_types::Decision;

/// Decides a fulfillment from its obligation alone (direct mode).
pub trait ObligationDecider<T>: Send + Sync {
    fn decide(&self, obligation: &T) -> Result<bool, DecisionError>;
}

impl<T, F> ObligationDecider<T> for F
where
    F: Fn(&T) -> bool + Send + Sync,
{
    fn decide(&self, obligation: &T) -> Result<bool, DecisionError> {
        Ok(self(obligation))
    }
}

/// Decides a fulfillment from its obligation and its escrow's demand.
pub trait EscrowDecider<T, D>: Send + Sync {
    fn decide(&self, obligation: &T, demand: &D) -> Result<bool, DecisionError>;
}

impl<T, D, F> EscrowDecider<T, D> for F
where
    F: Fn(&T, &D) -> bool + Send + Sync,
{
    fn decide(&self, obligation: &T, demand: &D) -> Result<bool, DecisionError> {
        Ok(self(obligation, demand))
    }
}

/// Adapter for predicates that can fail.
///
/// An `Err(reason)` becomes [`DecisionError::Failed`] for that fulfillment.
pub struct FallibleDecider<F>(pub F);

/// Wrap a fallible predicate.
pub fn fallible<F>(f: F) -> FallibleDecider<F> {
    FallibleDecider(f)
}

impl<T, F> ObligationDecider<T> for FallibleDecider<F>
where
    F: Fn(&T) -> Result<bool, String> + Send + Sync,
{
    fn decide(&self, obligation: &T) -> Result<bool, DecisionError> {
        (self.0)(obligation).map_err(DecisionError::Failed)
    }
}

/// Receives each decision of a listener as it is made.
///
/// Called inline on the listener task, before the next attestation is
/// processed. A slow callback delays the stream; a panicking one is isolated.
pub trait DecisionCallback<T, D = ()>: Send + Sync {
    fn on_decision(&self, decision: &Decision<T, D>);
}

impl<T, D, F> DecisionCallback<T, D> for F
where
    F: Fn(&Decision<T, D>) + Send + Sync,
{
    fn on_decision(&self, decision: &Decision<T, D>) {
        self(decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_deciders() {
        let direct = |x: &u32| *x > 3;
        assert_eq!(ObligationDecider::decide(&direct, &5), Ok(true));
        assert_eq!(ObligationDecider::decide(&direct, &1), Ok(false));

        let escrow = |x: &u32, limit: &u32| x <= limit;
        assert_eq!(EscrowDecider::decide(&escrow, &5, &10), Ok(true));
    }

    #[test]
    fn test_fallible_decider() {
        let decider = fallible(|x: &u32| {
            if *x == 0 {
                Err("zero".to_string())
            } else {
                Ok(true)
            }
        });
        assert_eq!(decider.decide(&1), Ok(true));
        assert_eq!(
            decider.decide(&0),
            Err(DecisionError::Failed("zero".into()))
        );
    }
}
