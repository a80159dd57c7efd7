//! Collaborator seams for the escrow oracle.
//!
//! The engine talks to the outside world only through the traits in this
//! crate:
//!
//! - [`AttestationSource`] - historical queries and live subscriptions over
//!   the attestation registry
//! - [`OracleArbiter`] - on-chain submission of arbitration attestations
//! - [`ArbitratedStore`] - the set of fulfillments already arbitrated
//! - [`ObligationDecider`], [`EscrowDecider`], [`DecisionCallback`] - caller
//!   supplied business logic
//!
//! Errors follow the same split: transport and configuration errors are
//! fatal to one-shot runs, decision and submission errors are isolated to the
//! attestation that caused them.

mod error;
mod store;
mod strategy;
mod traits;

pub use error::{
    ArbitrationError, ConfigurationError, DecisionError, SubmissionError, TransportError,
};
pub use store::InMemoryArbitratedStore;
pub use strategy::{fallible, DecisionCallback, EscrowDecider, FallibleDecider, ObligationDecider};
pub use traits::{ArbitratedStore, AttestationSource, AttestationStream, OracleArbiter};
