//! Test helpers for the escrow oracle.
//!
//! - [`InMemoryRegistry`] - an [`AttestationSource`](oracle_core::AttestationSource)
//!   that mines one block per attestation and broadcasts new attestations to
//!   live subscribers
//! - [`RecordingArbiter`] - an [`OracleArbiter`](oracle_core::OracleArbiter)
//!   that records submissions and can be told to fail
//! - [`fixtures`] - parties, schemas and helpers that create escrows and
//!   fulfillments

pub mod fixtures;
mod registry;
mod settlement;

pub use registry::{AttestationRequest, InMemoryRegistry};
pub use settlement::RecordingArbiter;
