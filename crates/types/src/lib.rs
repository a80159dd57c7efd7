//! Core types for the escrow oracle.
//!
//! This crate holds the data model shared by every other crate:
//!
//! - [`Attestation`] and [`LoggedAttestation`] - records read from the registry
//! - [`AttestationFilter`] - wildcard query over registry attestations
//! - [`ArbitrateOptions`] - per-run behaviour switches
//! - [`Decision`], [`ArbitrationResult`], [`EscrowArbitrationResult`] - run output
//!
//! Attestation identifiers and addresses are the alloy primitives re-exported
//! here as [`Uid`] and [`Address`].

mod attestation;
mod decision;
mod filter;
mod identifiers;
mod options;

pub use alloy::primitives::{Address, Bytes};
pub use attestation::{Attestation, LoggedAttestation};
pub use decision::{
    ArbitrationResult, Decision, EscrowArbitrationResult, EvaluationFailure, FailureStage,
    Termination,
};
pub use filter::AttestationFilter;
pub use identifiers::{LogPosition, SubscriptionId, TxHash, Uid};
pub use options::ArbitrateOptions;
