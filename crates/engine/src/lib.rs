//! Escrow arbitration engine.
//!
//! Reads fulfillment attestations from an [`AttestationSource`], decodes
//! them, asks a caller-supplied predicate whether each one satisfies its
//! escrow, and submits an arbitration for every approved fulfillment.
//!
//! ```text
//!   AttestationSource ──► feed ──► decode ──► match escrow ──► gates ──► predicate
//!    (history + live)                         (scan mode)                  │
//!                                                                  true    ▼
//!   ArbitrationResult ◄── collector ◄── callback (streaming) ◄── Arbiter::submit
//! ```
//!
//! # Modes
//!
//! - **Batch** ([`Oracle::arbitrate_past`]): scan a fixed block range once
//!   and return the aggregate result. Transport errors are fatal.
//! - **Streaming** ([`Oracle::listen_and_arbitrate`]): replay history, then
//!   follow the live subscription until timeout or cancellation. Every
//!   decision is also handed to a callback as it is made.
//!
//! Both come in a direct flavour, where the fulfillment filter pins the
//! escrow, and an escrow-scanning flavour that discovers escrows separately
//! and pairs fulfillments with them by `ref_uid`.
//!
//! # Fault isolation
//!
//! Malformed payloads, failing or panicking predicates, and failed
//! submissions affect only the attestation at hand. They are recorded in
//! the result and the run continues.
//!
//! [`AttestationSource`]: oracle_core::AttestationSource

mod arbiter;
mod config;
mod decision;
mod feed;
mod matcher;
mod params;
mod pipeline;
mod runner;

pub use arbiter::Arbiter;
pub use config::{CallbackErrorPolicy, OracleConfig, TransportErrorPolicy};
pub use decision::{DecisionEngine, SkipReason};
pub use matcher::{DirectEscrows, EscrowIndex};
pub use params::{EscrowParams, FulfillmentParams, FulfillmentParamsWithoutRefUid};
pub use runner::{ListenHandle, Oracle};
