//! Obligation and demand codecs.
//!
//! An attestation's `data` field is opaque bytes; its meaning is fixed by the
//! attestation's schema. An [`ObligationSchema`] turns those bytes into a
//! typed value and back. All codecs here are Solidity ABI codecs built with
//! alloy's `sol!` types, so they agree byte-for-byte with what the escrow and
//! obligation contracts write on-chain.
//!
//! # Codecs
//!
//! - [`AbiCodec`] - any `SolValue` type
//! - [`StringObligationCodec`] - free-form string obligations
//! - [`JsonObligationCodec`] - string obligations carrying serde JSON
//! - [`TrustedOracleDemandCodec`] - escrow demands naming an oracle
//! - [`Erc20PaymentObligationCodec`] - structured payment claims
//! - [`EscrowDemandCodec`] - nested demand inside an ERC20 escrow obligation
//!
//! Decoding never panics: malformed input yields [`DecodeError`].

mod abi;
mod error;
mod escrow;
mod json;
mod payment;
mod schema;
mod string_obligation;
mod trusted_oracle;

pub use abi::AbiCodec;
pub use error::DecodeError;
pub use escrow::{Erc20EscrowObligation, Erc20EscrowObligationCodec, EscrowDemandCodec};
pub use json::JsonObligationCodec;
pub use payment::{Erc20PaymentObligation, Erc20PaymentObligationCodec};
pub use schema::{DemandOracle, ObligationSchema};
pub use string_obligation::{StringObligation, StringObligationCodec};
pub use trusted_oracle::{create_trusted_oracle_demand, TrustedOracleDemand, TrustedOracleDemandCodec};
