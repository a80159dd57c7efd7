//! Arbitration run options.

use serde::Deserialize;

/// Switches controlling which fulfillments reach the decision predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct ArbitrateOptions {
    /// Skip fulfillments whose escrow demand names a different oracle.
    pub require_oracle: bool,

    /// Skip fulfillments this oracle has already arbitrated, without calling
    /// the predicate.
    pub skip_arbitrated: bool,

    /// Skip fulfillments nobody has requested arbitration for.
    pub require_request: bool,

    /// Listeners only: ignore history and evaluate only attestations produced
    /// after the listener starts.
    pub only_new: bool,
}

impl ArbitrateOptions {
    /// Options with every switch off.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_require_oracle(mut self, require_oracle: bool) -> Self {
        self.require_oracle = require_oracle;
        self
    }

    pub fn with_skip_arbitrated(mut self, skip_arbitrated: bool) -> Self {
        self.skip_arbitrated = skip_arbitrated;
        self
    }

    pub fn with_require_request(mut self, require_request: bool) -> Self {
        self.require_request = require_request;
        self
    }

    pub fn with_only_new(mut self, only_new: bool) -> Self {
        self.only_new = only_new;
        self
    }
}
