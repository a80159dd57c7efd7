//! Domain-specific identifier types.

use std::fmt;

/// Attestation identifier (32 bytes, globally unique in the registry).
///
/// Also used for schema identifiers. The zero value means "no reference".
pub type Uid = alloy::primitives::B256;

/// Settlement transaction hash. Displays as `0x` followed by 64 hex digits.
pub type TxHash = alloy::primitives::TxHash;

/// Position of an attestation's log in the chain.
///
/// Orders by block number first, then log index within the block. This is
/// the order in which decisions are produced and delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct LogPosition {
    /// Block the attestation was created in.
    pub block_number: u64,
    /// Index of the log within the block.
    pub log_index: u64,
}

impl LogPosition {
    /// Create a new position.
    pub const fn new(block_number: u64, log_index: u64) -> Self {
        Self {
            block_number,
            log_index,
        }
    }
}

impl fmt::Display for LogPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Log({}:{})", self.block_number, self.log_index)
    }
}

/// Local identifier of a background listener.
///
/// Only meaningful within the process that created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

impl SubscriptionId {
    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_position_ordering() {
        let a = LogPosition::new(5, 9);
        let b = LogPosition::new(6, 0);
        let c = LogPosition::new(6, 1);
        assert!(a < b);
        assert!(b < c);

        let mut positions = vec![c, a, b];
        positions.sort();
        assert_eq!(positions, vec![a, b, c]);
    }

    #[test]
    fn test_tx_hash_display() {
        let hash = TxHash::new([0xab; 32]);
        let shown = hash.to_string();
        assert_eq!(shown.len(), 66);
        assert!(shown.starts_with("0x"));
        assert!(shown[2..].chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(shown.parse::<TxHash>().unwrap(), hash);
    }
}
