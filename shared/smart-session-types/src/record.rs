use alloy_primitives::B256;
use serde::{Deserialize, Serialize};

/// Outcome of one submitted operation, kept for the lifetime of the process.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub hash: B256,
    pub link: String,
    pub success: bool,
}

impl TransactionRecord {
    pub fn new(hash: B256, explorer: &str, success: bool) -> Self {
        let link = format!("{}/tx/{}", explorer.trim_end_matches('/'), hash);
        Self { hash, link, success }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_joins_explorer_and_hash() {
        let hash = B256::repeat_byte(0xab);
        let record = TransactionRecord::new(hash, "https://sepolia.etherscan.io/", true);
        assert_eq!(record.link, format!("https://sepolia.etherscan.io/tx/{hash}"));
    }
}
