use alloy_primitives::B256;

use smart_session_types::TransactionRecord;

pub const DEFAULT_EXPLORER: &str = "https://sepolia.etherscan.io";

/// Append-only, in-memory record of submitted operations.
#[derive(Clone, Debug)]
pub struct TransactionHistory {
    explorer: String,
    records: Vec<TransactionRecord>,
}

impl Default for TransactionHistory {
    fn default() -> Self {
        Self::new(DEFAULT_EXPLORER)
    }
}

impl TransactionHistory {
    pub fn new(explorer: impl Into<String>) -> Self {
        Self { explorer: explorer.into(), records: Vec::new() }
    }

    pub fn record(&mut self, hash: B256, success: bool) -> &TransactionRecord {
        self.records.push(TransactionRecord::new(hash, &self.explorer, success));
        &self.records[self.records.len() - 1]
    }

    pub fn records(&self) -> &[TransactionRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_in_order() {
        let mut history = TransactionHistory::default();
        history.record(B256::repeat_byte(1), true);
        let last = history.record(B256::repeat_byte(2), false).clone();
        assert_eq!(history.len(), 2);
        assert_eq!(history.records()[0].hash, B256::repeat_byte(1));
        assert!(!last.success);
        assert!(last.link.starts_with("https://sepolia.etherscan.io/tx/0x"));
    }
}
