//! Transfer log entries and ownership scopes

use serde::{Deserialize, Serialize};

/// A token transfer as observed on chain, before it is stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferEntry {
    pub token_id: i64,
    pub from_address: String,
    pub to_address: String,
    pub block_number: i64,
    pub log_index: i32,
    pub tx_hash: String,
}

impl TransferEntry {
    /// Addresses are compared lower-cased everywhere
    pub fn normalized(mut self) -> Self {
        self.from_address = normalize_address(&self.from_address);
        self.to_address = normalize_address(&self.to_address);
        self.tx_hash = self.tx_hash.to_lowercase();
        self
    }
}

pub fn normalize_address(address: &str) -> String {
    address.trim().to_lowercase()
}

/// Which tokens an ownership recompute may touch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OwnershipScope {
    All,
    /// Only tokens whose latest transfer lands in this wallet
    Wallet(String),
}

impl OwnershipScope {
    pub fn wallet(address: &str) -> Self {
        OwnershipScope::Wallet(normalize_address(address))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalized_lowercases_addresses() {
        let entry = TransferEntry {
            token_id: 7,
            from_address: "0xABCdef".to_string(),
            to_address: " 0xFFee ".to_string(),
            block_number: 1,
            log_index: 0,
            tx_hash: "0xAA".to_string(),
        }
        .normalized();

        assert_eq!(entry.from_address, "0xabcdef");
        assert_eq!(entry.to_address, "0xffee");
        assert_eq!(entry.tx_hash, "0xaa");
        assert_eq!(
            OwnershipScope::wallet("0xAB"),
            OwnershipScope::Wallet("0xab".to_string())
        );
    }
}
