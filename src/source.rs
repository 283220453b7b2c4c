//! Transaction sources: where the query service fetches records from.

use crate::query::DateBounds;
use crate::transaction::{Transaction, TransactionRecord, load_transactions};
use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

/// Fetch collaborator.
///
/// Implementations must return at least every record inside `bounds`;
/// returning more is allowed since the query is re-checked afterwards.
pub trait TransactionSource {
    fn fetch(&self, bounds: &DateBounds) -> Result<Vec<Transaction>>;
}

/// Reads a JSON file holding a response page or a bare array
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TransactionSource for JsonFileSource {
    fn fetch(&self, bounds: &DateBounds) -> Result<Vec<Transaction>> {
        let bytes = fs::read(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        let mut transactions = load_transactions(&bytes)
            .with_context(|| format!("Invalid transactions file {}", self.path.display()))?;

        let total = transactions.len();
        transactions.retain(|t| bounds.contains(t.created_at()));
        log::debug!(
            "loaded {} transactions from {}, {} inside date bounds",
            total,
            self.path.display(),
            transactions.len()
        );

        Ok(transactions)
    }
}

/// In-memory source, for embedding and tests
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    transactions: Vec<Transaction>,
}

impl MemorySource {
    pub fn new(transactions: Vec<Transaction>) -> Self {
        Self { transactions }
    }
}

impl TransactionSource for MemorySource {
    fn fetch(&self, bounds: &DateBounds) -> Result<Vec<Transaction>> {
        Ok(self
            .transactions
            .iter()
            .filter(|t| bounds.contains(t.created_at()))
            .cloned()
            .collect())
    }
}
