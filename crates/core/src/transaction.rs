use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::money::Money;

/// The authenticated identity that owns a set of transactions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(pub String);

impl OwnerId {
    pub fn new(id: impl Into<String>) -> Self {
        OwnerId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An amount exactly as the client sent it. Statement parsers emit strings,
/// the edit form emits numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawAmount {
    Text(String),
    Number(serde_json::Number),
}

impl RawAmount {
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            RawAmount::Text(s) => Cow::Borrowed(s.as_str()),
            RawAmount::Number(n) => Cow::Owned(n.to_string()),
        }
    }
}

impl From<&str> for RawAmount {
    fn from(s: &str) -> Self {
        RawAmount::Text(s.to_string())
    }
}

/// One statement line as submitted for import.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawTransaction {
    pub date: String,
    pub description: String,
    #[serde(default)]
    pub debit: Option<RawAmount>,
    #[serde(default)]
    pub credit: Option<RawAmount>,
    #[serde(default)]
    pub balance: Option<RawAmount>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedTransaction {
    pub owner_id: OwnerId,
    pub date: String,
    pub description: String,
    pub debit: Option<Money>,
    pub credit: Option<Money>,
    pub amount: Money,
    pub balance: Money,
    /// Unique per owner; the dedup constraint in storage.
    pub transaction_hash: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredTransaction {
    pub id: i64,
    pub owner_id: OwnerId,
    pub date: String,
    pub description: String,
    pub category: Option<String>,
    pub debit: Option<Money>,
    pub credit: Option<Money>,
    pub amount: Money,
    pub balance: Money,
    pub transaction_hash: String,
    pub created_at: String,
}

/// Full replacement of one transaction's editable fields, as submitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionEdit {
    pub id: i64,
    pub date: String,
    pub description: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub debit: Option<RawAmount>,
    #[serde(default)]
    pub credit: Option<RawAmount>,
    #[serde(default)]
    pub balance: Option<RawAmount>,
}

/// A validated edit, ready to be written over an existing row.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionUpdate {
    pub date: String,
    pub description: String,
    pub category: Option<String>,
    pub debit: Option<Money>,
    pub credit: Option<Money>,
    pub amount: Money,
    pub balance: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySummary {
    pub category: String,
    pub spent: Money,
    pub received: Money,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpendingSummary {
    pub total_spent: Money,
    pub total_received: Money,
    pub net_cash_flow: Money,
    pub transaction_count: i64,
    pub category_summary: Vec<CategorySummary>,
}
