pub mod money;
pub mod transaction;

pub use money::Money;
pub use transaction::{
    CategorySummary, NormalizedTransaction, OwnerId, RawAmount, RawTransaction, SpendingSummary,
    StoredTransaction, TransactionEdit, TransactionUpdate,
};
