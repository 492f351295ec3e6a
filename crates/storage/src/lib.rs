pub mod db;

pub use db::{
    create_db, create_db_in_memory, delete_transaction, get_spending_summary,
    get_transaction_by_id, get_transactions, update_transaction, upsert_transactions, DbPool,
    StorageError, UNCATEGORIZED,
};
