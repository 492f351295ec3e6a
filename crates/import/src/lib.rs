pub mod amount;
pub mod batch;
pub mod key;

pub use amount::{net_amount, parse_amount, parse_balance, AmountOverflow};
pub use batch::{normalize_batch, normalize_edit, FieldError, ImportError};
pub use key::{base_key, KeyCounter, KEY_DELIMITER};
