use std::collections::HashMap;
use tally_core::Money;

pub const KEY_DELIMITER: &str = "-";

/// Identity of a statement line before occurrence numbering. Missing amounts
/// render as `0`, the same as an explicit zero.
pub fn base_key(
    date: &str,
    description: &str,
    debit: Option<Money>,
    credit: Option<Money>,
    balance: Money,
) -> String {
    let render = |m: Option<Money>| m.map_or_else(|| "0".to_string(), Money::to_plain_string);
    [
        date.to_string(),
        description.trim().to_string(),
        render(debit),
        render(credit),
        balance.to_plain_string(),
    ]
    .join(KEY_DELIMITER)
}

/// Numbers repeated base keys within one import batch, so two identical
/// coffee purchases on the same day become `...-1` and `...-2`.
///
/// Build a fresh counter per batch. Keys are stable only while input order is.
#[derive(Debug, Default)]
pub struct KeyCounter {
    seen: HashMap<String, u32>,
}

impl KeyCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_key(&mut self, base: String) -> String {
        let count = self.seen.entry(base.clone()).or_insert(0);
        *count += 1;
        format!("{base}{KEY_DELIMITER}{count}")
    }
}
