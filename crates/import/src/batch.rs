use tally_core::{
    Money, NormalizedTransaction, OwnerId, RawAmount, RawTransaction, TransactionEdit,
    TransactionUpdate,
};
use thiserror::Error;

use crate::amount::{net_amount, parse_amount, parse_balance, AmountOverflow};
use crate::key::{base_key, KeyCounter};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FieldError {
    #[error("missing balance")]
    MissingBalance,
    #[error("invalid balance: {0:?}")]
    InvalidBalance(String),
    #[error("amount out of range: {0}")]
    OutOfRange(String),
}

impl From<AmountOverflow> for FieldError {
    fn from(e: AmountOverflow) -> Self {
        FieldError::OutOfRange(e.0)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ImportError {
    #[error("transaction {index}: {source}")]
    Record {
        index: usize,
        #[source]
        source: FieldError,
    },
    #[error(transparent)]
    Field(#[from] FieldError),
}

struct Amounts {
    debit: Option<Money>,
    credit: Option<Money>,
    amount: Money,
    balance: Money,
}

fn normalize_amounts(
    debit: Option<&RawAmount>,
    credit: Option<&RawAmount>,
    balance: Option<&RawAmount>,
) -> Result<Amounts, FieldError> {
    let raw_balance = balance.ok_or(FieldError::MissingBalance)?.as_text();
    let balance = parse_balance(&raw_balance)?
        .ok_or_else(|| FieldError::InvalidBalance(raw_balance.to_string()))?;

    let debit = match debit {
        Some(d) => parse_amount(&d.as_text())?,
        None => None,
    };
    let credit = match credit {
        Some(c) => parse_amount(&c.as_text())?,
        None => None,
    };
    // Two non-zero sides are accepted and credit wins. Statements should never
    // produce this, so it is likely an input-validation gap upstream.
    if debit.is_some_and(|d| !d.is_zero()) && credit.is_some_and(|c| !c.is_zero()) {
        tracing::debug!("transaction has both debit and credit, using credit");
    }

    for m in [debit, credit, Some(balance)].into_iter().flatten() {
        if m.to_cents().is_none() {
            return Err(FieldError::OutOfRange(m.to_plain_string()));
        }
    }

    Ok(Amounts {
        debit,
        credit,
        amount: net_amount(debit, credit),
        balance,
    })
}

/// Normalize one import batch for `owner`, in input order.
///
/// All-or-nothing: the first malformed record fails the batch and nothing
/// is returned for the records before it.
pub fn normalize_batch(
    owner: &OwnerId,
    records: &[RawTransaction],
) -> Result<Vec<NormalizedTransaction>, ImportError> {
    let mut counter = KeyCounter::new();

    records
        .iter()
        .enumerate()
        .map(|(index, raw)| {
            let amounts =
                normalize_amounts(raw.debit.as_ref(), raw.credit.as_ref(), raw.balance.as_ref())
                    .map_err(|source| ImportError::Record { index, source })?;

            let base = base_key(
                &raw.date,
                &raw.description,
                amounts.debit,
                amounts.credit,
                amounts.balance,
            );

            Ok(NormalizedTransaction {
                owner_id: owner.clone(),
                date: raw.date.clone(),
                description: raw.description.clone(),
                debit: amounts.debit,
                credit: amounts.credit,
                amount: amounts.amount,
                balance: amounts.balance,
                transaction_hash: counter.next_key(base),
            })
        })
        .collect()
}

/// Apply the import rules to an edit. The stored idempotency key is left alone.
pub fn normalize_edit(edit: &TransactionEdit) -> Result<TransactionUpdate, ImportError> {
    let amounts = normalize_amounts(
        edit.debit.as_ref(),
        edit.credit.as_ref(),
        edit.balance.as_ref(),
    )?;

    Ok(TransactionUpdate {
        date: edit.date.clone(),
        description: edit.description.clone(),
        category: edit
            .category
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string),
        debit: amounts.debit,
        credit: amounts.credit,
        amount: amounts.amount,
        balance: amounts.balance,
    })
}
