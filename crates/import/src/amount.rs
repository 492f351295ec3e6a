use rust_decimal::Decimal;
use std::str::FromStr;
use tally_core::Money;
use thiserror::Error;

const CURRENCY_SYMBOLS: [char; 4] = ['$', '£', '€', '¥'];

/// The text is shaped like a number but is too large for a `Decimal`.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("amount out of range: {0}")]
pub struct AmountOverflow(pub String);

/// Parse a debit or credit column. Blank or non-numeric input is `Ok(None)`,
/// which is distinct from an explicit zero.
pub fn parse_amount(s: &str) -> Result<Option<Money>, AmountOverflow> {
    Ok(parse_decimal(s)?.map(|d| Money::from_decimal(d.abs())))
}

/// Parse a running balance such as `$1,200.00 CR`. The credit marker only
/// labels the balance; it does not change its sign.
pub fn parse_balance(s: &str) -> Result<Option<Money>, AmountOverflow> {
    Ok(parse_decimal(strip_credit_marker(s))?.map(Money::from_decimal))
}

/// A side drives the net amount only when it is non-zero; credit wins when
/// both are.
pub fn net_amount(debit: Option<Money>, credit: Option<Money>) -> Money {
    match (debit, credit) {
        (_, Some(c)) if !c.is_zero() => c,
        (Some(d), _) if !d.is_zero() => -d,
        _ => Money::zero(),
    }
}

fn strip_credit_marker(s: &str) -> &str {
    let s = s.trim_end();
    match s.len().checked_sub(2).and_then(|at| s.get(at..).map(|tail| (at, tail))) {
        Some((at, tail)) if tail.eq_ignore_ascii_case("cr") => &s[..at],
        _ => s,
    }
}

fn parse_decimal(s: &str) -> Result<Option<Decimal>, AmountOverflow> {
    let s = s.trim();
    let (negative, s) = if s.starts_with('(') && s.ends_with(')') && s.len() >= 2 {
        (true, &s[1..s.len() - 1])
    } else {
        (false, s)
    };
    let cleaned: String = s
        .chars()
        .filter(|c| !CURRENCY_SYMBOLS.contains(c) && *c != ',' && !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return Ok(None);
    }
    match Decimal::from_str(&cleaned).or_else(|_| Decimal::from_scientific(&cleaned)) {
        Ok(dec) => Ok(Some(if negative { -dec } else { dec })),
        Err(_) if looks_numeric(&cleaned) => Err(AmountOverflow(cleaned)),
        Err(_) => Ok(None),
    }
}

/// Optional sign, digits with at most one point, optional exponent.
fn looks_numeric(s: &str) -> bool {
    let is_sign = |c: char| c == '+' || c == '-';
    let s = s.strip_prefix(is_sign).unwrap_or(s);
    let (mantissa, exponent) = match s.split_once(|c: char| c == 'e' || c == 'E') {
        Some((m, e)) => (m, Some(e)),
        None => (s, None),
    };

    let digits = mantissa.chars().filter(char::is_ascii_digit).count();
    let points = mantissa.chars().filter(|&c| c == '.').count();
    let mantissa_ok = digits > 0 && points <= 1 && digits + points == mantissa.len();

    let exponent_ok = exponent.map_or(true, |e| {
        let e = e.strip_prefix(is_sign).unwrap_or(e);
        !e.is_empty() && e.chars().all(|c| c.is_ascii_digit())
    });

    mantissa_ok && exponent_ok
}
