//! Change Selection
//!
//! Greedy denomination matching over a wallet's transaction records. Each
//! distinct record amount acts as a denomination; records are walked in
//! `version` order and every record is taken as many times as it fits into
//! the running remainder.
//!
//! The pass never backtracks, so it can miss an exact combination that a
//! subset-sum search would find. Callers depend on the selection being
//! stable, so that behaviour is kept as is.
//! TODO: offer an exact subset-sum selector behind a separate entry point.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use tracing::trace;

use super::types::{TransactionChange, TransactionRecord};

/// Most units one record may contribute to a single selection
pub const MAX_UNITS_PER_RECORD: u32 = 1024;

/// Select records covering `amount`
///
/// Empty input, a zero amount or all-zero denominations yield an empty
/// selection with `residual = amount`. A denomination whose unit count does
/// not fit a `Decimal` is skipped, and no record contributes more than
/// [`MAX_UNITS_PER_RECORD`] units.
pub fn calculate_change(amount: Decimal, records: &[TransactionRecord]) -> TransactionChange {
    let mut coins: Vec<&TransactionRecord> = records.iter().collect();
    coins.sort_by_key(|c| c.version);

    let mut remainder = amount;
    let mut transactions = Vec::new();

    for coin in &coins {
        let denom = coin.amount.abs();
        if denom.is_zero() {
            continue;
        }

        let Some(units) = remainder.checked_div(denom).map(|q| q.trunc()) else {
            trace!(amount = %coin.amount, "Denomination out of range");
            continue;
        };
        if units <= Decimal::ZERO {
            continue;
        }

        let taken = units.min(Decimal::from(MAX_UNITS_PER_RECORD));
        let Some(spent) = denom.checked_mul(taken) else {
            continue;
        };
        let count = taken.to_usize().unwrap_or(0);
        trace!(amount = %coin.amount, count, "Denomination matched");
        transactions.extend(std::iter::repeat_n((*coin).clone(), count));
        remainder -= spent;
    }

    let residual = remainder;

    TransactionChange {
        transactions,
        closest: closest_record(&coins, residual).cloned(),
        residual,
    }
}

/// Same selection restricted to records carrying `stamp`
pub fn calculate_change_for_stamp(
    amount: Decimal,
    stamp: &str,
    records: &[TransactionRecord],
) -> TransactionChange {
    let scoped: Vec<TransactionRecord> = records
        .iter()
        .filter(|r| r.stamp == stamp)
        .cloned()
        .collect();
    calculate_change(amount, &scoped)
}

/// Pick whole coins to spend for `amount`
///
/// Only positive records count as coins and each is taken at most once.
/// The walk is the same version-ordered greedy pass as [`calculate_change`].
/// When it leaves a remainder, the smallest untaken coin covering it is added
/// and becomes `closest`; the overshoot shows up as a negative `residual`,
/// the change owed back to the wallet. A positive `residual` means the coins
/// cannot cover `amount`.
pub fn select_coins(amount: Decimal, coins: &[TransactionRecord]) -> TransactionChange {
    let mut coins: Vec<&TransactionRecord> =
        coins.iter().filter(|c| c.amount > Decimal::ZERO).collect();
    coins.sort_by_key(|c| c.version);

    let mut remainder = amount;
    let mut taken = vec![false; coins.len()];
    for (i, coin) in coins.iter().enumerate() {
        if remainder <= Decimal::ZERO {
            break;
        }
        if coin.amount <= remainder {
            taken[i] = true;
            remainder -= coin.amount;
        }
    }

    let mut closest = None;
    if remainder > Decimal::ZERO {
        let cover = coins
            .iter()
            .enumerate()
            .filter(|(i, c)| !taken[*i] && c.amount >= remainder)
            .min_by_key(|(_, c)| c.amount)
            .map(|(i, _)| i);
        if let Some(i) = cover {
            taken[i] = true;
            remainder -= coins[i].amount;
            closest = Some(coins[i].clone());
        }
    }

    let transactions = coins
        .iter()
        .zip(&taken)
        .filter(|(_, t)| **t)
        .map(|(c, _)| (*c).clone())
        .collect();

    TransactionChange {
        transactions,
        closest,
        residual: remainder,
    }
}

/// First record whose absolute amount is nearest to `target`; ties keep the
/// earlier denomination
fn closest_record<'a>(
    coins: &[&'a TransactionRecord],
    target: Decimal,
) -> Option<&'a TransactionRecord> {
    let mut best: Option<(&'a TransactionRecord, Decimal)> = None;

    for coin in coins {
        let Some(distance) = coin.amount.abs().checked_sub(target).map(|d| d.abs()) else {
            continue;
        };
        match best {
            Some((_, b)) if distance >= b => {}
            _ => best = Some((*coin, distance)),
        }
    }

    best.map(|(coin, _)| coin)
}
