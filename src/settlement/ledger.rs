use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::driver::{LedgerEntry, LedgerEntryKind};
use crate::settlement::commission::{Settlement, SettlementDirection};
use crate::state::AppState;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ManualKind {
    Payment,
    Debt,
}

impl ManualKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Payment => "payment",
            Self::Debt => "debt",
        }
    }
}

pub fn record_manual(
    state: &AppState,
    driver_id: Uuid,
    kind: ManualKind,
    amount: Decimal,
    note: &str,
) -> Result<LedgerEntry, AppError> {
    if amount <= Decimal::ZERO {
        return Err(AppError::Validation(
            "transaction amount must be positive".to_string(),
        ));
    }

    let note = note.trim();
    if note.is_empty() {
        return Err(AppError::Validation(
            "transaction note must not be empty".to_string(),
        ));
    }

    let entry = commit_with_retry(state, driver_id, |balance_before| {
        let (entry_kind, balance_after) = match kind {
            ManualKind::Payment => (LedgerEntryKind::Payment, balance_before + amount),
            ManualKind::Debt => (LedgerEntryKind::Debt, balance_before - amount),
        };

        LedgerEntry {
            id: Uuid::new_v4(),
            kind: entry_kind,
            amount,
            note: note.to_string(),
            date: Utc::now(),
            balance_before,
            balance_after,
        }
    })?;

    state
        .metrics
        .manual_transactions_total
        .with_label_values(&[kind.as_str()])
        .inc();

    info!(
        driver_id = %driver_id,
        kind = kind.as_str(),
        amount = %amount,
        balance = %entry.balance_after,
        "manual transaction recorded"
    );

    Ok(entry)
}

pub fn apply_settlement(
    state: &AppState,
    driver_id: Uuid,
    reservation_id: Uuid,
    settlement: &Settlement,
) -> Result<Option<LedgerEntry>, AppError> {
    // Cash commission is collected in person, not through the ledger; only
    // operator-collected fares move the balance at settlement time.
    if settlement.direction == SettlementDirection::CommissionReceivable {
        debug!(
            reservation_id = %reservation_id,
            commission = %settlement.commission,
            "cash settlement; commission tracked as receivable, no ledger movement"
        );
        return Ok(None);
    }

    let amount = settlement.driver_earning;
    let entry = commit_with_retry(state, driver_id, |balance_before| LedgerEntry {
        id: Uuid::new_v4(),
        kind: LedgerEntryKind::Settlement { reservation_id },
        amount,
        note: format!("trip payout for reservation {reservation_id}"),
        date: Utc::now(),
        balance_before,
        balance_after: balance_before + amount,
    })?;

    info!(
        driver_id = %driver_id,
        reservation_id = %reservation_id,
        amount = %amount,
        balance = %entry.balance_after,
        "settlement credited"
    );

    Ok(Some(entry))
}

pub fn balance(state: &AppState, driver_id: Uuid) -> Result<Decimal, AppError> {
    Ok(state.store.get_driver(driver_id)?.balance)
}

pub fn history(state: &AppState, driver_id: Uuid) -> Result<Vec<LedgerEntry>, AppError> {
    let mut entries = state.store.get_driver(driver_id)?.transactions;
    entries.reverse();
    Ok(entries)
}

// Optimistic concurrency: snapshot the balance, build the entry from the
// snapshot, commit only if the stored balance is still the snapshot. A lost
// race gets a fresh snapshot and tries again, bounded by config.
fn commit_with_retry<F>(
    state: &AppState,
    driver_id: Uuid,
    build: F,
) -> Result<LedgerEntry, AppError>
where
    F: Fn(Decimal) -> LedgerEntry,
{
    for attempt in 0..=state.balance_retry_limit {
        let snapshot = state.store.get_driver(driver_id)?.balance;
        let entry = build(snapshot);

        if state
            .store
            .commit_ledger_entry(driver_id, snapshot, entry.clone())?
        {
            state
                .metrics
                .driver_balance
                .with_label_values(&[&driver_id.to_string()])
                .set(entry.balance_after.to_f64().unwrap_or(0.0));
            return Ok(entry);
        }

        debug!(driver_id = %driver_id, attempt, "balance changed concurrently; retrying");
    }

    Err(AppError::Conflict(format!(
        "concurrent balance updates for driver {driver_id} exhausted retries"
    )))
}
