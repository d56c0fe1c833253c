use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum LedgerEntryKind {
    Payment,
    Debt,
    Settlement { reservation_id: Uuid },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub kind: LedgerEntryKind,
    pub amount: Decimal,
    pub note: String,
    pub date: DateTime<Utc>,
    pub balance_before: Decimal,
    pub balance_after: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Driver {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
    pub commission_rate: Decimal,
    pub balance: Decimal,
    pub transactions: Vec<LedgerEntry>,
}
