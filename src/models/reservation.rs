use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ReservationStatus {
    Pending,
    Confirmed,
    Assigned,
    InProgress,
    Completed,
    Cancelled,
}

impl ReservationStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "confirmed" => Some(Self::Confirmed),
            "assigned" => Some(Self::Assigned),
            "started" | "in_progress" | "inprogress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "cancelled" | "canceled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PaymentMethod {
    Cash,
    Card,
    BankTransfer,
}

impl PaymentMethod {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "cash" => Some(Self::Cash),
            "card" => Some(Self::Card),
            "bank_transfer" | "banktransfer" => Some(Self::BankTransfer),
            _ => None,
        }
    }

    pub fn operator_collected(&self) -> bool {
        !matches!(self, Self::Cash)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DriverPaymentStatus {
    Pending,
    Paid,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ManualDriver {
    pub name: String,
    pub phone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum DriverAssignment {
    Unassigned,
    Driver(Uuid),
    Manual(ManualDriver),
}

impl DriverAssignment {
    pub fn driver_id(&self) -> Option<Uuid> {
        match self {
            Self::Driver(id) => Some(*id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Uuid,
    pub status: ReservationStatus,
    pub payment_method: PaymentMethod,
    pub total_price: Decimal,
    pub assigned_driver: DriverAssignment,
    pub driver_payment_status: Option<DriverPaymentStatus>,
    pub pickup: String,
    pub dropoff: String,
    pub pickup_date: Option<NaiveDate>,
    pub pickup_time: Option<NaiveTime>,
    pub passenger_name: String,
    pub passenger_phone: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub last_edited_at: Option<DateTime<Utc>>,
}

impl Reservation {
    pub fn scheduled_at(&self) -> Option<DateTime<Utc>> {
        let date = self.pickup_date?;
        let time = self.pickup_time?;
        Some(date.and_time(time).and_utc())
    }
}
