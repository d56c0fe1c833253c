pub mod adapter;

use chrono::Utc;
use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::driver::{Driver, LedgerEntry};
use crate::models::reservation::Reservation;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ChangeType {
    Added,
    Modified,
    Removed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub change_type: ChangeType,
    pub reservation: Reservation,
}

pub struct ReservationStore {
    reservations: DashMap<Uuid, Reservation>,
    drivers: DashMap<Uuid, Driver>,
    change_tx: broadcast::Sender<ChangeEvent>,
}

impl ReservationStore {
    pub fn new(event_buffer_size: usize) -> Self {
        let (change_tx, _unused_rx) = broadcast::channel(event_buffer_size);

        Self {
            reservations: DashMap::new(),
            drivers: DashMap::new(),
            change_tx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.change_tx.subscribe()
    }

    pub fn insert_reservation(&self, reservation: Reservation) {
        self.reservations
            .insert(reservation.id, reservation.clone());
        self.publish(ChangeType::Added, reservation);
    }

    pub fn get_reservation(&self, id: Uuid) -> Result<Reservation, AppError> {
        self.reservations
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AppError::NotFound(format!("reservation {} not found", id)))
    }

    pub fn list_reservations(&self) -> Vec<Reservation> {
        self.reservations
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    // The closure works on a copy; nothing is stored or published unless it
    // returns Ok, so a rejected update leaves the document untouched.
    pub fn update_reservation<F>(&self, id: Uuid, apply: F) -> Result<Reservation, AppError>
    where
        F: FnOnce(&mut Reservation) -> Result<(), AppError>,
    {
        let updated = {
            let mut entry = self
                .reservations
                .get_mut(&id)
                .ok_or_else(|| AppError::NotFound(format!("reservation {} not found", id)))?;

            let mut draft = entry.clone();
            apply(&mut draft)?;
            draft.updated_at = Utc::now();
            *entry = draft;
            entry.clone()
        };

        self.publish(ChangeType::Modified, updated.clone());
        Ok(updated)
    }

    pub fn remove_reservation(&self, id: Uuid) -> Result<Reservation, AppError> {
        let (_, removed) = self
            .reservations
            .remove(&id)
            .ok_or_else(|| AppError::NotFound(format!("reservation {} not found", id)))?;

        self.publish(ChangeType::Removed, removed.clone());
        Ok(removed)
    }

    pub fn insert_driver(&self, driver: Driver) {
        self.drivers.insert(driver.id, driver);
    }

    pub fn get_driver(&self, id: Uuid) -> Result<Driver, AppError> {
        self.drivers
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AppError::NotFound(format!("driver {} not found", id)))
    }

    pub fn driver_exists(&self, id: Uuid) -> bool {
        self.drivers.contains_key(&id)
    }

    pub fn list_drivers(&self) -> Vec<Driver> {
        self.drivers
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn reservation_count(&self) -> usize {
        self.reservations.len()
    }

    pub fn driver_count(&self) -> usize {
        self.drivers.len()
    }

    // Conditional commit backing the ledger's optimistic concurrency: balance
    // and history move together under the entry lock, and only if the stored
    // balance still matches the snapshot the entry was computed from.
    pub fn commit_ledger_entry(
        &self,
        driver_id: Uuid,
        expected_balance: Decimal,
        entry: LedgerEntry,
    ) -> Result<bool, AppError> {
        let mut driver = self
            .drivers
            .get_mut(&driver_id)
            .ok_or_else(|| AppError::NotFound(format!("driver {} not found", driver_id)))?;

        if driver.balance != expected_balance {
            return Ok(false);
        }

        driver.balance = entry.balance_after;
        driver.transactions.push(entry);
        Ok(true)
    }

    fn publish(&self, change_type: ChangeType, reservation: Reservation) {
        let _ = self.change_tx.send(ChangeEvent {
            change_type,
            reservation,
        });
    }
}
