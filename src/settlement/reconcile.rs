use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::driver::Driver;
use crate::models::reservation::{
    DriverPaymentStatus, PaymentMethod, Reservation, ReservationStatus,
};
use crate::settlement::commission;
use crate::state::AppState;

#[derive(Debug, Clone, Serialize)]
pub struct DriverFinancialSummary {
    pub driver_id: Uuid,
    pub trip_count: usize,
    pub total_earnings: Decimal,
    pub total_commission: Decimal,
    pub cash_to_collect: Decimal,
    pub cash_commission_owed: Decimal,
    pub card_earnings: Decimal,
    pub pending_settlement: Decimal,
    pub current_balance: Decimal,
}

impl DriverFinancialSummary {
    fn empty(driver_id: Uuid) -> Self {
        Self {
            driver_id,
            trip_count: 0,
            total_earnings: Decimal::ZERO,
            total_commission: Decimal::ZERO,
            cash_to_collect: Decimal::ZERO,
            cash_commission_owed: Decimal::ZERO,
            card_earnings: Decimal::ZERO,
            pending_settlement: Decimal::ZERO,
            current_balance: Decimal::ZERO,
        }
    }

    fn accumulate(&mut self, reservation: &Reservation, commission_rate: Decimal) {
        let settlement = commission::compute(
            reservation.total_price,
            Some(commission_rate),
            reservation.payment_method,
        );

        self.trip_count += 1;
        self.total_earnings += settlement.driver_earning;
        self.total_commission += settlement.commission;

        match reservation.payment_method {
            PaymentMethod::Cash => {
                self.cash_to_collect += reservation.total_price;
                self.cash_commission_owed += settlement.commission;
            }
            PaymentMethod::Card | PaymentMethod::BankTransfer => {
                self.card_earnings += settlement.driver_earning;
                if reservation.driver_payment_status == Some(DriverPaymentStatus::Pending) {
                    self.pending_settlement += settlement.driver_earning;
                }
            }
        }
    }
}

pub fn summarize(state: &AppState, driver_id: Uuid) -> Result<DriverFinancialSummary, AppError> {
    let driver = state.store.get_driver(driver_id)?;
    Ok(summarize_driver(state, &driver))
}

pub fn summarize_all(state: &AppState) -> Vec<DriverFinancialSummary> {
    let mut by_driver: HashMap<Uuid, Vec<Reservation>> = HashMap::new();
    for reservation in completed_reservations(state) {
        if let Some(driver_id) = reservation.assigned_driver.driver_id() {
            by_driver.entry(driver_id).or_default().push(reservation);
        }
    }

    let mut summaries = Vec::with_capacity(by_driver.len());
    for (driver_id, reservations) in by_driver {
        let driver = match state.store.get_driver(driver_id) {
            Ok(driver) => driver,
            Err(_) => {
                // Reservations pointing at a deleted driver stay out of the
                // report rather than failing the whole pass.
                warn!(
                    driver_id = %driver_id,
                    reservations = reservations.len(),
                    "skipping reservations for missing driver"
                );
                continue;
            }
        };

        let mut summary = DriverFinancialSummary::empty(driver_id);
        for reservation in &reservations {
            summary.accumulate(reservation, driver.commission_rate);
        }
        summary.current_balance = driver.balance;
        summaries.push(summary);
    }

    summaries
}

fn summarize_driver(state: &AppState, driver: &Driver) -> DriverFinancialSummary {
    let mut summary = DriverFinancialSummary::empty(driver.id);

    for reservation in completed_reservations(state) {
        if reservation.assigned_driver.driver_id() == Some(driver.id) {
            summary.accumulate(&reservation, driver.commission_rate);
        }
    }

    // The stored balance stays authoritative; the sums above are reporting
    // figures and are never written back.
    summary.current_balance = driver.balance;
    summary
}

fn completed_reservations(state: &AppState) -> impl Iterator<Item = Reservation> + '_ {
    state
        .store
        .list_reservations()
        .into_iter()
        .filter(|r| r.status == ReservationStatus::Completed)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    use super::{summarize, summarize_all};
    use crate::models::driver::Driver;
    use crate::models::reservation::{
        DriverAssignment, DriverPaymentStatus, PaymentMethod, Reservation, ReservationStatus,
    };
    use crate::state::AppState;

    fn driver(rate: rust_decimal::Decimal) -> Driver {
        Driver {
            id: Uuid::new_v4(),
            name: "Maria".to_string(),
            phone: "+3070".to_string(),
            commission_rate: rate,
            balance: dec!(0),
            transactions: Vec::new(),
        }
    }

    fn completed_trip(
        driver_id: Uuid,
        method: PaymentMethod,
        price: rust_decimal::Decimal,
        payment_status: DriverPaymentStatus,
    ) -> Reservation {
        let now = Utc::now();
        Reservation {
            id: Uuid::new_v4(),
            status: ReservationStatus::Completed,
            payment_method: method,
            total_price: price,
            assigned_driver: DriverAssignment::Driver(driver_id),
            driver_payment_status: Some(payment_status),
            pickup: "Airport".to_string(),
            dropoff: "Town".to_string(),
            pickup_date: None,
            pickup_time: None,
            passenger_name: "P".to_string(),
            passenger_phone: "+1".to_string(),
            created_at: now,
            updated_at: now,
            completed_at: Some(now),
            cancelled_at: None,
            last_edited_at: None,
        }
    }

    #[test]
    fn mixed_methods_accumulate_into_expected_buckets() {
        let (state, _rx) = AppState::new(16, 10, 3);
        let driver = driver(dec!(15));
        let driver_id = driver.id;
        state.store.insert_driver(driver);

        state.store.insert_reservation(completed_trip(
            driver_id,
            PaymentMethod::Cash,
            dec!(100),
            DriverPaymentStatus::Pending,
        ));
        state.store.insert_reservation(completed_trip(
            driver_id,
            PaymentMethod::Card,
            dec!(200),
            DriverPaymentStatus::Pending,
        ));

        let summary = summarize(&state, driver_id).unwrap();

        assert_eq!(summary.trip_count, 2);
        assert_eq!(summary.total_commission, dec!(45));
        assert_eq!(summary.total_earnings, dec!(255));
        assert_eq!(summary.cash_to_collect, dec!(100));
        assert_eq!(summary.cash_commission_owed, dec!(15));
        assert_eq!(summary.card_earnings, dec!(170));
        assert_eq!(summary.pending_settlement, dec!(170));
        assert_eq!(summary.current_balance, dec!(0));
    }

    #[test]
    fn paid_card_trips_leave_pending_settlement_empty() {
        let (state, _rx) = AppState::new(16, 10, 3);
        let driver = driver(dec!(15));
        let driver_id = driver.id;
        state.store.insert_driver(driver);

        state.store.insert_reservation(completed_trip(
            driver_id,
            PaymentMethod::BankTransfer,
            dec!(80),
            DriverPaymentStatus::Paid,
        ));

        let summary = summarize(&state, driver_id).unwrap();

        assert_eq!(summary.card_earnings, dec!(68));
        assert_eq!(summary.pending_settlement, dec!(0));
    }

    #[test]
    fn non_completed_reservations_are_ignored() {
        let (state, _rx) = AppState::new(16, 10, 3);
        let driver = driver(dec!(15));
        let driver_id = driver.id;
        state.store.insert_driver(driver);

        let mut open_trip = completed_trip(
            driver_id,
            PaymentMethod::Cash,
            dec!(50),
            DriverPaymentStatus::Pending,
        );
        open_trip.status = ReservationStatus::Assigned;
        open_trip.driver_payment_status = None;
        state.store.insert_reservation(open_trip);

        let summary = summarize(&state, driver_id).unwrap();
        assert_eq!(summary.trip_count, 0);
    }

    #[test]
    fn missing_driver_is_skipped_not_fatal() {
        let (state, _rx) = AppState::new(16, 10, 3);
        let driver = driver(dec!(15));
        let known_id = driver.id;
        state.store.insert_driver(driver);

        state.store.insert_reservation(completed_trip(
            known_id,
            PaymentMethod::Cash,
            dec!(100),
            DriverPaymentStatus::Pending,
        ));
        state.store.insert_reservation(completed_trip(
            Uuid::new_v4(),
            PaymentMethod::Card,
            dec!(300),
            DriverPaymentStatus::Pending,
        ));

        let summaries = summarize_all(&state);

        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].driver_id, known_id);
        assert_eq!(summaries[0].cash_commission_owed, dec!(15));
    }
}
