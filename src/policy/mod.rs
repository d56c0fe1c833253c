use chrono::{DateTime, Duration, Utc};

use crate::models::reservation::{Reservation, ReservationStatus};

pub const MIN_HOURS_BEFORE_PICKUP: i64 = 12;

// Stateless by intent: "now" keeps moving, so callers re-evaluate on every
// check instead of caching the answer.
pub fn can_modify(reservation: &Reservation, now: DateTime<Utc>) -> bool {
    let Some(scheduled_at) = reservation.scheduled_at() else {
        return false;
    };

    let editable_status = matches!(
        reservation.status,
        ReservationStatus::Pending | ReservationStatus::Confirmed
    );

    editable_status
        && scheduled_at.signed_duration_since(now) > Duration::hours(MIN_HOURS_BEFORE_PICKUP)
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    use super::can_modify;
    use crate::models::reservation::{
        DriverAssignment, PaymentMethod, Reservation, ReservationStatus,
    };

    fn reservation_scheduled_at(scheduled: DateTime<Utc>, status: ReservationStatus) -> Reservation {
        let created = scheduled - Duration::days(3);
        Reservation {
            id: Uuid::new_v4(),
            status,
            payment_method: PaymentMethod::Cash,
            total_price: dec!(35),
            assigned_driver: DriverAssignment::Unassigned,
            driver_payment_status: None,
            pickup: "Airport".to_string(),
            dropoff: "Hotel".to_string(),
            pickup_date: Some(scheduled.date_naive()),
            pickup_time: Some(scheduled.time()),
            passenger_name: "P".to_string(),
            passenger_phone: "+1".to_string(),
            created_at: created,
            updated_at: created,
            completed_at: None,
            cancelled_at: None,
            last_edited_at: None,
        }
    }

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 9, 0, 0).unwrap()
    }

    #[test]
    fn just_outside_the_cutoff_is_editable() {
        let now = fixed_now();
        let reservation = reservation_scheduled_at(
            now + Duration::hours(12) + Duration::minutes(1),
            ReservationStatus::Pending,
        );

        assert!(can_modify(&reservation, now));
    }

    #[test]
    fn just_inside_the_cutoff_is_locked() {
        let now = fixed_now();
        let reservation = reservation_scheduled_at(
            now + Duration::hours(11) + Duration::minutes(59),
            ReservationStatus::Pending,
        );

        assert!(!can_modify(&reservation, now));
    }

    #[test]
    fn past_pickup_is_locked() {
        let now = fixed_now();
        let reservation =
            reservation_scheduled_at(now - Duration::hours(1), ReservationStatus::Pending);

        assert!(!can_modify(&reservation, now));
    }

    #[test]
    fn confirmed_is_editable_but_later_statuses_are_not() {
        let now = fixed_now();
        let scheduled = now + Duration::hours(48);

        assert!(can_modify(
            &reservation_scheduled_at(scheduled, ReservationStatus::Confirmed),
            now
        ));

        for status in [
            ReservationStatus::Assigned,
            ReservationStatus::InProgress,
            ReservationStatus::Completed,
            ReservationStatus::Cancelled,
        ] {
            assert!(
                !can_modify(&reservation_scheduled_at(scheduled, status), now),
                "{status:?} should be locked"
            );
        }
    }

    #[test]
    fn missing_schedule_fields_lock_the_reservation() {
        let now = fixed_now();
        let mut reservation = reservation_scheduled_at(
            now + Duration::hours(48),
            ReservationStatus::Pending,
        );
        reservation.pickup_time = None;

        assert!(!can_modify(&reservation, now));

        reservation.pickup_time = Some(now.time());
        reservation.pickup_date = None;
        assert!(!can_modify(&reservation, now));
    }
}
