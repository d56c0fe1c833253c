use chrono::{DateTime, Duration, Utc};

use crate::models::notification::{Notification, NotificationKind};
use crate::models::reservation::{Reservation, ReservationStatus};
use crate::store::{ChangeEvent, ChangeType};

pub const RECENCY_WINDOW_HOURS: i64 = 24;

// One modified event can legitimately produce both an edited and a cancelled
// notification; they answer different questions for the operations desk.
pub fn classify(event: &ChangeEvent, now: DateTime<Utc>) -> Vec<Notification> {
    let reservation = &event.reservation;
    let mut notifications = Vec::new();

    match event.change_type {
        ChangeType::Added => {
            if within_window(reservation.created_at, now) {
                notifications.push(build(
                    NotificationKind::NewReservation,
                    reservation,
                    None,
                    now,
                ));
            }
        }
        ChangeType::Modified => {
            if let Some(edited_at) = reservation.last_edited_at {
                if within_window(edited_at, now) {
                    notifications.push(build(
                        NotificationKind::ReservationEdited,
                        reservation,
                        Some(edited_at),
                        now,
                    ));
                }
            }

            if reservation.status == ReservationStatus::Cancelled {
                if let Some(cancelled_at) = reservation.cancelled_at {
                    if within_window(cancelled_at, now) {
                        notifications.push(build(
                            NotificationKind::ReservationCancelled,
                            reservation,
                            Some(cancelled_at),
                            now,
                        ));
                    }
                }
            }
        }
        ChangeType::Removed => {}
    }

    notifications
}

pub fn within_window(stamp: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now.signed_duration_since(stamp) <= Duration::hours(RECENCY_WINDOW_HOURS)
}

fn build(
    kind: NotificationKind,
    reservation: &Reservation,
    change_stamp: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Notification {
    // Repeated edits get distinct identities through the change timestamp;
    // redelivery of the same underlying change collapses onto the same key.
    let id = match change_stamp {
        Some(stamp) => format!(
            "{}-{}-{}",
            kind.as_str(),
            reservation.id,
            stamp.timestamp_millis()
        ),
        None => format!("{}-{}", kind.as_str(), reservation.id),
    };

    let message = match kind {
        NotificationKind::NewReservation => format!(
            "New reservation: {} to {}",
            reservation.pickup, reservation.dropoff
        ),
        NotificationKind::ReservationEdited => format!(
            "Reservation updated: {} to {}",
            reservation.pickup, reservation.dropoff
        ),
        NotificationKind::ReservationCancelled => format!(
            "Reservation cancelled: {} to {}",
            reservation.pickup, reservation.dropoff
        ),
    };

    Notification {
        id,
        kind,
        message,
        time: now,
        read: false,
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    use super::classify;
    use crate::models::notification::NotificationKind;
    use crate::models::reservation::{
        DriverAssignment, PaymentMethod, Reservation, ReservationStatus,
    };
    use crate::store::{ChangeEvent, ChangeType};

    fn reservation() -> Reservation {
        let now = Utc::now();
        Reservation {
            id: Uuid::new_v4(),
            status: ReservationStatus::Pending,
            payment_method: PaymentMethod::Cash,
            total_price: dec!(40),
            assigned_driver: DriverAssignment::Unassigned,
            driver_payment_status: None,
            pickup: "Airport T1".to_string(),
            dropoff: "Harbour".to_string(),
            pickup_date: None,
            pickup_time: None,
            passenger_name: "P".to_string(),
            passenger_phone: "+1".to_string(),
            created_at: now,
            updated_at: now,
            completed_at: None,
            cancelled_at: None,
            last_edited_at: None,
        }
    }

    #[test]
    fn recent_added_event_yields_new_reservation() {
        let reservation = reservation();
        let id = reservation.id;
        let event = ChangeEvent {
            change_type: ChangeType::Added,
            reservation,
        };

        let notifications = classify(&event, Utc::now());

        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].kind, NotificationKind::NewReservation);
        assert_eq!(notifications[0].id, format!("new_reservation-{id}"));
        assert!(!notifications[0].read);
    }

    #[test]
    fn stale_added_event_is_ignored() {
        let mut reservation = reservation();
        reservation.created_at = Utc::now() - Duration::hours(25);
        let event = ChangeEvent {
            change_type: ChangeType::Added,
            reservation,
        };

        assert!(classify(&event, Utc::now()).is_empty());
    }

    #[test]
    fn edit_key_carries_the_edit_timestamp() {
        let now = Utc::now();
        let mut reservation = reservation();
        reservation.last_edited_at = Some(now - Duration::minutes(5));
        let id = reservation.id;
        let millis = (now - Duration::minutes(5)).timestamp_millis();

        let event = ChangeEvent {
            change_type: ChangeType::Modified,
            reservation,
        };
        let notifications = classify(&event, now);

        assert_eq!(notifications.len(), 1);
        assert_eq!(
            notifications[0].id,
            format!("reservation_edited-{id}-{millis}")
        );
    }

    #[test]
    fn distinct_edits_produce_distinct_keys() {
        let now = Utc::now();
        let mut first = reservation();
        first.last_edited_at = Some(now - Duration::minutes(10));
        let mut second = first.clone();
        second.last_edited_at = Some(now - Duration::minutes(2));

        let a = classify(
            &ChangeEvent {
                change_type: ChangeType::Modified,
                reservation: first,
            },
            now,
        );
        let b = classify(
            &ChangeEvent {
                change_type: ChangeType::Modified,
                reservation: second,
            },
            now,
        );

        assert_ne!(a[0].id, b[0].id);
    }

    #[test]
    fn cancellation_with_recent_edit_emits_both_kinds() {
        let now = Utc::now();
        let mut reservation = reservation();
        reservation.status = ReservationStatus::Cancelled;
        reservation.last_edited_at = Some(now - Duration::hours(1));
        reservation.cancelled_at = Some(now - Duration::minutes(1));

        let event = ChangeEvent {
            change_type: ChangeType::Modified,
            reservation,
        };
        let notifications = classify(&event, now);

        let kinds: Vec<_> = notifications.iter().map(|n| n.kind).collect();
        assert_eq!(
            kinds,
            vec![
                NotificationKind::ReservationEdited,
                NotificationKind::ReservationCancelled
            ]
        );
    }

    #[test]
    fn removed_events_never_notify() {
        let event = ChangeEvent {
            change_type: ChangeType::Removed,
            reservation: reservation(),
        };

        assert!(classify(&event, Utc::now()).is_empty());
    }
}
