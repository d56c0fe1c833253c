pub mod classify;
pub mod feed;

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use crate::state::AppState;
use crate::store::ChangeEvent;

pub async fn run_notifier(state: Arc<AppState>, mut events: broadcast::Receiver<ChangeEvent>) {
    info!("notifier started");

    loop {
        match events.recv().await {
            Ok(event) => {
                let start = Instant::now();
                let appended = process_event(&state, event).await;

                let outcome = if appended > 0 { "appended" } else { "ignored" };
                state
                    .metrics
                    .event_classify_latency_seconds
                    .with_label_values(&[outcome])
                    .observe(start.elapsed().as_secs_f64());
            }
            Err(RecvError::Lagged(missed)) => {
                warn!(missed, "change stream lagged; continuing from current position");
            }
            Err(RecvError::Closed) => break,
        }
    }

    warn!("notifier stopped: change stream closed");
}

async fn process_event(state: &AppState, event: ChangeEvent) -> usize {
    let now = Utc::now();
    let candidates = classify::classify(&event, now);
    if candidates.is_empty() {
        return 0;
    }

    let mut appended = 0;
    let mut feed = state.feed.write().await;

    for notification in candidates {
        let is_new = feed.append_if_new(notification.clone(), now);
        state
            .metrics
            .notifications_total
            .with_label_values(&[
                notification.kind.as_str(),
                if is_new { "appended" } else { "duplicate" },
            ])
            .inc();

        if is_new {
            appended += 1;
            info!(id = %notification.id, kind = notification.kind.as_str(), "notification appended");
            // Desktop alert fanout is best-effort; nobody listening is fine.
            let _ = state.alerts_tx.send(notification);
        }
    }

    state.metrics.feed_unread.set(feed.unread_count() as i64);
    appended
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    use super::process_event;
    use crate::models::reservation::{
        DriverAssignment, PaymentMethod, Reservation, ReservationStatus,
    };
    use crate::state::AppState;
    use crate::store::{ChangeEvent, ChangeType};

    fn added_event() -> ChangeEvent {
        let now = Utc::now();
        ChangeEvent {
            change_type: ChangeType::Added,
            reservation: Reservation {
                id: Uuid::new_v4(),
                status: ReservationStatus::Pending,
                payment_method: PaymentMethod::Cash,
                total_price: dec!(30),
                assigned_driver: DriverAssignment::Unassigned,
                driver_payment_status: None,
                pickup: "Airport".to_string(),
                dropoff: "Old Town".to_string(),
                pickup_date: None,
                pickup_time: None,
                passenger_name: "P".to_string(),
                passenger_phone: "+1".to_string(),
                created_at: now,
                updated_at: now,
                completed_at: None,
                cancelled_at: None,
                last_edited_at: None,
            },
        }
    }

    #[tokio::test]
    async fn redelivered_added_event_appends_once() {
        let (state, _rx) = AppState::new(16, 10, 3);

        let event = added_event();
        assert_eq!(process_event(&state, event.clone()).await, 1);
        assert_eq!(process_event(&state, event).await, 0);

        let feed = state.feed.read().await;
        assert_eq!(feed.len(), 1);
        assert_eq!(feed.unread_count(), 1);
    }

    #[tokio::test]
    async fn appended_notifications_fan_out_to_alert_subscribers() {
        let (state, _rx) = AppState::new(16, 10, 3);
        let mut alerts = state.alerts_tx.subscribe();

        process_event(&state, added_event()).await;

        let alert = alerts.try_recv().expect("alert delivered");
        assert!(alert.id.starts_with("new_reservation-"));
    }
}
