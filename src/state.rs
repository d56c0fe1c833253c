use tokio::sync::{broadcast, RwLock};

use crate::models::notification::Notification;
use crate::notify::feed::NotificationFeed;
use crate::observability::metrics::Metrics;
use crate::store::{ChangeEvent, ReservationStore};

pub struct AppState {
    pub store: ReservationStore,
    pub feed: RwLock<NotificationFeed>,
    pub alerts_tx: broadcast::Sender<Notification>,
    pub metrics: Metrics,
    pub balance_retry_limit: u32,
}

impl AppState {
    pub fn new(
        event_buffer_size: usize,
        feed_capacity: usize,
        balance_retry_limit: u32,
    ) -> (Self, broadcast::Receiver<ChangeEvent>) {
        let store = ReservationStore::new(event_buffer_size);
        let change_rx = store.subscribe();
        let (alerts_tx, _unused_rx) = broadcast::channel(event_buffer_size);

        (
            Self {
                store,
                feed: RwLock::new(NotificationFeed::new(feed_capacity)),
                alerts_tx,
                metrics: Metrics::new(),
                balance_retry_limit,
            },
            change_rx,
        )
    }
}
