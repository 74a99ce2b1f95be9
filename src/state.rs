use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use tokio::sync::broadcast;

use crate::config::AppConfig;
use crate::services::realtime::{BookingEvent, SelfMutationGuard};

pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub config: AppConfig,
    /// Fan-out for the booking change stream; send errors (no subscribers)
    /// are ignored at the call sites.
    pub booking_tx: broadcast::Sender<BookingEvent>,
    pub guard: SelfMutationGuard,
}
