//! Change-stream plumbing: broadcasting booking mutations to SSE subscribers
//! and the self-mutation guard that lets the initiating client recognize the
//! echo of its own change.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::models::Booking;
use crate::state::AppState;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Insert,
    Update,
}

#[derive(Debug, Clone, Serialize)]
pub struct BookingEvent {
    pub event: ChangeKind,
    pub booking: Booking,
}

/// Publish a booking change to the stream. If the mutation came from a client
/// that identified itself, its marker is set first so the client's own
/// subscription sees the echo flagged as self-caused.
pub fn publish_change(
    state: &Arc<AppState>,
    kind: ChangeKind,
    booking: &Booking,
    client_id: Option<&str>,
) {
    if let Some(client) = client_id {
        state.guard.mark(client, &booking.id);
    }
    let _ = state.booking_tx.send(BookingEvent {
        event: kind,
        booking: booking.clone(),
    });
}

const MARKER_TTL: Duration = Duration::from_secs(5);

/// Short-lived `(client, booking)` markers with consume-once semantics.
/// Entries carry explicit expiry timestamps and are pruned lazily on access;
/// there are no background timers. Best-effort and process-local only — this
/// is toast de-duplication, not an idempotency mechanism.
pub struct SelfMutationGuard {
    ttl: Duration,
    entries: Mutex<HashMap<(String, String), Instant>>,
}

impl Default for SelfMutationGuard {
    fn default() -> Self {
        Self::new(MARKER_TTL)
    }
}

impl SelfMutationGuard {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Marks `booking_id` as just mutated by `client_id`. Re-marking before
    /// expiry refreshes the deadline rather than racing a second timer.
    pub fn mark(&self, client_id: &str, booking_id: &str) {
        self.mark_at(client_id, booking_id, Instant::now());
    }

    /// Returns true at most once per marker: the entry is removed on hit.
    pub fn consume(&self, client_id: &str, booking_id: &str) -> bool {
        self.consume_at(client_id, booking_id, Instant::now())
    }

    fn mark_at(&self, client_id: &str, booking_id: &str, now: Instant) {
        let mut entries = self.entries.lock().unwrap();
        entries.retain(|_, expires| *expires > now);
        entries.insert(
            (client_id.to_string(), booking_id.to_string()),
            now + self.ttl,
        );
    }

    fn consume_at(&self, client_id: &str, booking_id: &str, now: Instant) -> bool {
        let mut entries = self.entries.lock().unwrap();
        entries.retain(|_, expires| *expires > now);
        entries
            .remove(&(client_id.to_string(), booking_id.to_string()))
            .is_some()
    }
}
