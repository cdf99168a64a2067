use sqlx::SqlitePool;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::db::{self, DrawingEvent};

/// Handle to the one task that writes drawing events. Events are stored in the order they were submitted.
#[derive(Clone)]
pub struct EventLog {
    tx: mpsc::Sender<DrawingEvent>,
}

impl EventLog {
    /// Spawns the writer on the current runtime. It stops once every handle is dropped.
    pub fn spawn(db_pool: SqlitePool, capacity: usize, retention: u32) -> Self {
        let (tx, rx) = mpsc::channel(capacity);
        tokio::spawn(write_events(db_pool, rx, retention));
        Self { tx }
    }

    /// Queues an event without waiting on the store. Returns false when it had to be dropped.
    pub fn submit(&self, event: DrawingEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                tracing::warn!(room = %event.room_id, user = %event.user_id, kind = event.kind.as_str(), "event log queue full, dropping drawing event");
                false
            }
            Err(TrySendError::Closed(event)) => {
                tracing::warn!(room = %event.room_id, user = %event.user_id, kind = event.kind.as_str(), "event log writer stopped, dropping drawing event");
                false
            }
        }
    }
}

async fn write_events(db_pool: SqlitePool, mut rx: mpsc::Receiver<DrawingEvent>, retention: u32) {
    while let Some(event) = rx.recv().await {
        persist(&db_pool, &event, retention).await;
    }
    tracing::debug!("event log writer stopped");
}

async fn persist(db_pool: &SqlitePool, event: &DrawingEvent, retention: u32) {
    if let Err(e) = db::append_event(db_pool, event).await {
        tracing::warn!(room = %event.room_id, user = %event.user_id, kind = event.kind.as_str(), error = %e, "failed to log drawing event");
        return;
    }

    if retention > 0 {
        if let Err(e) = db::trim_events(db_pool, &event.room_id, retention).await {
            tracing::warn!(room = %event.room_id, error = %e, "failed to trim drawing events");
        }
    }
}
