use std::str::FromStr;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Room {
    pub id: String,
    pub name: String,
    pub is_public: bool,
    pub created_by: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(skip)]
    pub canvas_data: Option<String>,

    // filled from the live registry, never stored
    #[sqlx(skip)]
    pub active_users_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Draw,
    Erase,
    Clear,
    Undo,
    Redo,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        use EventKind::*;
        match self {
            Draw => "draw",
            Erase => "erase",
            Clear => "clear",
            Undo => "undo",
            Redo => "redo",
        }
    }

    pub fn parse(kind: &str) -> Option<Self> {
        use EventKind::*;
        Some(match kind {
            "draw" => Draw,
            "erase" => Erase,
            "clear" => Clear,
            "undo" => Undo,
            "redo" => Redo,
            _ => return None,
        })
    }
}

/// One persisted stroke/erase/clear/undo/redo action. Written once, never read back by the relay.
#[derive(Debug, Clone)]
pub struct DrawingEvent {
    pub room_id: String,
    pub user_id: String,
    pub kind: EventKind,
    pub data: Value,
    pub timestamp: OffsetDateTime,
}

/// Opens the pool and runs the embedded migrations.
pub async fn connect(url: &str, max_connections: u32) -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(url)
        .with_context(|| format!("invalid DATABASE_URL {url:?}"))?
        .create_if_missing(true);

    // an in-memory database lives exactly as long as its connection
    let db_pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .with_context(|| format!("connecting to {url}"))?;

    sqlx::migrate!()
        .run(&db_pool)
        .await
        .context("running migrations")?;

    Ok(db_pool)
}

pub async fn create_room(
    db_pool: &SqlitePool,
    name: String,
    is_public: bool,
    created_by: String,
) -> sqlx::Result<Room> {
    let room = Room {
        id: Uuid::now_v7().to_string(),
        name,
        is_public,
        created_by,
        created_at: OffsetDateTime::now_utc(),
        canvas_data: None,
        active_users_count: 0,
    };

    sqlx::query("INSERT INTO rooms (id,name,is_public,created_by,created_at) VALUES (?,?,?,?,?)")
        .bind(&room.id)
        .bind(&room.name)
        .bind(room.is_public)
        .bind(&room.created_by)
        .bind(room.created_at)
        .execute(db_pool)
        .await?;

    Ok(room)
}

pub async fn get_room(db_pool: &SqlitePool, id: &str) -> sqlx::Result<Option<Room>> {
    sqlx::query_as("SELECT id,name,is_public,created_by,created_at,canvas_data FROM rooms WHERE id=?")
        .bind(id)
        .fetch_optional(db_pool)
        .await
}

/// Newest first, by insertion order.
pub async fn list_public_rooms(db_pool: &SqlitePool, limit: u32) -> sqlx::Result<Vec<Room>> {
    sqlx::query_as(
        "SELECT id,name,is_public,created_by,created_at,canvas_data FROM rooms
        WHERE is_public=TRUE ORDER BY rowid DESC LIMIT ?",
    )
    .bind(limit)
    .fetch_all(db_pool)
    .await
}

/// Returns false when the room doesn't exist.
pub async fn save_canvas(db_pool: &SqlitePool, id: &str, canvas_data: &str) -> sqlx::Result<bool> {
    let result = sqlx::query("UPDATE rooms SET canvas_data=? WHERE id=?")
        .bind(canvas_data)
        .bind(id)
        .execute(db_pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Outer `None` means no such room, inner `None` means nothing saved yet.
pub async fn get_canvas(db_pool: &SqlitePool, id: &str) -> sqlx::Result<Option<Option<String>>> {
    let row: Option<(Option<String>,)> = sqlx::query_as("SELECT canvas_data FROM rooms WHERE id=?")
        .bind(id)
        .fetch_optional(db_pool)
        .await?;

    Ok(row.map(|(canvas_data,)| canvas_data))
}

pub async fn append_event(db_pool: &SqlitePool, event: &DrawingEvent) -> sqlx::Result<()> {
    sqlx::query("INSERT INTO drawing_events (room_id,user_id,event_type,data,timestamp) VALUES (?,?,?,?,?)")
        .bind(&event.room_id)
        .bind(&event.user_id)
        .bind(event.kind.as_str())
        .bind(event.data.to_string())
        .bind(event.timestamp)
        .execute(db_pool)
        .await?;

    Ok(())
}

/// Deletes everything but the newest `keep` events of a room.
pub async fn trim_events(db_pool: &SqlitePool, room_id: &str, keep: u32) -> sqlx::Result<u64> {
    let result = sqlx::query(
        "DELETE FROM drawing_events WHERE room_id=? AND id <= (
            SELECT id FROM drawing_events WHERE room_id=? ORDER BY id DESC LIMIT 1 OFFSET ?
        )",
    )
    .bind(room_id)
    .bind(room_id)
    .bind(keep)
    .execute(db_pool)
    .await?;

    Ok(result.rows_affected())
}
