use axum::{debug_handler, extract::State, http::StatusCode, Json};
use serde::Deserialize;
use sqlx::SqlitePool;

use crate::{db::{self, Room}, AppError, AppResult};

#[derive(Debug, Deserialize)]
pub(crate) struct NewRoomQuery {
    #[serde(default)]
    name: String,
    #[serde(default = "public_by_default")]
    is_public: bool,
    #[serde(default)]
    created_by: String,
}

fn public_by_default() -> bool {
    true
}

#[debug_handler]
pub(crate) async fn new_room(
    State(db_pool): State<SqlitePool>,

    Json(NewRoomQuery { name, is_public, created_by }): Json<NewRoomQuery>,
) -> AppResult<(StatusCode, Json<Room>)> {
    let (name, created_by) = (name.trim(), created_by.trim());
    if name.is_empty() || created_by.is_empty() {
        return Err(AppError::bad_request("room name and creator are required"));
    }

    let room = db::create_room(&db_pool, name.to_owned(), is_public, created_by.to_owned()).await?;
    tracing::info!(room = %room.id, name = %room.name, is_public, "room created");

    Ok((StatusCode::CREATED, Json(room)))
}
