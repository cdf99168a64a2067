use std::sync::Arc;

use axum::{debug_handler, extract::{Path, State}, Json};
use serde::Serialize;
use sqlx::SqlitePool;

use crate::{
    config::Config,
    db::{self, Room},
    registry::{Member, RoomRegistry},
    AppError, AppResult,
};

#[debug_handler(state = crate::AppState)]
pub(crate) async fn room(
    State(db_pool): State<SqlitePool>,
    State(registry): State<Arc<RoomRegistry>>,
    Path(room_id): Path<String>,
) -> AppResult<Json<Room>> {
    let Some(mut room) = db::get_room(&db_pool, &room_id).await? else {
        return Err(AppError::not_found("room"));
    };
    room.active_users_count = registry.count_in(&room.id);

    Ok(Json(room))
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn public_rooms(
    State(db_pool): State<SqlitePool>,
    State(registry): State<Arc<RoomRegistry>>,
    State(config): State<Arc<Config>>,
) -> AppResult<Json<Vec<Room>>> {
    let mut rooms = db::list_public_rooms(&db_pool, config.public_rooms_limit).await?;
    for room in &mut rooms {
        room.active_users_count = registry.count_in(&room.id);
    }

    Ok(Json(rooms))
}

#[derive(Serialize)]
pub(crate) struct RoomUsers {
    room_id: String,
    users_count: usize,
    users: Vec<Member>,
}

/// Who is connected right now. Answers for any room id, stored or not.
#[debug_handler]
pub(crate) async fn room_users(
    State(registry): State<Arc<RoomRegistry>>,
    Path(room_id): Path<String>,
) -> Json<RoomUsers> {
    let users = registry.members(&room_id);

    Json(RoomUsers {
        room_id,
        users_count: users.len(),
        users,
    })
}
