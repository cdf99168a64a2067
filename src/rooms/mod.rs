mod canvas;
mod msg;
mod new;
mod room;
mod ws;

use axum::{routing::get, Router};

use crate::AppState;

/// Room and canvas endpoints, nested under `/api`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/rooms", get(room::public_rooms).post(new::new_room))
        .route("/rooms/{room_id}", get(room::room))
        .route("/rooms/{room_id}/canvas", get(canvas::canvas).put(canvas::save_canvas))
        .route("/rooms/{room_id}/users", get(room::room_users))
}

/// The realtime endpoint: `/ws/{room_id}/{user_id}/{username}`.
pub fn ws_router() -> Router<AppState> {
    Router::new()
        .route("/ws/{room_id}/{user_id}/{username}", get(ws::room_ws))
}
