use axum::{debug_handler, extract::{Path, State}, Json};
use serde_json::{json, Value};
use sqlx::SqlitePool;

use crate::{db, AppError, AppResult};

#[debug_handler]
pub(crate) async fn save_canvas(
    State(db_pool): State<SqlitePool>,
    Path(room_id): Path<String>,

    Json(canvas_data): Json<Value>,
) -> AppResult<Json<Value>> {
    if !db::save_canvas(&db_pool, &room_id, &canvas_data.to_string()).await? {
        return Err(AppError::not_found("room"));
    }

    Ok(Json(json!({ "success": true })))
}

#[debug_handler]
pub(crate) async fn canvas(
    State(db_pool): State<SqlitePool>,
    Path(room_id): Path<String>,
) -> AppResult<Json<Value>> {
    let Some(canvas_data) = db::get_canvas(&db_pool, &room_id).await? else {
        return Err(AppError::not_found("room"));
    };

    let canvas_data = match canvas_data {
        Some(raw) => serde_json::from_str(&raw)?,
        None => Value::Null,
    };

    Ok(Json(json!({ "canvas_data": canvas_data })))
}
