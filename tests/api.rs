use axum::{
    body::{self, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use chalkline::{db, registry::Participant, AppState, Config};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tower::ServiceExt;

async fn app() -> (Router, AppState) {
    let db_pool = db::connect("sqlite::memory:", 1).await.unwrap();
    let state = AppState::new(db_pool, Config::default());
    (chalkline::router(state.clone()), state)
}

async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => request.body(Body::empty()),
    }
    .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    // rejections from axum's own extractors are plain text
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

    (status, json)
}

async fn create(app: &Router, name: &str, is_public: bool) -> Value {
    let (status, room) = call(
        app,
        Method::POST,
        "/api/rooms",
        Some(json!({ "name": name, "is_public": is_public, "created_by": "alice" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    room
}

#[tokio::test]
async fn root_answers() {
    let (app, _) = app().await;
    let (status, body) = call(&app, Method::GET, "/api", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Collaborative Whiteboard API");
}

#[tokio::test]
async fn create_and_fetch_room() {
    let (app, _) = app().await;
    let room = create(&app, "sketchpad", true).await;

    assert_eq!(room["name"], "sketchpad");
    assert_eq!(room["is_public"], true);
    assert_eq!(room["created_by"], "alice");
    assert_eq!(room["active_users_count"], 0);
    assert!(room["created_at"].is_string());
    assert!(room.get("canvas_data").is_none());

    let id = room["id"].as_str().unwrap();
    let (status, fetched) = call(&app, Method::GET, &format!("/api/rooms/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    for field in ["id", "name", "is_public", "created_by", "active_users_count"] {
        assert_eq!(fetched[field], room[field], "{field}");
    }
}

#[tokio::test]
async fn rooms_default_to_public() {
    let (app, _) = app().await;
    let (status, room) = call(
        &app,
        Method::POST,
        "/api/rooms",
        Some(json!({ "name": "open", "created_by": "bob" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(room["is_public"], true);
}

#[tokio::test]
async fn create_requires_name_and_creator() {
    let (app, _) = app().await;

    for body in [
        json!({ "created_by": "alice" }),
        json!({ "name": "  ", "created_by": "alice" }),
        json!({ "name": "room" }),
    ] {
        let (status, error) = call(&app, Method::POST, "/api/rooms", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error["error"], "room name and creator are required");
    }
}

#[tokio::test]
async fn unknown_room_is_404() {
    let (app, _) = app().await;

    let (status, error) = call(&app, Method::GET, "/api/rooms/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error["error"], "room not found");

    let (status, _) = call(&app, Method::GET, "/api/rooms/nope/canvas", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = call(&app, Method::PUT, "/api/rooms/nope/canvas", Some(json!({}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn listing_shows_public_rooms_newest_first() {
    let (app, _) = app().await;
    let older = create(&app, "older", true).await;
    create(&app, "secret", false).await;
    let newer = create(&app, "newer", true).await;

    let (status, rooms) = call(&app, Method::GET, "/api/rooms", None).await;
    assert_eq!(status, StatusCode::OK);

    let names: Vec<_> = rooms
        .as_array()
        .unwrap()
        .iter()
        .map(|room| room["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["newer", "older"]);
    assert_eq!(rooms[0]["id"], newer["id"]);
    assert_eq!(rooms[1]["id"], older["id"]);
}

#[tokio::test]
async fn canvas_snapshot_round_trip() {
    let (app, _) = app().await;
    let room = create(&app, "canvas", true).await;
    let uri = format!("/api/rooms/{}/canvas", room["id"].as_str().unwrap());

    let (status, empty) = call(&app, Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(empty, json!({ "canvas_data": null }));

    let snapshot = json!({ "version": "5.3.0", "objects": [{ "type": "path", "stroke": "#000" }] });
    let (status, saved) = call(&app, Method::PUT, &uri, Some(snapshot.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(saved, json!({ "success": true }));

    let (_, loaded) = call(&app, Method::GET, &uri, None).await;
    assert_eq!(loaded, json!({ "canvas_data": snapshot }));
}

#[tokio::test]
async fn live_counts_come_from_the_registry() {
    let (app, state) = app().await;
    let room = create(&app, "busy", true).await;
    let id = room["id"].as_str().unwrap().to_owned();

    let (tx, _rx) = mpsc::channel(4);
    state.registry.register(&id, Participant::new("u1", "Una", tx.clone()));
    state.registry.register(&id, Participant::new("u2", "Dos", tx));

    let (_, fetched) = call(&app, Method::GET, &format!("/api/rooms/{id}"), None).await;
    assert_eq!(fetched["active_users_count"], 2);

    let (_, listed) = call(&app, Method::GET, "/api/rooms", None).await;
    assert_eq!(listed[0]["active_users_count"], 2);

    let (status, users) = call(&app, Method::GET, &format!("/api/rooms/{id}/users"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        users,
        json!({
            "room_id": id,
            "users_count": 2,
            "users": [
                { "user_id": "u1", "username": "Una" },
                { "user_id": "u2", "username": "Dos" },
            ],
        })
    );
}

#[tokio::test]
async fn users_of_an_idle_room() {
    let (app, _) = app().await;
    let (status, users) = call(&app, Method::GET, "/api/rooms/ghost/users", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(users, json!({ "room_id": "ghost", "users_count": 0, "users": [] }));
}

#[tokio::test]
async fn websocket_route_rejects_plain_requests() {
    let (app, _) = app().await;
    let (status, _) = call(&app, Method::GET, "/ws/r1/u1/Una", None).await;
    assert!(status.is_client_error());
}
