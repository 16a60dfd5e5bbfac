use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, instrument};

use super::models::Room;
use super::service::RoomService;
use super::types::{CreateRoomRequest, CreateRoomResponse, JoinRoomRequest, JoinRoomResponse, LeaderboardEntry};
use crate::shared::{AppError, AppState};

/// Request payload for leaving a room (presence only; the participant
/// record survives)
#[derive(Debug, Deserialize)]
pub struct LeaveRoomRequest {
    pub user_key: String,
}

fn service(state: &AppState) -> RoomService {
    RoomService::new(
        state.rooms.clone(),
        state.rounds.clone(),
        state.clock.clone(),
        state.event_bus.clone(),
    )
}

/// HTTP handler for creating a new room
///
/// POST /rooms
#[instrument(name = "create_room", skip(state, request))]
pub async fn create_room(
    State(state): State<AppState>,
    Json(request): Json<CreateRoomRequest>,
) -> Result<Json<CreateRoomResponse>, AppError> {
    let (room_code, room) = service(&state).create_room(request).await?;

    info!(room_code = %room_code, "Room created");
    Ok(Json(CreateRoomResponse { room_code, room }))
}

/// HTTP handler for joining a room
///
/// POST /rooms/:code/join
#[instrument(name = "join_room", skip(state, request))]
pub async fn join_room(
    State(state): State<AppState>,
    Path(room_code): Path<String>,
    Json(request): Json<JoinRoomRequest>,
) -> Result<Json<JoinRoomResponse>, AppError> {
    let (user_key, room) = service(&state).join_room(&room_code, request).await?;
    Ok(Json(JoinRoomResponse { user_key, room }))
}

/// HTTP handler for leaving a room (marks the participant offline)
///
/// POST /rooms/:code/leave
#[instrument(name = "leave_room", skip(state, request))]
pub async fn leave_room(
    State(state): State<AppState>,
    Path(room_code): Path<String>,
    Json(request): Json<LeaveRoomRequest>,
) -> Result<Json<Value>, AppError> {
    service(&state)
        .set_online(&room_code, &request.user_key, false)
        .await?;
    Ok(Json(json!({ "left": true })))
}

/// HTTP handler for the full room snapshot
///
/// GET /rooms/:code
#[instrument(name = "get_room", skip(state))]
pub async fn get_room(
    State(state): State<AppState>,
    Path(room_code): Path<String>,
) -> Result<Json<Room>, AppError> {
    let room = service(&state).room_snapshot(&room_code).await?;
    Ok(Json(room))
}

/// HTTP handler for the ordered leaderboard
///
/// GET /rooms/:code/leaderboard
#[instrument(name = "leaderboard", skip(state))]
pub async fn leaderboard(
    State(state): State<AppState>,
    Path(room_code): Path<String>,
) -> Result<Json<Vec<LeaderboardEntry>>, AppError> {
    let entries = service(&state).leaderboard(&room_code).await?;
    Ok(Json(entries))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::test_utils::TestApp;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        routing::{get, post},
        Router,
    };
    use tower::ServiceExt; // for `oneshot`

    fn app() -> Router {
        let test_app = TestApp::new();
        Router::new()
            .route("/rooms", post(create_room))
            .route("/rooms/:code", get(get_room))
            .route("/rooms/:code/join", post(join_room))
            .route("/rooms/:code/leave", post(leave_room))
            .route("/rooms/:code/leaderboard", get(leaderboard))
            .with_state(test_app.state)
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    const CREATE_BODY: &str = r#"{
        "name": "Quiz Master",
        "email": "master@example.com",
        "total_points": 300,
        "timer_ms": 10000
    }"#;

    #[tokio::test]
    async fn test_create_room_handler() {
        let app = app();

        let response = app.oneshot(post_json("/rooms", CREATE_BODY)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let created: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(created["room_code"].as_str().unwrap().len(), 6);
        assert_eq!(created["room"]["settings"]["total_points"], 300);
    }

    #[tokio::test]
    async fn test_create_room_handler_rejects_bad_settings() {
        let app = app();

        let body = r#"{"name": "M", "email": "nope", "total_points": 1, "timer_ms": 10}"#;
        let response = app.oneshot(post_json("/rooms", body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_join_and_leave_flow() {
        let app = app();

        let response = app
            .clone()
            .oneshot(post_json("/rooms", CREATE_BODY))
            .await
            .unwrap();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let created: serde_json::Value = serde_json::from_slice(&body).unwrap();
        let code = created["room_code"].as_str().unwrap().to_string();

        let response = app
            .clone()
            .oneshot(post_json(
                &format!("/rooms/{}/join", code),
                r#"{"name": "Alice", "email": "alice@example.com"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let joined: serde_json::Value = serde_json::from_slice(&body).unwrap();
        let user_key = joined["user_key"].as_str().unwrap().to_string();

        let response = app
            .clone()
            .oneshot(post_json(
                &format!("/rooms/{}/leave", code),
                &format!(r#"{{"user_key": "{}"}}"#, user_key),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let request = Request::builder()
            .method("GET")
            .uri(format!("/rooms/{}", code))
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let room: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(room["participants"][&user_key]["is_online"], false);
    }

    #[tokio::test]
    async fn test_get_unknown_room_is_not_found() {
        let app = app();

        let request = Request::builder()
            .method("GET")
            .uri("/rooms/ZZZZZZ")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
