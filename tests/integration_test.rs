use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use debatedash::api::build_router;
use debatedash::content::TemplateContentProvider;
use debatedash::media::LoopbackCaptureDevice;
use debatedash::protocol::{ClientMessage, RoomView, ServerMessage};
use debatedash::state::{profile, AppState};
use debatedash::store::ProfileStore;
use debatedash::types::{DebateConfig, DebatePhase, ParticipantKind};
use debatedash::ws::handlers::{handle_message, Connection};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

async fn open_room(state: &Arc<AppState>, email: &str) -> Connection {
    let (_, user) = state.login(email, None).await.unwrap();
    let room = state
        .create_room(&user, &["technology".to_string(), "ethics".to_string()])
        .await
        .unwrap();
    // What the WebSocket upgrade does before handing over to the socket loop
    state.join_room(&room.id, &user).await.unwrap();
    Connection {
        room_id: room.id,
        user,
    }
}

/// Tick until the room leaves the running phases
async fn run_until_voting(state: &AppState, room_id: &str) -> RoomView {
    for _ in 0..10_000 {
        state.tick_rooms().await;
        let view = state.get_room(room_id).await.unwrap();
        if !view.phase.is_running() {
            return view;
        }
    }
    panic!("Room {} never reached voting", room_id);
}

async fn rate_everyone(state: &Arc<AppState>, conn: &Connection, score: u8) -> Vec<ServerMessage> {
    let view = state.get_room(&conn.room_id).await.unwrap();
    let mut replies = Vec::new();
    for p in view.participants.iter().filter(|p| p.id != conn.user.id) {
        let reply = handle_message(
            ClientMessage::SubmitRating {
                ratee_id: p.id.clone(),
                score,
                feedback: "Well argued".to_string(),
            },
            conn,
            state,
        )
        .await;
        replies.push(reply.expect("rating should be acknowledged"));
    }
    replies
}

/// End-to-end flow for one human and three bots
#[tokio::test]
async fn test_full_debate_flow() {
    let state = Arc::new(AppState::new());
    let conn = open_room(&state, "alex@example.com").await;

    // 1. Waiting room
    let view = state.get_room(&conn.room_id).await.unwrap();
    assert_eq!(view.phase, DebatePhase::Waiting);
    assert_eq!(view.participants.len(), 4);
    assert!(!view.topic.is_empty());

    // 2. Start and take notes
    assert!(handle_message(ClientMessage::StartDebate, &conn, &state)
        .await
        .is_none());
    let reply = handle_message(
        ClientMessage::UpdateNotes {
            text: "Regulation lags behind research".to_string(),
        },
        &conn,
        &state,
    )
    .await;
    assert!(matches!(reply, Some(ServerMessage::NotesSaved)));

    let view = state.get_room(&conn.room_id).await.unwrap();
    assert_eq!(view.phase, DebatePhase::Introduction);
    assert_eq!(view.current_speaker.as_deref(), Some("user-1"));

    // 3. First speaker hands over after a minute
    for _ in 0..60 {
        state.tick_rooms().await;
    }
    let view = state.get_room(&conn.room_id).await.unwrap();
    assert_eq!(view.current_speaker.as_deref(), Some("user-2"));
    assert_eq!(view.total_clock, "09:00");

    // 4. The ten minute clock ends the debate
    let view = run_until_voting(&state, &conn.room_id).await;
    assert_eq!(view.phase, DebatePhase::Voting);
    assert_eq!(view.total_remaining, 0);
    assert!(view.participants.iter().all(|p| !p.is_speaking));

    // Bots voted as soon as voting opened
    let human = view.participants.iter().find(|p| p.id == "user-1").unwrap();
    assert_eq!(human.ratings_received, 3);

    // 5. The human's ratings complete the voting
    let replies = rate_everyone(&state, &conn, 8).await;
    assert_eq!(replies.len(), 3);
    assert!(replies
        .iter()
        .all(|r| matches!(r, ServerMessage::RatingAck { recorded: true, .. })));

    let view = state.get_room(&conn.room_id).await.unwrap();
    assert_eq!(view.phase, DebatePhase::Results);
    assert_eq!(view.results.len(), 4);
    let ranks: Vec<u32> = view.results.iter().map(|r| r.rank).collect();
    assert_eq!(ranks, vec![1, 2, 3, 4]);
    assert!(view
        .results
        .windows(2)
        .all(|w| w[0].average_score >= w[1].average_score));

    // 6. Profile got the result, bots did not
    let alex = state.get_profile("user-1").await.unwrap();
    assert_eq!(alex.user.stats.debates_participated, 16);
    assert_eq!(alex.user.debate_history.len(), 3);
    assert_eq!(alex.user.debate_history[0].id, conn.room_id);
    let sam = state.profiles.get("user-2").await.unwrap();
    assert!(sam.debate_history.is_empty());

    // 7. Acknowledge and leave
    let reply = handle_message(ClientMessage::AcknowledgeResults, &conn, &state).await;
    assert!(matches!(reply, Some(ServerMessage::Left { .. })));
    assert!(state.get_room(&conn.room_id).await.is_none());
}

#[tokio::test]
async fn test_late_ratings_are_ignored() {
    let state = Arc::new(AppState::new());
    let conn = open_room(&state, "taylor@example.com").await;
    handle_message(ClientMessage::StartDebate, &conn, &state).await;
    run_until_voting(&state, &conn.room_id).await;
    rate_everyone(&state, &conn, 9).await;

    // Voting is over; a repeat rating does nothing
    let replies = rate_everyone(&state, &conn, 1).await;
    assert!(replies
        .iter()
        .all(|r| matches!(r, ServerMessage::RatingAck { recorded: false, .. })));

    let taylor = state.profiles.get("user-3").await.unwrap();
    assert_eq!(taylor.stats.debates_participated, 19);
}

#[tokio::test]
async fn test_two_humans_share_a_room() {
    let state = Arc::new(AppState::new());
    let host = open_room(&state, "alex@example.com").await;
    let (_, jamie) = state.login("jamie@example.com", None).await.unwrap();
    state.join_room(&host.room_id, &jamie).await.unwrap();
    let guest = Connection {
        room_id: host.room_id.clone(),
        user: jamie,
    };

    handle_message(ClientMessage::StartDebate, &guest, &state).await;
    let view = run_until_voting(&state, &host.room_id).await;
    assert_eq!(view.participants.len(), 5);
    assert_eq!(
        view.participants
            .iter()
            .filter(|p| p.kind == ParticipantKind::Human)
            .count(),
        2
    );

    rate_everyone(&state, &host, 7).await;
    assert_eq!(
        state.get_room(&host.room_id).await.unwrap().phase,
        DebatePhase::Voting
    );
    rate_everyone(&state, &guest, 10).await;
    assert_eq!(
        state.get_room(&host.room_id).await.unwrap().phase,
        DebatePhase::Results
    );

    // The guest can only toggle media they do not own
    let reply = handle_message(ClientMessage::ToggleVideo, &guest, &state).await;
    assert!(matches!(reply, Some(ServerMessage::Error { .. })));

    // Room stays until the last human acknowledges
    handle_message(ClientMessage::AcknowledgeResults, &host, &state).await;
    assert!(state.get_room(&host.room_id).await.is_some());
    handle_message(ClientMessage::AcknowledgeResults, &guest, &state).await;
    assert!(state.get_room(&host.room_id).await.is_none());
}

fn state_with_device(device: Arc<LoopbackCaptureDevice>) -> Arc<AppState> {
    Arc::new(AppState::with_components(
        DebateConfig::default(),
        ProfileStore::with_profiles(profile::mock_users()),
        Arc::new(TemplateContentProvider),
        device,
    ))
}

#[tokio::test]
async fn test_capture_released_once_when_leaving_mid_rating() {
    let device = Arc::new(LoopbackCaptureDevice::new());
    let state = state_with_device(device.clone());
    let conn = open_room(&state, "alex@example.com").await;

    handle_message(ClientMessage::StartDebate, &conn, &state).await;
    run_until_voting(&state, &conn.room_id).await;

    // Rate one of three, then walk out
    let view = state.get_room(&conn.room_id).await.unwrap();
    handle_message(
        ClientMessage::SubmitRating {
            ratee_id: view.participants[1].id.clone(),
            score: 6,
            feedback: String::new(),
        },
        &conn,
        &state,
    )
    .await;
    assert_eq!(device.live(), 1);

    let reply = handle_message(ClientMessage::Leave, &conn, &state).await;
    assert!(matches!(reply, Some(ServerMessage::Left { .. })));
    assert_eq!(device.acquired(), 1);
    assert_eq!(device.released(), 1);

    // Unfinished debates are not recorded
    let alex = state.profiles.get("user-1").await.unwrap();
    assert_eq!(alex.stats.debates_participated, 15);
}

#[tokio::test]
async fn test_capture_released_once_for_every_room() {
    let device = Arc::new(LoopbackCaptureDevice::new());
    let state = state_with_device(device.clone());

    let waiting = open_room(&state, "alex@example.com").await;
    let running = open_room(&state, "sam@example.com").await;
    handle_message(ClientMessage::StartDebate, &running, &state).await;
    for _ in 0..90 {
        state.tick_rooms().await;
    }
    assert_eq!(device.live(), 2);

    handle_message(ClientMessage::Leave, &waiting, &state).await;
    handle_message(ClientMessage::Leave, &running, &state).await;
    // Leaving twice is harmless
    let reply = handle_message(ClientMessage::Leave, &running, &state).await;
    assert!(matches!(reply, Some(ServerMessage::Error { .. })));

    assert_eq!(device.acquired(), 2);
    assert_eq!(device.released(), 2);
}

#[tokio::test]
async fn test_results_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("profiles.json");

    {
        let store = ProfileStore::open(&path).await.unwrap();
        store.seed(profile::mock_users()).await.unwrap();
        let state = Arc::new(AppState::with_components(
            DebateConfig::default(),
            store,
            Arc::new(TemplateContentProvider),
            Arc::new(LoopbackCaptureDevice::new()),
        ));
        let conn = open_room(&state, "alex@example.com").await;
        handle_message(ClientMessage::StartDebate, &conn, &state).await;
        run_until_voting(&state, &conn.room_id).await;
        rate_everyone(&state, &conn, 8).await;
    }

    let reopened = ProfileStore::open(&path).await.unwrap();
    let alex = reopened.get("user-1").await.unwrap();
    assert_eq!(alex.stats.debates_participated, 16);
    assert_eq!(alex.debate_history.len(), 3);
}

async fn call(app: &axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn post_json(uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_http_api() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_router(Arc::new(AppState::new()), dir.path());

    // Login
    let (status, body) = call(
        &app,
        post_json(
            "/api/login",
            None,
            json!({"email": "riley@example.com", "password": "secret"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["id"], "user-7");
    let token = body["token"].as_str().unwrap().to_string();

    let (status, body) = call(
        &app,
        post_json("/api/login", None, json!({"email": "nope", "password": ""})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_EMAIL");

    // Profile needs a session
    let (status, _) = call(&app, get("/api/profile", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, body) = call(&app, get("/api/profile", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["name"], "Riley Patel");
    assert_eq!(body["win_rate"], 25);

    // Categories and rooms
    let (status, body) = call(&app, get("/api/categories", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 8);

    let (status, body) = call(
        &app,
        post_json("/api/rooms", Some(&token), json!({"categories": []})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Please select at least one category");

    let (status, body) = call(
        &app,
        post_json("/api/rooms", Some(&token), json!({"categories": ["health"]})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["phase"], "waiting");
    let room_id = body["id"].as_str().unwrap().to_string();

    let (status, body) = call(&app, get(&format!("/api/rooms/{}", room_id), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["host_id"], "user-7");

    let (status, _) = call(&app, get("/api/rooms/missing", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Leaderboard
    let (status, body) = call(&app, get("/api/leaderboard?sort=debatesWon", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["id"], "user-3");
    assert_eq!(body[0]["rank"], 1);
    let (_, body) = call(&app, get("/api/leaderboard", None)).await;
    assert_eq!(body[1]["id"], "user-1");

    // Logout ends the session
    let (status, _) = call(&app, post_json("/api/logout", Some(&token), json!({}))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = call(&app, get("/api/profile", Some(&token))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_rooms_nobody_joins_release_capture() {
    let device = Arc::new(LoopbackCaptureDevice::new());
    let state = Arc::new(AppState::with_components(
        DebateConfig {
            abandon_secs: 5,
            ..DebateConfig::default()
        },
        ProfileStore::with_profiles(profile::mock_users()),
        Arc::new(TemplateContentProvider),
        device.clone(),
    ));
    let (_, alex) = state.login("alex@example.com", None).await.unwrap();
    for _ in 0..5 {
        state
            .create_room(&alex, &["politics".to_string()])
            .await
            .unwrap();
    }
    assert_eq!(device.live(), 5);

    for _ in 0..5 {
        state.tick_rooms().await;
    }

    assert!(state.rooms.read().await.is_empty());
    assert_eq!(device.acquired(), 5);
    assert_eq!(device.live(), 0);
}
