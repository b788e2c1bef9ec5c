//! In-process stand-in for the events API, served by axum on a random port.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use axum::{
    extract::{Query, RawQuery, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use shared::{
    domain::{CommentId, EventId},
    protocol::{
        AddCommentRequest, CommentPageResponse, CommentRecord, EventSummary, LikeCommentRequest,
        LikeEventRequest, UpsertEventRequest,
    },
};
use tokio::{net::TcpListener, sync::Mutex};

use crate::config::ClientSettings;

pub const PAGE_SIZE: usize = 2;

#[derive(Clone, Default)]
pub struct MockApiState {
    pub events: Arc<Mutex<Vec<EventSummary>>>,
    pub comments: Arc<Mutex<Vec<CommentRecord>>>,
    pub hits: Arc<Mutex<HashMap<String, usize>>>,
    pub last_query: Arc<Mutex<HashMap<String, String>>>,
    pub failing_gets: Arc<AtomicUsize>,
    pub failing_comment_gets: Arc<AtomicUsize>,
    next_id: Arc<AtomicUsize>,
}

impl MockApiState {
    pub async fn hits(&self, key: &str) -> usize {
        self.hits.lock().await.get(key).copied().unwrap_or(0)
    }

    pub async fn last_query(&self, key: &str) -> Option<String> {
        self.last_query.lock().await.get(key).cloned()
    }

    pub async fn add_comments(&self, event_id: &str, count: usize) {
        let mut comments = self.comments.lock().await;
        for _ in 0..count {
            let n = self.next_id.fetch_add(1, Ordering::SeqCst);
            comments.push(CommentRecord {
                uqid: CommentId::new(format!("c{n}")),
                event_uqid: Some(EventId::from(event_id)),
                user: format!("user{n}"),
                text: format!("comment {n}"),
                created_at: Some("2024-06-01T09:00:00".into()),
                number_of_likes: Some(0),
            });
        }
    }

    pub async fn comment_likes(&self, comment_id: &str) -> Option<u64> {
        self.comments
            .lock()
            .await
            .iter()
            .find(|c| c.uqid.as_str() == comment_id)
            .and_then(|c| c.number_of_likes)
    }

    async fn record(&self, key: &str, query: Option<String>) {
        *self.hits.lock().await.entry(key.to_string()).or_default() += 1;
        if let Some(query) = query {
            self.last_query.lock().await.insert(key.to_string(), query);
        }
    }

    fn next_id(&self) -> usize {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }
}

fn seeded_state() -> MockApiState {
    let state = MockApiState {
        next_id: Arc::new(AtomicUsize::new(100)),
        ..MockApiState::default()
    };
    let events = vec![
        EventSummary {
            uqid: EventId::from("e1"),
            name: "Test Event".into(),
            description: "Pokemon Stadium Tournament".into(),
            img_link: "https://img.test/pokemon.png".into(),
            number_of_likes: 0,
            comments: Vec::new(),
            total_comments: None,
        },
        EventSummary {
            uqid: EventId::from("e2"),
            name: "Quiet Event".into(),
            description: "Nobody has said anything yet".into(),
            img_link: "https://img.test/quiet.png".into(),
            number_of_likes: 3,
            comments: Vec::new(),
            total_comments: None,
        },
    ];
    // Mirrors the server's seed comment: no timestamp, no like count.
    let comments = vec![CommentRecord {
        uqid: CommentId::from("c1"),
        event_uqid: Some(EventId::from("e1")),
        user: "First Comment".into(),
        text: "Test Comment".into(),
        created_at: None,
        number_of_likes: None,
    }];
    *state.events.try_lock().expect("fresh state") = events;
    *state.comments.try_lock().expect("fresh state") = comments;
    state
}

async fn list_events(State(state): State<MockApiState>, RawQuery(query): RawQuery) -> Response {
    state.record("GET event", query).await;
    let remaining = state.failing_gets.load(Ordering::SeqCst);
    if remaining > 0 {
        state.failing_gets.store(remaining - 1, Ordering::SeqCst);
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    Json(state.events.lock().await.clone()).into_response()
}

async fn upsert_event(
    State(state): State<MockApiState>,
    Json(request): Json<UpsertEventRequest>,
) -> Response {
    state.record("POST event", None).await;
    if request.name.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "name is required" })),
        )
            .into_response();
    }

    let mut events = state.events.lock().await;
    match request.uqid {
        Some(uqid) => match events.iter_mut().find(|e| e.uqid == uqid) {
            Some(event) => {
                event.name = request.name;
                event.description = request.description;
                event.img_link = request.img_link;
                Json(event.clone()).into_response()
            }
            None => (
                StatusCode::NOT_FOUND,
                Json(json!({ "message": "event not found" })),
            )
                .into_response(),
        },
        None => {
            let event = EventSummary {
                uqid: EventId::new(format!("e{}", state.next_id())),
                name: request.name,
                description: request.description,
                img_link: request.img_link,
                number_of_likes: 0,
                comments: Vec::new(),
                total_comments: None,
            };
            events.push(event.clone());
            Json(event).into_response()
        }
    }
}

async fn like_event(
    State(state): State<MockApiState>,
    Json(request): Json<LikeEventRequest>,
) -> Response {
    state.record("POST event/like", None).await;
    let mut events = state.events.lock().await;
    match events.iter_mut().find(|e| e.uqid == request.uqid) {
        Some(event) => {
            event.number_of_likes += 1;
            Json(json!({ "success": true })).into_response()
        }
        None => (StatusCode::NOT_FOUND, "no such event").into_response(),
    }
}

async fn list_comments(
    State(state): State<MockApiState>,
    RawQuery(raw): RawQuery,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    state.record("GET event/comments", raw).await;
    let remaining = state.failing_comment_gets.load(Ordering::SeqCst);
    if remaining > 0 {
        state
            .failing_comment_gets
            .store(remaining - 1, Ordering::SeqCst);
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    let Some(event_id) = query.get("uqid") else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "uqid is required" })),
        )
            .into_response();
    };
    let offset: usize = query
        .get("cursor")
        .and_then(|cursor| cursor.parse().ok())
        .unwrap_or(0);

    let comments: Vec<CommentRecord> = state
        .comments
        .lock()
        .await
        .iter()
        .filter(|c| c.event_uqid.as_ref().map(EventId::as_str) == Some(event_id.as_str()))
        .cloned()
        .collect();
    let end = (offset + PAGE_SIZE).min(comments.len());
    let page = comments.get(offset..end).unwrap_or_default().to_vec();
    let next_cursor = (end < comments.len()).then(|| end.to_string());

    Json(CommentPageResponse {
        comments: page,
        next_cursor,
        pagination: None,
    })
    .into_response()
}

async fn add_comment(
    State(state): State<MockApiState>,
    Json(request): Json<AddCommentRequest>,
) -> Response {
    state.record("POST event/comment", None).await;
    let comment_id = CommentId::new(format!("c{}", state.next_id()));
    state.comments.lock().await.push(CommentRecord {
        uqid: comment_id.clone(),
        event_uqid: Some(request.uqid),
        user: request.user,
        text: request.text,
        created_at: Some("2024-06-02T10:15:00".into()),
        number_of_likes: Some(0),
    });
    Json(json!({ "success": true, "comment_uqid": comment_id })).into_response()
}

async fn like_comment(
    State(state): State<MockApiState>,
    Json(request): Json<LikeCommentRequest>,
) -> Response {
    state.record("POST event/comment/like", None).await;
    let mut comments = state.comments.lock().await;
    match comments.iter_mut().find(|c| c.uqid == request.comment_uqid) {
        Some(comment) => {
            comment.number_of_likes = Some(comment.number_of_likes.unwrap_or(0) + 1);
            Json(json!({ "success": true })).into_response()
        }
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "comment not found" })),
        )
            .into_response(),
    }
}

async fn login_redirect(State(state): State<MockApiState>) -> Response {
    state.record("private", None).await;
    (StatusCode::FOUND, Json(json!({ "redirect": "/login" }))).into_response()
}

async fn broken_redirect() -> Response {
    (StatusCode::FOUND, Json(json!({}))).into_response()
}

async fn slow(State(state): State<MockApiState>) -> Response {
    state.record("GET slow", None).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    Json(json!({ "ok": true })).into_response()
}

async fn server_error() -> Response {
    StatusCode::INTERNAL_SERVER_ERROR.into_response()
}

pub async fn spawn_mock_api() -> (String, MockApiState) {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let state = seeded_state();
    let app = Router::new()
        .route("/api/event", get(list_events).post(upsert_event))
        .route("/api/event/like", post(like_event))
        .route("/api/event/comments", get(list_comments))
        .route("/api/event/comment", post(add_comment))
        .route("/api/event/comment/like", post(like_comment))
        .route("/api/private", get(login_redirect).post(login_redirect))
        .route("/api/broken-redirect", get(broken_redirect))
        .route("/api/slow", get(slow))
        .route("/api/boom", get(server_error))
        .with_state(state.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{addr}/api/"), state)
}

pub fn settings_for(api_url: &str, cache_ttl_ms: u64) -> ClientSettings {
    ClientSettings {
        api_url: api_url.to_string(),
        cache_ttl_ms,
        prefetch_comments: true,
    }
}
