//! In-process fake of the video generation service.
//!
//! Jobs advance one status per poll: `queued`, then `in_progress`, then
//! `completed` (or `failed` when the prompt contains "fail"). A prompt
//! containing "reject" is refused with 400 at submission.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::extract::{Multipart, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;

use scenechain_generation::api::{SoraApi, SoraConfig};

pub const TEST_KEY: &str = "test-key";

/// What the fake saw in one submission.
#[derive(Debug, Clone, Default)]
pub struct Submission {
    pub prompt: String,
    pub model: Option<String>,
    pub seconds: Option<String>,
    pub reference_file: Option<String>,
    pub reference_len: usize,
    pub remix_of: Option<String>,
    pub api_version: Option<String>,
}

#[derive(Debug)]
struct FakeJob {
    prompt: String,
    polls: u32,
}

#[derive(Default)]
pub struct FakeState {
    next_id: u32,
    jobs: HashMap<String, FakeJob>,
    pub submissions: Vec<Submission>,
}

pub type Shared = Arc<Mutex<FakeState>>;

pub struct FakeService {
    pub base: String,
    pub state: Shared,
}

impl FakeService {
    pub fn api(&self) -> SoraApi {
        self.api_with_key(TEST_KEY)
    }

    pub fn api_with_key(&self, key: &str) -> SoraApi {
        SoraApi::new(SoraConfig {
            endpoint: self.base.clone(),
            api_key: key.to_string(),
            api_version: "2024-12-01-preview".to_string(),
            model: "sora-2".to_string(),
        })
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.state.lock().unwrap().submissions.clone()
    }
}

/// Bind the fake on an ephemeral port and serve it in the background.
pub async fn spawn_fake() -> FakeService {
    let state: Shared = Arc::default();
    let app = Router::new()
        .route("/openai/v1/videos", post(create_video))
        .route("/openai/v1/videos/{id}", get(get_video))
        .route("/openai/v1/videos/{id}/remix", post(remix_video))
        .route("/openai/v1/videos/{id}/content", get(get_content))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    FakeService {
        base: format!("http://{addr}/"),
        state,
    }
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {TEST_KEY}"))
}

fn unauthorized() -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({"error": "bad key"}))).into_response()
}

fn enqueue(state: &Shared, submission: Submission) -> Response {
    if submission.prompt.contains("reject") {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": {"message": "prompt rejected by moderation"}})),
        )
            .into_response();
    }
    let mut st = state.lock().unwrap();
    st.next_id += 1;
    let id = format!("video_{}", st.next_id);
    st.jobs.insert(
        id.clone(),
        FakeJob {
            prompt: submission.prompt.clone(),
            polls: 0,
        },
    );
    st.submissions.push(submission);
    Json(json!({"id": id, "status": "queued"})).into_response()
}

async fn create_video(
    State(state): State<Shared>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    let mut submission = Submission {
        api_version: headers
            .get("api-version")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        ..Default::default()
    };
    while let Some(field) = multipart.next_field().await.unwrap() {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "input_reference" => {
                submission.reference_file = field.file_name().map(str::to_string);
                submission.reference_len = field.bytes().await.unwrap().len();
            }
            "prompt" => submission.prompt = field.text().await.unwrap(),
            "model" => submission.model = Some(field.text().await.unwrap()),
            "seconds" => submission.seconds = Some(field.text().await.unwrap()),
            _ => {}
        }
    }
    enqueue(&state, submission)
}

async fn remix_video(
    State(state): State<Shared>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    if !state.lock().unwrap().jobs.contains_key(&id) {
        return StatusCode::NOT_FOUND.into_response();
    }
    let submission = Submission {
        prompt: body["prompt"].as_str().unwrap_or_default().to_string(),
        remix_of: Some(id),
        ..Default::default()
    };
    enqueue(&state, submission)
}

async fn get_video(
    State(state): State<Shared>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    let mut st = state.lock().unwrap();
    let Some(job) = st.jobs.get_mut(&id) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    job.polls += 1;
    let failing = job.prompt.contains("fail");
    let body = match job.polls {
        1 => json!({"id": id, "status": "queued", "prompt": job.prompt}),
        2 => json!({"id": id, "status": "in_progress", "prompt": job.prompt}),
        _ if failing => json!({
            "id": id,
            "status": "failed",
            "prompt": job.prompt,
            "error": {"code": "content_filter", "message": "blocked by safety system"},
        }),
        _ => json!({"id": id, "status": "completed", "prompt": job.prompt}),
    };
    Json(body).into_response()
}

async fn get_content(
    State(state): State<Shared>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    let st = state.lock().unwrap();
    match st.jobs.get(&id) {
        Some(job) if job.polls >= 3 => format!("FAKE-MP4:{id}").into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}
