#![allow(dead_code)]

use axum::Router;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Json;
use serde_json::{Value, json};
use std::io::Write;
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::net::TcpListener;

use wa_console::api::events::UiEvent;
use wa_console::ui::main_window::MainWindow;

pub const GOOD_TOKEN: &str = "good-token";
pub const SLOW_CONVERSATION: &str = "c-slow";

#[derive(Debug, Default)]
pub struct Recorded {
    /// "METHOD path" per request, in arrival order.
    pub hits: Vec<String>,
    pub auth: Vec<Option<String>>,
    pub text_messages: Vec<Value>,
    pub campaign_bodies: Vec<Value>,
    pub campaigns: Vec<Value>,
}

impl Recorded {
    pub fn count(&self, hit: &str) -> usize {
        self.hits.iter().filter(|h| h.as_str() == hit).count()
    }
}

#[derive(Clone)]
struct Fake {
    recorded: Arc<Mutex<Recorded>>,
    require_token: bool,
}

impl Fake {
    fn record(&self, hit: String, headers: &HeaderMap) -> bool {
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let ok = !self.require_token || auth.as_deref() == Some(format!("Bearer {GOOD_TOKEN}").as_str());
        let mut recorded = self.recorded.lock().unwrap();
        recorded.hits.push(hit);
        recorded.auth.push(auth);
        ok
    }
}

fn unauthorized() -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({"detail": "Token inválido"}))).into_response()
}

pub fn conversations() -> Value {
    json!([
        {"id": "c1", "wa_id": "5511900000001", "name": "Maria", "last_message_text": "oi", "unread_count": 2},
        {"id": "c2", "wa_id": "5521988887777", "name": null, "last_message_text": null},
        {"id": SLOW_CONVERSATION, "wa_id": "5531900000003", "name": "Slow Sam"}
    ])
}

async fn list_conversations(State(fake): State<Fake>, headers: HeaderMap) -> Response {
    if !fake.record("GET /api/conversations".into(), &headers) {
        return unauthorized();
    }
    Json(conversations()).into_response()
}

async fn list_messages(State(fake): State<Fake>, Path(id): Path<String>, headers: HeaderMap) -> Response {
    if !fake.record(format!("GET /api/conversations/{id}/messages"), &headers) {
        return unauthorized();
    }
    if id == SLOW_CONVERSATION {
        tokio::time::sleep(Duration::from_millis(400)).await;
    }
    Json(json!([
        {"id": "m1", "conversation_id": id, "direction": "incoming", "type": "text",
         "text": format!("hello from {id}"), "status": "received", "timestamp": "2024-05-01T10:15:00"},
        {"id": "m2", "conversation_id": id, "direction": "outgoing", "type": "text",
         "text": "reply", "status": "sent", "timestamp": "2024-05-01T10:16:00.250000"}
    ]))
    .into_response()
}

async fn send_text(State(fake): State<Fake>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if !fake.record("POST /api/messages/text".into(), &headers) {
        return unauthorized();
    }
    let failing = body["message"] == "fail";
    fake.recorded.lock().unwrap().text_messages.push(body);
    if failing {
        return (StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded").into_response();
    }
    Json(json!({"id": "m9", "direction": "outgoing", "timestamp": "2024-05-01T10:20:00"})).into_response()
}

async fn create_campaign(State(fake): State<Fake>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if !fake.record("POST /api/campaigns".into(), &headers) {
        return unauthorized();
    }
    let mut recorded = fake.recorded.lock().unwrap();
    recorded.campaign_bodies.push(body.clone());
    if body["name"] == "boom" {
        return (StatusCode::UNPROCESSABLE_ENTITY, "Informe template_name OU message_text.").into_response();
    }
    let total = body["to_numbers"].as_array().map(Vec::len).unwrap_or(0);
    let campaign = json!({
        "id": format!("k{}", recorded.campaigns.len() + 1),
        "name": body["name"],
        "phone_number_id": body["phone_number_id"],
        "status": "pending",
        "sent": 0,
        "total": total,
        "failed": 0,
        "created_at": "2024-11-29T08:30:00"
    });
    recorded.campaigns.push(campaign.clone());
    Json(campaign).into_response()
}

async fn list_campaigns(State(fake): State<Fake>, headers: HeaderMap) -> Response {
    if !fake.record("GET /api/campaigns".into(), &headers) {
        return unauthorized();
    }
    let campaigns = fake.recorded.lock().unwrap().campaigns.clone();
    Json(Value::Array(campaigns)).into_response()
}

async fn list_items(State(fake): State<Fake>, Path(id): Path<String>, headers: HeaderMap) -> Response {
    if !fake.record(format!("GET /api/campaigns/{id}/items"), &headers) {
        return unauthorized();
    }
    Json(json!([
        {"id": "i1", "campaign_id": id, "to": "5511900000001", "status": "sent"},
        {"id": "i2", "campaign_id": id, "to": "5511900000002", "status": "failed", "error_message": "not on WhatsApp"}
    ]))
    .into_response()
}

async fn login(State(fake): State<Fake>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    fake.record("POST /api/auth/login".into(), &headers);
    if body["email"] == "ops@example.com" && body["password"] == "secret" {
        Json(json!({"access_token": GOOD_TOKEN})).into_response()
    } else {
        (StatusCode::UNAUTHORIZED, Json(json!({"detail": "Email ou senha inválidos"}))).into_response()
    }
}

/// Starts the fake API on an ephemeral port. Returns its base URL.
pub async fn spawn_server(require_token: bool) -> (String, Arc<Mutex<Recorded>>) {
    let recorded = Arc::new(Mutex::new(Recorded::default()));
    let fake = Fake { recorded: recorded.clone(), require_token };
    let app = Router::new()
        .route("/api/conversations", get(list_conversations))
        .route("/api/conversations/{id}/messages", get(list_messages))
        .route("/api/messages/text", post(send_text))
        .route("/api/campaigns", get(list_campaigns).post(create_campaign))
        .route("/api/campaigns/{id}/items", get(list_items))
        .route("/api/auth/login", post(login))
        .with_state(fake);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app.into_make_service())
            .await
            .expect("fake api server failed");
    });
    (format!("http://{addr}"), recorded)
}

/// Feeds events into the window until `done` matches one (that event is
/// applied too).
pub fn pump_until<W: Write>(
    window: &mut MainWindow<W>,
    rx: &Receiver<UiEvent>,
    mut done: impl FnMut(&UiEvent) -> bool,
) {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let remaining = deadline
            .checked_duration_since(Instant::now())
            .expect("timed out waiting for event");
        let event = rx.recv_timeout(remaining).expect("timed out waiting for event");
        let stop = done(&event);
        window.handle_event(event).unwrap();
        if stop {
            return;
        }
    }
}

/// Applies whatever arrives within `wait`.
pub fn pump_for<W: Write>(window: &mut MainWindow<W>, rx: &Receiver<UiEvent>, wait: Duration) {
    let deadline = Instant::now() + wait;
    while let Some(remaining) = deadline.checked_duration_since(Instant::now()) {
        match rx.recv_timeout(remaining) {
            Ok(event) => {
                window.handle_event(event).unwrap();
            }
            Err(_) => return,
        }
    }
}

pub fn output(window: &MainWindow<Vec<u8>>) -> String {
    String::from_utf8_lossy(window.output()).into_owned()
}
