// tests/common/mod.rs
pub use axum::Router;
pub use serde_json::json;
pub use tokio::task::JoinHandle;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::Json;
use parking_lot::Mutex;
use serde_json::Value;

use crate::auth::api::AuthApi;
use crate::auth::executor::RequestExecutor;
use crate::auth::notifier::AuthStateNotifier;
use crate::config::settings::{ApiConfig, SettingsConfig};
use crate::store::credential_store::CredentialStore;

/// Spawn an Axum router on an ephemeral port and return (JoinHandle, SocketAddr)
pub async fn spawn_axum(router: Router) -> (JoinHandle<()>, SocketAddr) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind failed");
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.expect("server failed");
    });
    (handle, addr)
}

pub fn settings_for(base_url: &str) -> SettingsConfig {
    SettingsConfig {
        api: ApiConfig::new(base_url),
        endpoints: Default::default(),
        storage: Default::default(),
        logging: None,
    }
}

pub fn build_executor(
    base_url: &str,
    store: Arc<CredentialStore>,
    notifier: Arc<dyn AuthStateNotifier>,
) -> RequestExecutor {
    RequestExecutor::from_settings(&settings_for(base_url), store, notifier).expect("executor")
}

pub fn build_auth_api(
    base_url: &str,
    store: Arc<CredentialStore>,
    notifier: Arc<dyn AuthStateNotifier>,
) -> AuthApi {
    AuthApi::from_settings(&settings_for(base_url), store, notifier).expect("auth api")
}

/// ================================
/// In-process fake of the remote api
///
/// tokens are numbered by generation: A<n> / R<n>; every refresh rotates to n+1
/// and invalidates the previous refresh token
/// ================================
#[derive(Default)]
pub struct FakeState {
    generation: AtomicU32,
    valid_access: Mutex<String>,
    valid_refresh: Mutex<String>,
    users: Mutex<HashMap<String, String>>,
    refresh_fails: AtomicBool,
    reject_access: AtomicBool,
    refresh_delay_ms: AtomicU64,
    pub refresh_calls: AtomicUsize,
    pub resource_calls: AtomicUsize,
    pub logout_calls: AtomicUsize,
    pub seen_authorization: Mutex<Vec<String>>,
}

pub struct FakeApi {
    pub base_url: String,
    pub state: Arc<FakeState>,
    handle: JoinHandle<()>,
}

impl FakeApi {
    pub async fn start() -> Self {
        let state = Arc::new(FakeState::default());
        let router = Router::new()
            .route("/auth/login", post(login))
            .route("/auth/register", post(register))
            .route("/auth/refresh", post(refresh))
            .route("/auth/logout", post(logout))
            .route("/user", get(current_user))
            .route("/transactions", post(create_transaction))
            .route("/analytics", get(broken))
            .with_state(state.clone());
        let (handle, addr) = spawn_axum(router).await;

        Self {
            base_url: format!("http://{}", addr),
            state,
            handle,
        }
    }

    /// Server side session of generation `n`: accepts A<n>, refreshes R<n>
    pub fn issue(&self, n: u32) {
        self.state.generation.store(n, Ordering::SeqCst);
        *self.state.valid_access.lock() = format!("A{}", n);
        *self.state.valid_refresh.lock() = format!("R{}", n);
    }

    /// Current access token stops being accepted, the refresh token stays valid
    pub fn expire_access(&self) {
        self.state.valid_access.lock().clear();
    }

    pub fn revoke_refresh(&self) {
        self.state.refresh_fails.store(true, Ordering::SeqCst);
    }

    /// No access token is accepted anymore, refreshes keep succeeding
    pub fn reject_every_access(&self) {
        self.state.reject_access.store(true, Ordering::SeqCst);
    }

    pub fn delay_refresh(&self, delay: Duration) {
        self.state.refresh_delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn add_user(&self, username: &str, password: &str) {
        self.state.users.lock().insert(username.to_owned(), password.to_owned());
    }

    pub fn refresh_calls(&self) -> usize {
        self.state.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn resource_calls(&self) -> usize {
        self.state.resource_calls.load(Ordering::SeqCst)
    }

    pub fn seen_authorization(&self) -> Vec<String> {
        self.state.seen_authorization.lock().clone()
    }
}

impl Drop for FakeApi {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn bearer_is_valid(state: &FakeState, headers: &HeaderMap) -> bool {
    let header = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_owned();
    state.seen_authorization.lock().push(header.clone());

    let valid = state.valid_access.lock().clone();
    !state.reject_access.load(Ordering::SeqCst) && !valid.is_empty() && header == format!("Bearer {}", valid)
}

fn unauthorized() -> (StatusCode, Json<Value>) {
    (StatusCode::UNAUTHORIZED, Json(json!({"detail": "Could not validate credentials"})))
}

async fn login(State(state): State<Arc<FakeState>>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    let username = body["username"].as_str().unwrap_or_default();
    let password = body["password"].as_str().unwrap_or_default();
    if state.users.lock().get(username).map(String::as_str) != Some(password) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"detail": "Incorrect username or password"})));
    }

    let n = state.generation.fetch_add(1, Ordering::SeqCst) + 1;
    *state.valid_access.lock() = format!("A{}", n);
    *state.valid_refresh.lock() = format!("R{}", n);
    (
        StatusCode::OK,
        Json(json!({"access_token": format!("A{}", n), "refresh_token": format!("R{}", n)})),
    )
}

async fn register(State(state): State<Arc<FakeState>>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    let username = body["username"].as_str().unwrap_or_default().to_owned();
    let password = body["password"].as_str().unwrap_or_default().to_owned();
    if username.is_empty() || password.is_empty() {
        return (StatusCode::UNPROCESSABLE_ENTITY, Json(json!({"detail": "username and password required"})));
    }

    let mut users = state.users.lock();
    if users.contains_key(&username) {
        return (StatusCode::BAD_REQUEST, Json(json!({"detail": "User already exists"})));
    }
    users.insert(username, password);
    (StatusCode::CREATED, Json(json!({})))
}

async fn refresh(State(state): State<Arc<FakeState>>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    state.refresh_calls.fetch_add(1, Ordering::SeqCst);
    let delay = state.refresh_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }

    let presented = body["refresh"].as_str().unwrap_or_default().to_owned();
    let mut valid_refresh = state.valid_refresh.lock();
    if state.refresh_fails.load(Ordering::SeqCst) || valid_refresh.is_empty() || *valid_refresh != presented {
        return (StatusCode::UNAUTHORIZED, Json(json!({"detail": "Token is expired"})));
    }

    // rotation: the presented refresh token is spent
    let n = state.generation.fetch_add(1, Ordering::SeqCst) + 1;
    *valid_refresh = format!("R{}", n);
    *state.valid_access.lock() = format!("A{}", n);
    (
        StatusCode::OK,
        Json(json!({"access": format!("A{}", n), "refresh": format!("R{}", n)})),
    )
}

async fn logout(State(state): State<Arc<FakeState>>, headers: HeaderMap) -> (StatusCode, Json<Value>) {
    if !bearer_is_valid(&state, &headers) {
        return unauthorized();
    }
    state.logout_calls.fetch_add(1, Ordering::SeqCst);
    state.valid_access.lock().clear();
    state.valid_refresh.lock().clear();
    (StatusCode::OK, Json(json!({})))
}

async fn current_user(State(state): State<Arc<FakeState>>, headers: HeaderMap) -> (StatusCode, Json<Value>) {
    state.resource_calls.fetch_add(1, Ordering::SeqCst);
    if !bearer_is_valid(&state, &headers) {
        return unauthorized();
    }
    (StatusCode::OK, Json(json!({"username": "alice"})))
}

async fn create_transaction(
    State(state): State<Arc<FakeState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    state.resource_calls.fetch_add(1, Ordering::SeqCst);
    if !bearer_is_valid(&state, &headers) {
        return unauthorized();
    }
    if body["amount"].as_f64().map(|amount| amount <= 0.0).unwrap_or(true) {
        return (StatusCode::UNPROCESSABLE_ENTITY, Json(json!({"detail": "amount must be positive"})));
    }
    (StatusCode::CREATED, Json(json!({"id": 1, "amount": body["amount"]})))
}

async fn broken(State(state): State<Arc<FakeState>>, headers: HeaderMap) -> (StatusCode, Json<Value>) {
    state.resource_calls.fetch_add(1, Ordering::SeqCst);
    if !bearer_is_valid(&state, &headers) {
        return unauthorized();
    }
    (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"detail": "boom"})))
}

/// Records every notifier call
#[derive(Default)]
pub struct RecordingNotifier {
    pub events: Mutex<Vec<&'static str>>,
}

impl RecordingNotifier {
    pub fn events(&self) -> Vec<&'static str> {
        self.events.lock().clone()
    }
}

impl AuthStateNotifier for RecordingNotifier {
    fn on_session_established(&self) {
        self.events.lock().push("established");
    }

    fn on_session_cleared(&self) {
        self.events.lock().push("cleared");
    }
}
