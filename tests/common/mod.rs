//! 测试公共模块
//! 提供伪造后端服务与客户端组装辅助函数

#![allow(dead_code)]

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use jsonwebtoken::{encode, EncodingKey, Header};
use mealtrack_client::auth::claims::{Claims, Role};
use mealtrack_client::auth::session::SessionContext;
use mealtrack_client::client::http::AuthenticatedClient;
use mealtrack_client::client::refresh::RefreshCoordinator;
use mealtrack_client::config::HttpConfig;
use mealtrack_client::storage::{MemoryTokenStore, TokenPair, TokenStore};
use serde_json::json;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// 伪造后端状态
/// accepted_access 是当前唯一会被受保护端点放行的 access token
pub struct FakeBackend {
    pub refresh_calls: AtomicUsize,
    pub profile_calls: AtomicUsize,
    pub accepted_access: Mutex<String>,
    pub current_refresh: Mutex<String>,
    /// 下一次刷新要下发的令牌对；None 时自动生成 access-N/refresh-N
    pub next_pair: Mutex<Option<(String, String)>>,
    /// 刷新端点返回的状态码（200 为正常轮换）
    pub refresh_status: Mutex<u16>,
    /// 刷新端点人为延迟，用于拉宽单飞窗口
    pub refresh_delay_ms: AtomicU64,
    /// 受保护端点无条件返回 401（模拟刷新后仍被拒）
    pub force_unauthorized: AtomicBool,
}

impl FakeBackend {
    pub fn new(accepted_access: &str, current_refresh: &str) -> Arc<Self> {
        Arc::new(Self {
            refresh_calls: AtomicUsize::new(0),
            profile_calls: AtomicUsize::new(0),
            accepted_access: Mutex::new(accepted_access.to_string()),
            current_refresh: Mutex::new(current_refresh.to_string()),
            next_pair: Mutex::new(None),
            refresh_status: Mutex::new(200),
            refresh_delay_ms: AtomicU64::new(0),
            force_unauthorized: AtomicBool::new(false),
        })
    }
}

/// 启动伪造后端，返回基础地址
/// 认证服务挂在 /auth 下，业务 API 挂在 /api 下
pub async fn spawn_backend(state: Arc<FakeBackend>) -> String {
    let app = Router::new()
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(me))
        .route("/api/profile", get(profile))
        .route("/api/public", get(public))
        .route("/api/slow", get(slow))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind fake backend");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("fake backend died");
    });

    format!("http://{}", addr)
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|s| s.to_string())
}

async fn login(
    State(state): State<Arc<FakeBackend>>,
    Json(body): Json<serde_json::Value>,
) -> (StatusCode, Json<serde_json::Value>) {
    let email = body.get("email").and_then(|v| v.as_str()).unwrap_or_default();
    let password = body
        .get("password")
        .and_then(|v| v.as_str())
        .unwrap_or_default();

    if password != "Secret123" {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "bad credentials"})));
    }

    let role = if email.starts_with("admin@") {
        Role::Admin
    } else {
        Role::User
    };
    let access = mint_access_token("user-42", role, 3600);
    let refresh_token = "refresh-login-1".to_string();

    *state.accepted_access.lock().unwrap() = access.clone();
    *state.current_refresh.lock().unwrap() = refresh_token.clone();

    (
        StatusCode::OK,
        Json(json!({
            "access_token": access,
            "refresh_token": refresh_token,
            "user": {
                "id": "user-42",
                "email": email,
                "display_name": "Test User",
                "role": if role == Role::Admin { "admin" } else { "user" },
            }
        })),
    )
}

async fn refresh(
    State(state): State<Arc<FakeBackend>>,
    Json(body): Json<serde_json::Value>,
) -> (StatusCode, Json<serde_json::Value>) {
    let call = state.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;

    let delay = state.refresh_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }

    let status = *state.refresh_status.lock().unwrap();
    if status != 200 {
        return (
            StatusCode::from_u16(status).unwrap(),
            Json(json!({"error": "refresh token revoked"})),
        );
    }

    let presented = body
        .get("refresh_token")
        .and_then(|v| v.as_str())
        .unwrap_or_default();
    let expected = state.current_refresh.lock().unwrap().clone();
    if presented != expected {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "unknown refresh token"})),
        );
    }

    // 刷新令牌轮换：旧对作废，下发新对
    let (access, refresh_token) = state
        .next_pair
        .lock()
        .unwrap()
        .take()
        .unwrap_or((format!("access-{}", call), format!("refresh-{}", call)));
    *state.accepted_access.lock().unwrap() = access.clone();
    *state.current_refresh.lock().unwrap() = refresh_token.clone();

    (
        StatusCode::OK,
        Json(json!({"access_token": access, "refresh_token": refresh_token})),
    )
}

async fn logout(State(_state): State<Arc<FakeBackend>>) -> StatusCode {
    StatusCode::OK
}

async fn me(
    State(state): State<Arc<FakeBackend>>,
    headers: HeaderMap,
) -> (StatusCode, Json<serde_json::Value>) {
    let accepted = state.accepted_access.lock().unwrap().clone();
    match bearer(&headers) {
        Some(token) if token == accepted => (
            StatusCode::OK,
            Json(json!({
                "id": "user-42",
                "email": "user@example.com",
                "display_name": "Test User",
                "role": "user",
            })),
        ),
        _ => (StatusCode::UNAUTHORIZED, Json(json!({"error": "unauthorized"}))),
    }
}

async fn profile(
    State(state): State<Arc<FakeBackend>>,
    headers: HeaderMap,
) -> (StatusCode, Json<serde_json::Value>) {
    state.profile_calls.fetch_add(1, Ordering::SeqCst);

    if state.force_unauthorized.load(Ordering::SeqCst) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "unauthorized"})));
    }

    let accepted = state.accepted_access.lock().unwrap().clone();
    match bearer(&headers) {
        Some(token) if token == accepted => (
            StatusCode::OK,
            Json(json!({"ok": true, "daily_calories": 2100})),
        ),
        _ => (StatusCode::UNAUTHORIZED, Json(json!({"error": "unauthorized"}))),
    }
}

async fn public() -> (StatusCode, Json<serde_json::Value>) {
    (StatusCode::OK, Json(json!({"motd": "eat your greens"})))
}

async fn slow() -> (StatusCode, Json<serde_json::Value>) {
    tokio::time::sleep(Duration::from_secs(3)).await;
    (StatusCode::OK, Json(json!({"ok": true})))
}

/// 铸造一个结构合法的 access token（客户端不校验签名）
pub fn mint_access_token(sub: &str, role: Role, exp_offset_secs: i64) -> String {
    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        sub: sub.to_string(),
        role: Some(role),
        email: None,
        exp: now + exp_offset_secs,
        iat: now,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(b"test-only-secret"),
    )
    .unwrap()
}

/// 测试用 HTTP 配置：短超时
pub fn test_http_config() -> HttpConfig {
    HttpConfig {
        request_timeout_secs: 1,
        connect_timeout_secs: 1,
        refresh_timeout_secs: 1,
    }
}

/// 组装好的客户端栈：共享存储、会话上下文与刷新协调器
pub struct TestStack {
    pub store: Arc<MemoryTokenStore>,
    pub session: SessionContext,
    pub refresher: Arc<RefreshCoordinator>,
    base_url: String,
}

impl TestStack {
    /// 基于伪造后端地址组装客户端栈
    pub fn new(base_url: &str) -> Self {
        let store = Arc::new(MemoryTokenStore::new());
        let store_dyn: Arc<dyn TokenStore> = store.clone();
        let session = SessionContext::new(store_dyn.clone());
        let refresher = Arc::new(RefreshCoordinator::new(
            &format!("{}/auth", base_url),
            store_dyn,
            reqwest::Client::new(),
            Duration::from_secs(1),
        ));
        Self {
            store,
            session,
            refresher,
            base_url: base_url.to_string(),
        }
    }

    /// 预置一个存储中的令牌对
    pub fn seed(&self, access: &str, refresh: &str) {
        self.store.save(&TokenPair {
            access_token: access.to_string(),
            refresh_token: refresh.to_string(),
        });
    }

    /// 绑定业务 API 服务的客户端
    pub fn api_client(&self) -> AuthenticatedClient {
        AuthenticatedClient::new(
            &format!("{}/api", self.base_url),
            self.store.clone(),
            self.refresher.clone(),
            self.session.clone(),
            &test_http_config(),
        )
        .unwrap()
    }

    /// 绑定认证服务的客户端
    pub fn auth_client(&self) -> AuthenticatedClient {
        AuthenticatedClient::new(
            &format!("{}/auth", self.base_url),
            self.store.clone(),
            self.refresher.clone(),
            self.session.clone(),
            &test_http_config(),
        )
        .unwrap()
    }
}
