//! 认证 HTTP 客户端
//! 为单个后端服务封装出站请求：自动附加 bearer 令牌，401 时刷新并重试一次
//!
//! 多个客户端实例（每个后端服务一个）必须共享同一个 RefreshCoordinator，
//! 否则服务 A 与服务 B 的并发 401 会各自触发刷新交换。

use crate::auth::session::SessionContext;
use crate::client::refresh::RefreshCoordinator;
use crate::config::HttpConfig;
use crate::error::ClientError;
use crate::storage::TokenStore;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// 出站请求描述符
/// retried 每个逻辑请求至多置位一次，保证终止性（两次 401 绝不触发第三次）
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub method: Method,
    pub path: String,
    pub body: Option<serde_json::Value>,
    retried: bool,
}

impl RequestDescriptor {
    pub fn new(method: Method, path: &str) -> Self {
        Self {
            method,
            path: path.to_string(),
            body: None,
            retried: false,
        }
    }

    pub fn get(path: &str) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: &str, body: serde_json::Value) -> Self {
        let mut desc = Self::new(Method::POST, path);
        desc.body = Some(body);
        desc
    }

    pub fn delete(path: &str) -> Self {
        Self::new(Method::DELETE, path)
    }
}

/// 绑定到单个后端服务的认证客户端
#[derive(Clone)]
pub struct AuthenticatedClient {
    http: reqwest::Client,
    base_url: String,
    store: Arc<dyn TokenStore>,
    refresher: Arc<RefreshCoordinator>,
    session: SessionContext,
}

impl AuthenticatedClient {
    /// 创建客户端；base_url 为服务基础地址，末尾斜杠会被去除
    pub fn new(
        base_url: &str,
        store: Arc<dyn TokenStore>,
        refresher: Arc<RefreshCoordinator>,
        session: SessionContext,
        http_config: &HttpConfig,
    ) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(http_config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(http_config.connect_timeout_secs))
            .build()
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            store,
            refresher,
            session,
        })
    }

    /// 执行一次请求，透明处理 401 刷新重试
    ///
    /// - 非 401 响应原样返回（包括其他错误状态，由调用方判定）
    /// - 首次 401：经协调器取得新令牌后用新 access token 重发，调用方感知不到
    /// - 已重试过的 401：返回 `Unauthorized`，会话状态不变
    /// - 刷新失败：强制登出，返回 `SessionExpired`
    /// - 超时/传输错误不参与刷新协调，直接上报
    pub async fn execute(
        &self,
        mut request: RequestDescriptor,
    ) -> Result<reqwest::Response, ClientError> {
        let request_id = Uuid::new_v4();

        let token = self.store.load().map(|pair| pair.access_token);
        let response = self.dispatch(&request, token.as_deref()).await?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        // 未携带令牌的 401 不进入刷新协议：没有会话可恢复（例如登录失败）
        if token.is_none() {
            return Ok(response);
        }

        if request.retried {
            tracing::debug!(%request_id, path = %request.path, "401 after retry, giving up");
            return Err(ClientError::Unauthorized);
        }
        request.retried = true;

        metrics::counter!("request_retries_total").increment(1);
        tracing::debug!(%request_id, path = %request.path, "401 received, refreshing session");

        match Arc::clone(&self.refresher).refreshed_access_token().await {
            Ok(access_token) => {
                let response = self.dispatch(&request, Some(&access_token)).await?;
                if response.status() == StatusCode::UNAUTHORIZED {
                    // 刷新后的令牌仍被拒：终止，绝不进入第二轮刷新
                    tracing::debug!(%request_id, path = %request.path, "retried request rejected");
                    return Err(ClientError::Unauthorized);
                }
                Ok(response)
            }
            Err(e) => {
                tracing::warn!(%request_id, error = %e, "refresh failed, terminating session");
                self.session.force_sign_out();
                Err(ClientError::SessionExpired)
            }
        }
    }

    /// 发出一次实际的 HTTP 请求
    async fn dispatch(
        &self,
        request: &RequestDescriptor,
        token: Option<&str>,
    ) -> Result<reqwest::Response, ClientError> {
        let url = format!("{}{}", self.base_url, request.path);
        let mut builder = self.http.request(request.method.clone(), &url);

        // 有令牌则附加 bearer 凭证；无令牌照常发出（未认证端点仍可用）
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        builder.send().await.map_err(ClientError::from)
    }

    /// GET 并反序列化 JSON 响应；非 2xx 映射为 `Api` 错误
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.expect_json(RequestDescriptor::get(path)).await
    }

    /// POST JSON 并反序列化响应
    pub async fn post_json<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let body = serde_json::to_value(body).map_err(|e| ClientError::Decode(e.to_string()))?;
        self.expect_json(RequestDescriptor::post(path, body)).await
    }

    async fn expect_json<T: DeserializeOwned>(
        &self,
        request: RequestDescriptor,
    ) -> Result<T, ClientError> {
        let response = self.execute(request).await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Api {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))
    }
}
