//! 刷新协调器
//! 全局单飞：任意数量客户端、任意数量并发失败请求，同一时刻至多一次刷新交换
//!
//! 多数后端在刷新令牌首次使用后即作废，若 N 个并发 401 各自发起刷新，
//! 只有第一个会成功，其余都会导致误登出。单飞是本子系统的核心正确性性质。

use crate::storage::{TokenPair, TokenStore};
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;

/// 刷新失败原因
/// 需要 Clone：所有等待者共享同一个结果
#[derive(Debug, Clone, Error)]
pub enum RefreshError {
    #[error("no refresh token in storage")]
    MissingToken,

    #[error("refresh exchange rejected with status {0}")]
    Rejected(u16),

    #[error("refresh exchange transport failure: {0}")]
    Transport(String),
}

type RefreshFuture = Shared<BoxFuture<'static, Result<String, RefreshError>>>;

/// 在途刷新操作：id 用于完成后校验槽位归属
struct Inflight {
    id: u64,
    fut: RefreshFuture,
}

/// 刷新令牌交换请求体
#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

/// 单飞刷新协调器
/// 状态机：Idle（槽位为空）/ Refreshing（槽位持有共享操作）
pub struct RefreshCoordinator {
    http: reqwest::Client,
    refresh_url: String,
    store: Arc<dyn TokenStore>,
    timeout: Duration,
    inflight: Mutex<Option<Inflight>>,
    next_id: AtomicU64,
}

impl RefreshCoordinator {
    /// 创建协调器，刷新端点为 `{auth_base_url}/refresh`
    pub fn new(
        auth_base_url: &str,
        store: Arc<dyn TokenStore>,
        http: reqwest::Client,
        timeout: Duration,
    ) -> Self {
        Self {
            http,
            refresh_url: format!("{}/refresh", auth_base_url.trim_end_matches('/')),
            store,
            timeout,
            inflight: Mutex::new(None),
            next_id: AtomicU64::new(0),
        }
    }

    /// 获取一个有效的 access token
    ///
    /// Idle 时发起唯一一次刷新交换；Refreshing 时附着到同一在途操作。
    /// 成功：新令牌对已写入存储，所有等待者获得同一个新 access token。
    /// 失败：存储已清空，所有等待者获得同一个失败。刷新本身不重试。
    pub async fn refreshed_access_token(self: Arc<Self>) -> Result<String, RefreshError> {
        let (id, fut) = {
            let mut slot = self.inflight.lock().await;
            match slot.as_ref() {
                Some(inflight) => (inflight.id, inflight.fut.clone()),
                None => {
                    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                    let this = Arc::clone(&self);
                    let fut = async move { this.run_exchange().await }.boxed().shared();
                    *slot = Some(Inflight {
                        id,
                        fut: fut.clone(),
                    });
                    (id, fut)
                }
            }
        };

        let result = fut.await;

        // 回到 Idle：只清除仍属于本轮的槽位，避免误清后来者开启的新一轮
        let mut slot = self.inflight.lock().await;
        if slot.as_ref().map(|inflight| inflight.id) == Some(id) {
            *slot = None;
        }
        drop(slot);

        result
    }

    /// 执行一次刷新令牌交换（每个协调周期仅一次，结果是决定性的）
    async fn run_exchange(&self) -> Result<String, RefreshError> {
        metrics::counter!("token_refresh_total").increment(1);

        let Some(pair) = self.store.load() else {
            metrics::counter!("token_refresh_failures_total").increment(1);
            tracing::warn!("refresh requested without stored refresh token");
            return Err(RefreshError::MissingToken);
        };

        let response = self
            .http
            .post(&self.refresh_url)
            .timeout(self.timeout)
            .json(&RefreshRequest {
                refresh_token: &pair.refresh_token,
            })
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                // 刷新过程中的超时/断网与被拒同样致命：会话终止
                self.fail_closed();
                return Err(RefreshError::Transport(e.to_string()));
            }
        };

        let status = response.status();
        if !status.is_success() {
            self.fail_closed();
            tracing::warn!(status = status.as_u16(), "refresh token rejected");
            return Err(RefreshError::Rejected(status.as_u16()));
        }

        match response.json::<TokenPair>().await {
            Ok(new_pair) => {
                // 刷新令牌轮换：响应中的 refresh token 整体替换旧令牌对
                self.store.save(&new_pair);
                tracing::debug!("access token refreshed");
                Ok(new_pair.access_token)
            }
            Err(e) => {
                self.fail_closed();
                Err(RefreshError::Transport(e.to_string()))
            }
        }
    }

    fn fail_closed(&self) {
        metrics::counter!("token_refresh_failures_total").increment(1);
        self.store.clear();
    }
}
