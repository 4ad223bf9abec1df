//! 会话上下文
//! 进程级可观察状态 { user, loading }，与令牌存储保持一致

use crate::auth::claims::Session;
use crate::error::ClientError;
use crate::storage::{TokenPair, TokenStore};
use std::sync::Arc;
use tokio::sync::watch;

/// 会话状态快照
/// loading 从 true 变为 false 之后，"是否已登录"才是可信答案
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub user: Option<Session>,
    pub loading: bool,
}

impl SessionState {
    /// 会话已确认且有用户登录
    pub fn authenticated(&self) -> bool {
        !self.loading && self.user.is_some()
    }
}

struct SessionInner {
    store: Arc<dyn TokenStore>,
    tx: watch::Sender<SessionState>,
}

/// 进程级会话上下文，可廉价克隆共享
#[derive(Clone)]
pub struct SessionContext {
    inner: Arc<SessionInner>,
}

impl SessionContext {
    /// 创建会话上下文，初始状态为 { user: None, loading: true }
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        let (tx, _) = watch::channel(SessionState {
            user: None,
            loading: true,
        });
        Self {
            inner: Arc::new(SessionInner { store, tx }),
        }
    }

    /// 订阅会话状态变化（路由守卫、UI 外壳使用）
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.tx.subscribe()
    }

    /// 获取当前状态快照
    pub fn state(&self) -> SessionState {
        self.inner.tx.borrow().clone()
    }

    /// 应用启动时从存储恢复会话
    /// 无论成功与否，结束时 loading 必为 false；重复调用无副作用
    pub fn rehydrate(&self) {
        let user = self.inner.store.load().and_then(|pair| {
            match Session::from_pair(&pair) {
                Ok(session) => Some(session),
                Err(e) => {
                    // 令牌过期或损坏：保留存储（只有登出/刷新失败才清除），
                    // 但在刷新或重新登录前不视为已登录
                    tracing::debug!(error = %e, "stored tokens not usable for session derivation");
                    None
                }
            }
        });

        if let Some(session) = &user {
            tracing::info!(user_id = %session.user_id, "session rehydrated from storage");
        }

        self.inner.tx.send_replace(SessionState {
            user,
            loading: false,
        });
    }

    /// 登录/注册/社交登录成功后安装新令牌对
    /// 同步更新会话状态，无需重新加载
    pub fn install_pair(&self, pair: TokenPair) -> Result<Session, ClientError> {
        let session = Session::from_pair(&pair)?;
        self.inner.store.save(&pair);
        self.inner.tx.send_replace(SessionState {
            user: Some(session.clone()),
            loading: false,
        });
        tracing::info!(user_id = %session.user_id, "session installed");
        Ok(session)
    }

    /// 显式登出：清空用户与存储
    pub fn sign_out(&self) {
        self.inner.store.clear();
        self.inner.tx.send_replace(SessionState {
            user: None,
            loading: false,
        });
        tracing::info!("session signed out");
    }

    /// 刷新失败后的强制登出
    /// 对用户表现为干净地回到登录页，而不是错误弹窗
    pub(crate) fn force_sign_out(&self) {
        metrics::counter!("session_forced_sign_outs_total").increment(1);
        tracing::warn!("refresh failed, forcing sign-out");
        self.sign_out();
    }
}
