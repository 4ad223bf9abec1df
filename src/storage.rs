//! 令牌存储
//! 持久化 access/refresh 令牌对；存储不可用时回退为"未登录"，绝不向上抛错

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// 访问令牌 + 刷新令牌对
/// 不变量：两个字段要么同时存在，要么同时不存在（由整体读写保证）
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

// 手动实现 Debug，防止令牌泄露到日志
impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

/// 令牌存储接口
/// 单写者约定：只有 SessionContext 和 RefreshCoordinator 调用 save/clear，
/// AuthenticatedClient 只读
pub trait TokenStore: Send + Sync {
    /// 整体保存一对令牌
    fn save(&self, pair: &TokenPair);

    /// 读取当前令牌对；不存在或存储失败时返回 None
    fn load(&self) -> Option<TokenPair>;

    /// 清空存储（登出或刷新失败）
    fn clear(&self);
}

/// 基于单个 JSON 文件的持久化存储
/// 文件不存在 ≡ 未登录
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl TokenStore for FileTokenStore {
    fn save(&self, pair: &TokenPair) {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                if let Err(e) = std::fs::create_dir_all(parent) {
                    tracing::warn!(error = %e, "failed to create token storage directory");
                    return;
                }
            }
        }

        match serde_json::to_vec(pair) {
            Ok(bytes) => {
                if let Err(e) = std::fs::write(&self.path, bytes) {
                    tracing::warn!(error = %e, "failed to persist token pair");
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialize token pair");
            }
        }
    }

    fn load(&self) -> Option<TokenPair> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(error = %e, "token storage unavailable, treating as logged out");
                return None;
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(pair) => Some(pair),
            Err(e) => {
                tracing::warn!(error = %e, "stored token pair is corrupt, treating as logged out");
                None
            }
        }
    }

    fn clear(&self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(error = %e, "failed to clear token storage");
            }
        }
    }
}

/// 内存存储，用于测试
#[derive(Default)]
pub struct MemoryTokenStore {
    inner: Mutex<Option<TokenPair>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryTokenStore {
    fn save(&self, pair: &TokenPair) {
        *self.inner.lock().unwrap() = Some(pair.clone());
    }

    fn load(&self) -> Option<TokenPair> {
        self.inner.lock().unwrap().clone()
    }

    fn clear(&self) {
        *self.inner.lock().unwrap() = None;
    }
}
