//! 统一错误模型
//! 定义客户端各层共享的错误类型和用户可见消息映射

use thiserror::Error;

/// 客户端错误类型
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Service responded with status {status}")]
    Api { status: u16, body: String },

    #[error("Authorization failed")]
    Unauthorized,

    #[error("Session expired")]
    SessionExpired,

    #[error("Token decode error: {0}")]
    Decode(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ClientError {
    /// 该错误是否意味着用户已被登出
    pub fn is_signed_out(&self) -> bool {
        matches!(self, ClientError::SessionExpired)
    }

    /// 获取用户友好的错误消息（不包含敏感信息，认证失败不暴露 HTTP 细节）
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Transport(_) | ClientError::Timeout => {
                "Network error, please try again".to_string()
            }
            ClientError::Api { .. } => "The service is currently unavailable".to_string(),
            ClientError::Unauthorized | ClientError::SessionExpired => {
                "You are signed out, please sign in again".to_string()
            }
            ClientError::Decode(_) => "Unexpected response from the service".to_string(),
            ClientError::Config(msg) => msg.clone(),
        }
    }
}

/// 从 reqwest 错误转换：超时与传输错误分开归类
impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ClientError::Timeout
        } else {
            ClientError::Transport(e.to_string())
        }
    }
}

/// 从 config::ConfigError 转换
impl From<config::ConfigError> for ClientError {
    fn from(e: config::ConfigError) -> Self {
        ClientError::Config(e.to_string())
    }
}
