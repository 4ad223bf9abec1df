//! 认证服务 API
//! 登录、注册、社交登录与个人信息端点的类型化封装

use crate::auth::claims::{Role, Session};
use crate::auth::session::SessionContext;
use crate::client::http::{AuthenticatedClient, RequestDescriptor};
use crate::error::ClientError;
use crate::storage::TokenPair;
use serde::{Deserialize, Serialize};

/// 登录凭证
#[derive(Debug, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// 注册请求
#[derive(Debug, Serialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

/// 社交登录请求
#[derive(Debug, Serialize)]
pub struct SocialLoginRequest {
    pub provider: String,
    pub id_token: String,
}

/// 认证成功响应：初始令牌对 + 用户信息
#[derive(Debug, Deserialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user: UserProfile,
}

/// 用户信息（"who am I" 端点返回的完整档案）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub display_name: Option<String>,
    pub role: Role,
}

/// 认证服务客户端
/// 所有请求走 AuthenticatedClient，因此 me() 同样参与刷新协议
pub struct AuthApi {
    client: AuthenticatedClient,
    session: SessionContext,
}

impl AuthApi {
    pub fn new(client: AuthenticatedClient, session: SessionContext) -> Self {
        Self { client, session }
    }

    /// 登录；成功后安装令牌对并同步更新会话
    pub async fn login(
        &self,
        credentials: &Credentials,
    ) -> Result<(Session, UserProfile), ClientError> {
        let response: AuthResponse = self.client.post_json("/login", credentials).await?;
        self.install(response)
    }

    /// 注册；成功响应与登录一致
    pub async fn register(
        &self,
        request: &RegisterRequest,
    ) -> Result<(Session, UserProfile), ClientError> {
        let response: AuthResponse = self.client.post_json("/register", request).await?;
        self.install(response)
    }

    /// 社交登录
    pub async fn social_login(
        &self,
        request: &SocialLoginRequest,
    ) -> Result<(Session, UserProfile), ClientError> {
        let response: AuthResponse = self.client.post_json("/social", request).await?;
        self.install(response)
    }

    /// 获取当前用户完整档案（令牌声明不够用时的补水端点）
    pub async fn me(&self) -> Result<UserProfile, ClientError> {
        self.client.get_json("/me").await
    }

    /// 登出：尽力通知服务端作废刷新令牌，然后清理本地会话
    pub async fn logout(&self) {
        if let Err(e) = self
            .client
            .execute(RequestDescriptor::post("/logout", serde_json::json!({})))
            .await
        {
            tracing::debug!(error = %e, "server-side logout failed, clearing local session anyway");
        }
        self.session.sign_out();
    }

    fn install(&self, response: AuthResponse) -> Result<(Session, UserProfile), ClientError> {
        let session = self.session.install_pair(TokenPair {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
        })?;
        Ok((session, response.user))
    }
}
