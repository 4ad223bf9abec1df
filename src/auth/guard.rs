//! 路由守卫
//! 基于会话状态决定受保护视图的放行、等待或重定向

use crate::auth::claims::Role;
use crate::auth::session::SessionState;

/// 导航决策
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    /// 会话尚在恢复中：渲染中性等待态，不放行也不重定向
    Pending,
    /// 放行请求的视图
    Allow,
    /// 重定向到登录入口；return_to 携带原目标，登录后可回跳
    RedirectToLogin { return_to: Option<String> },
}

/// 评估一次受保护视图的导航请求
pub fn evaluate(state: &SessionState, requested_path: &str) -> RouteDecision {
    // loading 期间绝不重定向，避免恢复完成前的闪跳
    if state.loading {
        return RouteDecision::Pending;
    }

    if state.user.is_some() {
        RouteDecision::Allow
    } else {
        RouteDecision::RedirectToLogin {
            return_to: Some(requested_path.to_string()),
        }
    }
}

/// 评估需要特定角色的视图（管理后台）
/// 角色不足时重定向但不携带回跳目标
pub fn evaluate_with_role(
    state: &SessionState,
    requested_path: &str,
    required: Role,
) -> RouteDecision {
    if state.loading {
        return RouteDecision::Pending;
    }

    match &state.user {
        Some(session) if role_allows(session.role, required) => RouteDecision::Allow,
        Some(_) => RouteDecision::RedirectToLogin { return_to: None },
        None => RouteDecision::RedirectToLogin {
            return_to: Some(requested_path.to_string()),
        },
    }
}

/// admin 满足所有角色要求，user 只满足 user
fn role_allows(have: Role, need: Role) -> bool {
    need == Role::User || have == Role::Admin
}

/// 将重定向决策转换为登录入口地址
pub fn redirect_target(login_path: &str, decision: &RouteDecision) -> Option<String> {
    match decision {
        RouteDecision::RedirectToLogin {
            return_to: Some(path),
        } => Some(format!("{}?return_to={}", login_path, path)),
        RouteDecision::RedirectToLogin { return_to: None } => Some(login_path.to_string()),
        _ => None,
    }
}
