//! 认证模块
//! 令牌声明解码、会话上下文与路由守卫

pub mod claims;
pub mod guard;
pub mod session;
