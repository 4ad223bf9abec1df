//! HTTP 客户端层
//! 认证请求封装与单飞令牌刷新协调

pub mod http;
pub mod refresh;
