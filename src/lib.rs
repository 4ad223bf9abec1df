//! mealtrack 客户端核心库
//! 提供会话与令牌刷新层：令牌存储、认证 HTTP 客户端、单飞刷新协调、会话上下文与路由守卫

pub mod api;
pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod storage;
pub mod telemetry;
