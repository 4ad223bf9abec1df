//! 配置系统
//! 从环境变量加载所有配置，带默认值与合法性校验

use config::{Config, ConfigError, Environment};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ServicesConfig {
    /// 认证服务基础地址（登录/注册/刷新端点所在）
    pub auth_base_url: String,
    /// 业务 API 基础地址（营养/餐食计划等端点所在）
    pub api_base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// 普通请求超时时间（秒）
    pub request_timeout_secs: u64,
    /// 连接建立超时时间（秒）
    pub connect_timeout_secs: u64,
    /// 刷新令牌交换超时时间（秒）
    pub refresh_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// 令牌持久化文件路径（单个 JSON 文档）
    pub token_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别: trace, debug, info, warn, error
    pub level: String,
    /// 日志格式: json, pretty
    pub format: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoutesConfig {
    /// 登录入口路径，未认证导航重定向到这里
    pub login_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    pub services: ServicesConfig,
    pub http: HttpConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
    pub routes: RoutesConfig,
}

impl ClientConfig {
    /// 从环境变量加载配置
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut settings = Config::builder();

        // 添加默认配置
        settings = settings
            .set_default("services.auth_base_url", "http://127.0.0.1:8000/auth")?
            .set_default("services.api_base_url", "http://127.0.0.1:8000/api")?
            .set_default("http.request_timeout_secs", 30)?
            .set_default("http.connect_timeout_secs", 10)?
            .set_default("http.refresh_timeout_secs", 10)?
            .set_default("storage.token_path", ".mealtrack/tokens.json")?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .set_default("routes.login_path", "/login")?;

        // 从环境变量加载配置（前缀为 MEALTRACK_）
        settings = settings.add_source(
            Environment::with_prefix("MEALTRACK")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: ClientConfig = settings.build()?.try_deserialize()?;

        // 验证配置
        config.validate()?;

        Ok(config)
    }

    /// 验证配置合法性
    fn validate(&self) -> Result<(), ConfigError> {
        // 验证服务地址
        for (name, url) in [
            ("services.auth_base_url", &self.services.auth_base_url),
            ("services.api_base_url", &self.services.api_base_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ConfigError::Message(format!(
                    "{} must start with http:// or https://",
                    name
                )));
            }
        }

        // 验证超时时间
        for (name, secs) in [
            ("http.request_timeout_secs", self.http.request_timeout_secs),
            ("http.connect_timeout_secs", self.http.connect_timeout_secs),
            ("http.refresh_timeout_secs", self.http.refresh_timeout_secs),
        ] {
            if secs < 1 || secs > 300 {
                return Err(ConfigError::Message(format!(
                    "{} must be between 1 and 300 seconds",
                    name
                )));
            }
        }

        // 验证令牌存储路径
        if self.storage.token_path.is_empty() {
            return Err(ConfigError::Message(
                "storage.token_path must not be empty".to_string(),
            ));
        }

        // 验证日志级别
        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::Message(format!(
                    "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                    self.logging.level
                )))
            }
        }

        // 验证日志格式
        match self.logging.format.to_lowercase().as_str() {
            "json" | "pretty" => {}
            _ => {
                return Err(ConfigError::Message(format!(
                    "Invalid log format: {}. Must be one of: json, pretty",
                    self.logging.format
                )))
            }
        }

        // 验证登录入口路径
        if !self.routes.login_path.starts_with('/') {
            return Err(ConfigError::Message(
                "routes.login_path must start with '/'".to_string(),
            ));
        }

        Ok(())
    }
}
