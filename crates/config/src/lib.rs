//! 统一配置中心
//!
//! 提供应用的全局配置管理，包括：
//! - 服务监听地址
//! - 房间 TTL 策略与消息限制
//! - 过期清理任务
//! - 事件总线容量
//! - 匿名身份持久化
//!
//! 加载顺序（后者覆盖前者）：内置默认值 → YAML 文件 → `ECHO_` 前缀的环境变量。

use std::path::PathBuf;

use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// 指定配置文件路径的环境变量
pub const CONFIG_PATH_ENV: &str = "ECHO_CONFIG";
/// 默认配置文件路径（不存在时忽略）
pub const DEFAULT_CONFIG_PATH: &str = "echo.yaml";
/// 环境变量前缀，嵌套字段用 `__` 分隔，例如 `ECHO_SERVER__PORT`
pub const ENV_PREFIX: &str = "ECHO_";

/// 全局应用配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// 服务配置
    pub server: ServerConfig,
    /// 房间与消息配置
    pub rooms: RoomsConfig,
    /// 过期清理配置
    pub sweeper: SweeperConfig,
    /// 事件总线配置
    pub event_bus: EventBusConfig,
    /// 匿名身份配置
    pub identity: IdentityConfig,
    /// 日志配置
    pub log: LogConfig,
}

/// 服务器配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// 房间与消息配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomsConfig {
    /// 允许的房间存活时长（秒）
    pub allowed_ttl_seconds: Vec<u32>,
    /// 拉取历史消息的默认条数
    pub default_history_limit: u32,
    /// 拉取历史消息的上限
    pub max_history_limit: u32,
    /// 每个房间最多保留的消息数，超出后淘汰最旧的
    pub max_messages_per_room: usize,
    /// 单条消息最大字符数
    pub max_content_chars: usize,
}

impl Default for RoomsConfig {
    fn default() -> Self {
        Self {
            allowed_ttl_seconds: vec![300, 600, 900, 1800],
            default_history_limit: 50,
            max_history_limit: 200,
            max_messages_per_room: 1000,
            max_content_chars: 4000,
        }
    }
}

/// 过期清理配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweeperConfig {
    pub enabled: bool,
    pub interval_seconds: u64,
    /// 过期多久之后彻底删除房间记录
    pub purge_after_seconds: u64,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_seconds: 30,
            purge_after_seconds: 3600,
        }
    }
}

/// 事件总线配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventBusConfig {
    /// 每个主题缓冲的事件数，慢订阅者落后超过该值会丢弃最旧的事件
    pub capacity: usize,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self { capacity: 256 }
    }
}

/// 匿名身份配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// 持久化匿名 id 的文件；为空时只在进程内保存
    pub path: Option<PathBuf>,
}

/// 日志配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `RUST_LOG` 未设置时使用的过滤级别
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// 组合配置来源
    pub fn figment(path: impl Into<PathBuf>) -> Figment {
        Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Yaml::file(path.into()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// 从默认来源加载配置，配置文件路径可由 `ECHO_CONFIG` 指定
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
        Self::load_from(Self::figment(path))
    }

    pub fn load_from(figment: Figment) -> Result<Self, ConfigError> {
        let config: AppConfig = figment.extract().map_err(Box::new)?;
        config.validate()?;
        Ok(config)
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rooms.allowed_ttl_seconds.is_empty() {
            return Err(ConfigError::InvalidRoomsConfig(
                "allowed_ttl_seconds cannot be empty".to_string(),
            ));
        }

        if self.rooms.allowed_ttl_seconds.contains(&0) {
            return Err(ConfigError::InvalidRoomsConfig(
                "allowed_ttl_seconds must be positive".to_string(),
            ));
        }

        if self.rooms.default_history_limit == 0 || self.rooms.max_history_limit == 0 {
            return Err(ConfigError::InvalidRoomsConfig(
                "history limits must be greater than 0".to_string(),
            ));
        }

        if self.rooms.default_history_limit > self.rooms.max_history_limit {
            return Err(ConfigError::InvalidRoomsConfig(
                "default_history_limit cannot exceed max_history_limit".to_string(),
            ));
        }

        if self.rooms.max_messages_per_room == 0 || self.rooms.max_content_chars == 0 {
            return Err(ConfigError::InvalidRoomsConfig(
                "message limits must be greater than 0".to_string(),
            ));
        }

        if self.event_bus.capacity == 0 {
            return Err(ConfigError::InvalidEventBusConfig(
                "capacity must be greater than 0".to_string(),
            ));
        }

        if self.sweeper.interval_seconds == 0 {
            return Err(ConfigError::InvalidSweeperConfig(
                "interval_seconds must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// 服务监听地址
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// 配置错误类型
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),
    #[error("Invalid rooms configuration: {0}")]
    InvalidRoomsConfig(String),
    #[error("Invalid event bus configuration: {0}")]
    InvalidEventBusConfig(String),
    #[error("Invalid sweeper configuration: {0}")]
    InvalidSweeperConfig(String),
}
