//! 统一错误类型定义
//!
//! 使用 `thiserror` 定义客户端的所有错误类型。
//!
//! 注意：缓存协调器的 `request_*` / `refresh_*` / `invalidate_*` 不返回错误，
//! 失败统一转换为条目状态中的 `error` 字段；只有 Fetch Adapter、写入接口、
//! 配置加载和一次性读取接口会返回 `CacheError`。

use std::path::PathBuf;
use thiserror::Error;

/// 客户端统一错误类型
#[derive(Error, Debug)]
pub enum CacheError {
    /// 传输层错误（未收到响应）
    #[error("网络请求失败: {0}")]
    Transport(#[from] reqwest::Error),

    /// 响应体无法解码
    #[error("响应解析失败: {0}")]
    Decode(String),

    /// 本地 JSON 输入无法解析
    #[error("JSON 解析错误: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// 请求体不符合要求
    #[error("请求体无效: {0}")]
    InvalidBody(String),

    /// 无效的键路径
    #[error("无效的键路径: {0}")]
    InvalidKey(String),

    /// 服务端返回的非 2xx 响应
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// 配置错误
    #[error("配置错误: {0}")]
    Config(String),

    /// 文件 I/O 错误
    #[error("文件 I/O 错误: {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// TOML 反序列化错误
    #[error("TOML 反序列化错误: {0}")]
    TomlDeserialization(#[from] toml::de::Error),

    /// 请求始终未收到响应（一次性读取接口使用）
    #[error("配置服务不可达: {0}")]
    Unreachable(String),

    /// 缓存实例已释放，订阅通道关闭
    #[error("缓存已关闭")]
    Closed,
}

/// 便于与现有代码集成的类型别名
pub type CacheResult<T> = std::result::Result<T, CacheError>;

impl CacheError {
    /// 从 `std::io::Error` 和路径创建 I/O 错误
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// 是否为传输层错误（未收到响应，可立即重试）
    ///
    /// `Decode` 表示响应已到达但内容无效，不算传输层错误。
    pub fn is_transport(&self) -> bool {
        matches!(self, CacheError::Transport(_) | CacheError::Unreachable(_))
    }
}
