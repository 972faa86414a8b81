// 缓存实例配置：每个配置文档（一个 id）对应一份

use crate::core::error::{CacheError, CacheResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// 默认服务地址
pub const DEFAULT_BASE_URL: &str = "https://api.json.cf";

/// 默认新鲜窗口（毫秒）
pub const DEFAULT_CACHE_TIMEOUT_MS: u64 = 60_000;

/// 环境变量名
pub const ENV_ID: &str = "JSONCF_ID";
pub const ENV_SECRET: &str = "JSONCF_SECRET";
pub const ENV_BASE_URL: &str = "JSONCF_BASE_URL";
pub const ENV_CACHE_TIMEOUT_MS: &str = "JSONCF_CACHE_TIMEOUT_MS";

/// 缓存配置
///
/// `id` 与 `base_url` 在缓存实例生命周期内不可变；
/// `cache_timeout` 同时作用于整份文档和所有单键条目。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheOptions {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    #[serde(default = "default_base_url", alias = "baseUrl")]
    pub base_url: String,
    #[serde(
        rename = "cache_timeout_ms",
        alias = "cacheTimeout",
        default = "default_cache_timeout",
        with = "duration_ms"
    )]
    pub cache_timeout: Duration,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_cache_timeout() -> Duration {
    Duration::from_millis(DEFAULT_CACHE_TIMEOUT_MS)
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

impl CacheOptions {
    /// 使用默认服务地址和新鲜窗口创建配置
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            secret: None,
            base_url: default_base_url(),
            cache_timeout: default_cache_timeout(),
        }
    }

    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_cache_timeout(mut self, timeout: Duration) -> Self {
        self.cache_timeout = timeout;
        self
    }

    /// 从 JSON 或 TOML 文件加载（按扩展名判断格式）
    pub fn from_file(path: &Path) -> CacheResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| CacheError::io(path, e))?;

        let options: CacheOptions = match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => toml::from_str(&content)?,
            Some("json") => serde_json::from_str(&content)?,
            other => {
                return Err(CacheError::Config(format!(
                    "不支持的配置文件格式: {}",
                    other.unwrap_or("<无扩展名>")
                )))
            }
        };

        options.normalized()
    }

    /// 从环境变量加载
    ///
    /// `JSONCF_ID` 必填，其余可选。
    pub fn from_env() -> CacheResult<Self> {
        let id = std::env::var(ENV_ID)
            .map_err(|_| CacheError::Config(format!("环境变量 {ENV_ID} 未设置")))?;

        let mut options = Self::new(id);

        if let Ok(secret) = std::env::var(ENV_SECRET) {
            if !secret.is_empty() {
                options.secret = Some(secret);
            }
        }
        if let Ok(base_url) = std::env::var(ENV_BASE_URL) {
            options.base_url = base_url;
        }
        if let Ok(raw) = std::env::var(ENV_CACHE_TIMEOUT_MS) {
            let ms: u64 = raw.trim().parse().map_err(|_| {
                CacheError::Config(format!("{ENV_CACHE_TIMEOUT_MS} 不是有效的毫秒数: {raw}"))
            })?;
            options.cache_timeout = Duration::from_millis(ms);
        }

        options.normalized()
    }

    /// 校验并规范化（去掉 base_url 末尾的 `/`）
    pub fn normalized(mut self) -> CacheResult<Self> {
        let trimmed = self.base_url.trim_end_matches('/').to_string();
        self.base_url = trimmed;
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> CacheResult<()> {
        if self.id.trim().is_empty() {
            return Err(CacheError::Config("配置 id 不能为空".to_string()));
        }

        let parsed = url::Url::parse(&self.base_url)
            .map_err(|e| CacheError::Config(format!("base_url 无效: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(CacheError::Config(format!(
                "base_url 仅支持 http/https: {}",
                self.base_url
            )));
        }

        Ok(())
    }
}
