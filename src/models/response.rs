// json.cf 接口的响应信封与写入结果

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::state::{ConfigMap, ConfigValue};

/// 响应元数据
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseMetadata {
    /// 服务端时间戳（毫秒）
    #[serde(default)]
    pub timestamp: i64,
}

impl ResponseMetadata {
    pub fn now() -> Self {
        Self {
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    /// 转换为 UTC 时间
    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.timestamp).single()
    }
}

/// 服务端统一响应格式
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    #[serde(default)]
    pub success: bool,
    pub data: Option<T>,
    #[serde(default)]
    pub error: Option<ApiErrorBody>,
    #[serde(default)]
    pub metadata: ResponseMetadata,
}

/// 错误字段：服务端可能返回字符串，也可能返回 `{ message }` 对象
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ApiErrorBody {
    Message(String),
    Detailed {
        message: String,
        #[serde(default)]
        code: Option<String>,
    },
}

impl ApiErrorBody {
    pub fn message(&self) -> &str {
        match self {
            ApiErrorBody::Message(msg) => msg,
            ApiErrorBody::Detailed { message, .. } => message,
        }
    }
}

/// Fetch Adapter 返回的信封：应用层错误放在 `error` 字段中，而不是作为 `Err` 抛出
#[derive(Debug, Clone, PartialEq)]
pub struct FetchEnvelope<T> {
    pub data: T,
    pub error: Option<String>,
    pub metadata: ResponseMetadata,
}

impl<T> FetchEnvelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            data,
            error: None,
            metadata: ResponseMetadata::now(),
        }
    }

    pub fn error(data: T, message: impl Into<String>) -> Self {
        Self {
            data,
            error: Some(message.into()),
            metadata: ResponseMetadata::now(),
        }
    }
}

/// 整份文档的响应信封
pub type DocumentEnvelope = FetchEnvelope<ConfigMap>;

/// 单个键的响应信封
pub type KeyEnvelope = FetchEnvelope<ConfigValue>;

/// 配置的创建/更新时间
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigMetadata {
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// `POST /config` 的返回数据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatedConfig {
    pub id: String,
    pub secret: String,
    pub config: ConfigValue,
    pub metadata: ConfigMetadata,
}

/// `PUT /config/{id}` 的返回数据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdatedConfig {
    pub id: String,
    pub config: ConfigValue,
    pub metadata: ConfigMetadata,
}
