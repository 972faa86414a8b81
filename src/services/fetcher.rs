// Fetch Adapter - 配置读取接口
//
// 协调器只依赖 `FetchAdapter` trait；`HttpFetcher` 是基于 reqwest 的默认实现。
// 约定：应用层错误（未找到、未授权等）放在信封的 `error` 字段中正常返回；
// 已收到响应但响应体无法解码同样按应用层错误处理。
// 只有传输层失败（未收到完整响应）才返回 `Err`。

use crate::core::error::{CacheError, CacheResult};
use crate::core::http::{auth_headers, build_http_client};
use crate::models::{
    ApiResponse, ConfigMap, ConfigValue, DocumentEnvelope, FetchEnvelope, KeyEnvelope,
};
use async_trait::async_trait;
use reqwest::{Client, Response};
use std::time::Duration;

/// 默认请求超时
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// 配置读取接口
#[async_trait]
pub trait FetchAdapter: Send + Sync {
    /// 读取整份文档
    async fn fetch_document(&self, id: &str, secret: Option<&str>)
        -> CacheResult<DocumentEnvelope>;

    /// 读取单个键；`key` 可用 `/` 访问嵌套结构
    async fn fetch_key(&self, id: &str, key: &str, secret: Option<&str>)
        -> CacheResult<KeyEnvelope>;
}

/// 基于 HTTP 的读取实现
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    base_url: String,
}

impl HttpFetcher {
    pub fn new(base_url: impl Into<String>) -> CacheResult<Self> {
        Ok(Self::with_client(
            build_http_client(Some(DEFAULT_TIMEOUT))?,
            base_url,
        ))
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// 整份文档的请求地址
    pub fn document_url(&self, id: &str) -> String {
        document_url(&self.base_url, id)
    }

    /// 单个键的请求地址（每段路径分别编码）
    pub fn key_url(&self, id: &str, key: &str) -> CacheResult<String> {
        let segments = parse_key_path(key)?;
        let encoded: Vec<String> = segments
            .iter()
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect();
        Ok(format!(
            "{}/kv/{}",
            self.document_url(id),
            encoded.join("/")
        ))
    }
}

pub(crate) fn document_url(base_url: &str, id: &str) -> String {
    format!("{}/config/{}", base_url, urlencoding::encode(id))
}

#[async_trait]
impl FetchAdapter for HttpFetcher {
    async fn fetch_document(
        &self,
        id: &str,
        secret: Option<&str>,
    ) -> CacheResult<DocumentEnvelope> {
        let url = self.document_url(id);
        tracing::trace!(url = %url, "请求整份配置");

        let response = self
            .client
            .get(&url)
            .headers(auth_headers(secret)?)
            .send()
            .await?;

        if !response.status().is_success() {
            let reason = error_reason(response).await;
            return Ok(FetchEnvelope::error(
                ConfigMap::new(),
                format!("Failed to fetch all configs: {reason}"),
            ));
        }

        let body: ApiResponse<ConfigValue> = match decode(response).await {
            Ok(body) => body,
            Err(CacheError::Decode(reason)) => {
                return Ok(FetchEnvelope::error(
                    ConfigMap::new(),
                    format!("Failed to fetch all configs: {reason}"),
                ))
            }
            Err(err) => return Err(err),
        };
        let data = match body.data {
            Some(ConfigValue::Object(map)) => map,
            _ => ConfigMap::new(),
        };

        Ok(FetchEnvelope {
            data,
            error: body.error.map(|e| e.message().to_string()),
            metadata: body.metadata,
        })
    }

    async fn fetch_key(
        &self,
        id: &str,
        key: &str,
        secret: Option<&str>,
    ) -> CacheResult<KeyEnvelope> {
        let url = self.key_url(id, key)?;
        tracing::trace!(url = %url, key = %key, "请求配置键");

        let response = self
            .client
            .get(&url)
            .headers(auth_headers(secret)?)
            .send()
            .await?;

        if !response.status().is_success() {
            let reason = error_reason(response).await;
            return Ok(FetchEnvelope::error(
                ConfigValue::Null,
                format!("Failed to fetch config: {reason}"),
            ));
        }

        let body: ApiResponse<ConfigValue> = match decode(response).await {
            Ok(body) => body,
            Err(CacheError::Decode(reason)) => {
                return Ok(FetchEnvelope::error(
                    ConfigValue::Null,
                    format!("Failed to fetch config: {reason}"),
                ))
            }
            Err(err) => return Err(err),
        };

        Ok(FetchEnvelope {
            data: body.data.unwrap_or(ConfigValue::Null),
            error: body.error.map(|e| e.message().to_string()),
            metadata: body.metadata,
        })
    }
}

/// 解析 `/` 分隔的键路径
///
/// 空键或空段（如 `a//b`）直接拒绝，不发起请求。
pub fn parse_key_path(key: &str) -> CacheResult<Vec<&str>> {
    if key.is_empty() {
        return Err(CacheError::InvalidKey("键不能为空".to_string()));
    }

    let segments: Vec<&str> = key.split('/').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(CacheError::InvalidKey(format!("键路径包含空段: {key}")));
    }

    Ok(segments)
}

/// 解码 2xx 响应体；读取失败为 `Transport`，内容无法解析为 `Decode`
pub(crate) async fn decode<T>(response: Response) -> CacheResult<ApiResponse<T>>
where
    T: serde::de::DeserializeOwned,
{
    let text = response.text().await?;
    serde_json::from_str(&text).map_err(|e| CacheError::Decode(e.to_string()))
}

/// 非 2xx 响应的错误说明：优先使用服务端返回的 message，否则使用状态描述
pub(crate) async fn error_reason(response: Response) -> String {
    let status = response.status();
    let fallback = status
        .canonical_reason()
        .map(str::to_string)
        .unwrap_or_else(|| status.as_str().to_string());

    let text = match response.text().await {
        Ok(text) => text,
        Err(_) => return fallback,
    };

    serde_json::from_str::<ApiResponse<ConfigValue>>(&text)
        .ok()
        .and_then(|body| body.error)
        .map(|error| error.message().to_string())
        .unwrap_or(fallback)
}
