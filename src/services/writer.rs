// 配置写入接口：创建与更新配置文档
//
// 调用方传入的 JSON 文本先在本地解析和校验，失败时不会发出任何请求。

use crate::core::error::{CacheError, CacheResult};
use crate::core::http::{auth_headers, build_http_client};
use crate::models::{ConfigValue, CreatedConfig, UpdatedConfig};
use crate::services::fetcher::{decode, document_url, error_reason};
use reqwest::{Client, Response};
use std::time::Duration;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// 配置写入客户端
#[derive(Debug, Clone)]
pub struct ConfigWriter {
    client: Client,
    base_url: String,
}

impl ConfigWriter {
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

    /// 创建新配置，返回服务端分配的 id 与 secret
    pub async fn create(&self, body_text: &str) -> CacheResult<CreatedConfig> {
        let body = parse_body(body_text, false)?;
        let url = format!("{}/config", self.base_url);

        tracing::debug!(url = %url, "创建配置");
        let response = self.client.post(&url).json(&body).send().await?;
        let created: CreatedConfig = unwrap_response(response).await?;

        tracing::info!(id = %created.id, "配置已创建");
        Ok(created)
    }

    /// 覆盖更新已有配置
    pub async fn update(
        &self,
        id: &str,
        secret: Option<&str>,
        body_text: &str,
    ) -> CacheResult<UpdatedConfig> {
        let body = parse_body(body_text, true)?;
        let url = document_url(&self.base_url, id);

        tracing::debug!(url = %url, "更新配置");
        let response = self
            .client
            .put(&url)
            .headers(auth_headers(secret)?)
            .json(&body)
            .send()
            .await?;
        let updated: UpdatedConfig = unwrap_response(response).await?;

        tracing::info!(id = %updated.id, "配置已更新");
        Ok(updated)
    }
}

/// 解析并校验请求体：必须是对象或对象数组；更新时不能为空
pub fn parse_body(body_text: &str, require_non_empty: bool) -> CacheResult<ConfigValue> {
    let body: ConfigValue = serde_json::from_str(body_text)?;

    let is_empty = match &body {
        ConfigValue::Object(map) => map.is_empty(),
        ConfigValue::Array(items) => {
            if !items.iter().all(ConfigValue::is_object) {
                return Err(CacheError::InvalidBody(
                    "数组中的每一项都必须是对象".to_string(),
                ));
            }
            items.is_empty()
        }
        _ => {
            return Err(CacheError::InvalidBody(
                "配置必须是 JSON 对象或对象数组".to_string(),
            ))
        }
    };

    if require_non_empty && is_empty {
        return Err(CacheError::InvalidBody("Body can not be empty.".to_string()));
    }

    Ok(body)
}

/// 非 2xx 转为 `CacheError::Http`，2xx 取出 `data`
async fn unwrap_response<T>(response: Response) -> CacheResult<T>
where
    T: serde::de::DeserializeOwned,
{
    let status = response.status();
    if !status.is_success() {
        let message = error_reason(response).await;
        return Err(CacheError::Http {
            status: status.as_u16(),
            message,
        });
    }

    let body = decode::<T>(response).await?;
    if let Some(error) = body.error {
        return Err(CacheError::Http {
            status: status.as_u16(),
            message: error.message().to_string(),
        });
    }

    body.data
        .ok_or_else(|| CacheError::Decode("响应缺少 data 字段".to_string()))
}
