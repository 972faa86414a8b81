use crate::core::error::{CacheError, CacheResult};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Client;
use std::time::Duration;

const USER_AGENT: &str = concat!("jsoncf-rust/", env!("CARGO_PKG_VERSION"));

/// 私有配置读取接口校验的请求头
pub const SECRET_HEADER: &str = "x-config-secret";

/// 构建 HTTP 客户端
///
/// 超时属于传输层职责，缓存协调器自身不设截止时间。
pub fn build_http_client(timeout: Option<Duration>) -> CacheResult<Client> {
    let mut builder = Client::builder()
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(10));

    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }

    builder.build().map_err(CacheError::Transport)
}

/// 构建鉴权请求头
///
/// 配置了 secret 时同时发送 `Authorization: Bearer` 与 `x-config-secret`。
pub fn auth_headers(secret: Option<&str>) -> CacheResult<HeaderMap> {
    let mut headers = HeaderMap::new();

    if let Some(secret) = secret.filter(|s| !s.is_empty()) {
        let bearer = HeaderValue::from_str(&format!("Bearer {secret}"))
            .map_err(|e| CacheError::Config(format!("secret 含有非法字符: {e}")))?;
        let raw = HeaderValue::from_str(secret)
            .map_err(|e| CacheError::Config(format!("secret 含有非法字符: {e}")))?;
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(SECRET_HEADER, raw);
    }

    Ok(headers)
}
