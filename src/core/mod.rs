// 核心基础设施层：错误类型、日志、HTTP 客户端

pub mod error;
pub mod http;
pub mod logger;

pub use error::{CacheError, CacheResult};
pub use http::{auth_headers, build_http_client, SECRET_HEADER};
pub use logger::{init_logger, update_log_level};
