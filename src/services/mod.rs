// 服务层模块
//
// - fetcher: 配置读取接口（FetchAdapter）及 HTTP 实现
// - coordinator: 缓存协调器（新鲜度、去重、失效、订阅）
// - key_view: 单个键的惰性视图
// - writer: 配置创建与更新

pub mod coordinator;
pub mod fetcher;
pub mod key_view;
pub mod writer;

#[cfg(test)]
pub(crate) mod testing;

pub use coordinator::ConfigCache;
pub use fetcher::{parse_key_path, FetchAdapter, HttpFetcher};
pub use key_view::KeyView;
pub use writer::{parse_body, ConfigWriter};
