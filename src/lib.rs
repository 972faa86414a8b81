// lib.rs - json.cf 客户端：带新鲜窗口与订阅的配置缓存

pub mod core; // 核心基础设施层
pub mod data; // 缓存数据层
pub mod models;
pub mod services;

pub use models::*;

// 导出核心模块
pub use crate::core::{init_logger, update_log_level, CacheError, CacheResult, SECRET_HEADER};

// 导出缓存与服务
pub use data::cache::{EntryId, EntryStore, KeyMap, KeyState, KeyedStore, Subscription};
pub use services::{ConfigCache, ConfigWriter, FetchAdapter, HttpFetcher, KeyView};
