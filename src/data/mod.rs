//! 缓存数据层
//!
//! # 模块组织
//!
//! - `cache`: 新鲜度记录、条目存储（订阅派发）与按键的写时复制映射

pub mod cache;
