//! 缓存层实现
//!
//! - `freshness`: 新鲜度记录（每个条目最后一次完成请求的时间 + 统一 TTL）
//! - `store`: 单条目状态存储与订阅派发
//! - `keyed`: 按键的写时复制状态映射

pub mod freshness;
pub mod keyed;
pub mod store;

pub use freshness::{EntryId, FreshnessTracker};
pub use keyed::{KeyMap, KeyState, KeyedStore};
pub use store::{EntryStore, Subscription};
