//! 新鲜度记录
//!
//! 记录每个缓存条目（整份文档或单个键）最后一次完成请求的时间，
//! 并根据统一的 TTL 判断条目是否仍在新鲜窗口内。
//!
//! 没有记录表示“从未获取，必须获取”。
//! 时间取自 `tokio::time::Instant`，测试中可用暂停时钟推进时间。

use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

/// 缓存条目标识
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntryId {
    /// 整份文档
    Document,
    /// 单个键（字面键路径）
    Key(String),
}

impl EntryId {
    pub fn key(key: impl Into<String>) -> Self {
        EntryId::Key(key.into())
    }
}

impl std::fmt::Display for EntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryId::Document => f.write_str("<document>"),
            EntryId::Key(key) => f.write_str(key),
        }
    }
}

/// 新鲜度记录表
///
/// 仅由协调器私有持有，允许原地修改。
#[derive(Debug)]
pub struct FreshnessTracker {
    stamps: HashMap<EntryId, Instant>,
    ttl: Duration,
}

impl FreshnessTracker {
    pub fn new(ttl: Duration) -> Self {
        Self {
            stamps: HashMap::new(),
            ttl,
        }
    }

    /// 以当前时间标记条目
    pub fn stamp(&mut self, id: EntryId) {
        self.stamp_at(id, Instant::now());
    }

    pub fn stamp_at(&mut self, id: EntryId, at: Instant) {
        self.stamps.insert(id, at);
    }

    /// 条目是否仍新鲜：`now - last < ttl`
    pub fn is_fresh(&self, id: &EntryId) -> bool {
        self.is_fresh_at(id, Instant::now())
    }

    pub fn is_fresh_at(&self, id: &EntryId, now: Instant) -> bool {
        self.stamps
            .get(id)
            .map(|at| now.saturating_duration_since(*at) < self.ttl)
            .unwrap_or(false)
    }

    pub fn has_record(&self, id: &EntryId) -> bool {
        self.stamps.contains_key(id)
    }

    pub fn last_fetched(&self, id: &EntryId) -> Option<Instant> {
        self.stamps.get(id).copied()
    }

    /// 删除单个条目的记录，返回是否存在
    pub fn clear(&mut self, id: &EntryId) -> bool {
        self.stamps.remove(id).is_some()
    }

    pub fn clear_all(&mut self) {
        self.stamps.clear();
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn len(&self) -> usize {
        self.stamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stamps.is_empty()
    }
}
