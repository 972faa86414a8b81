// 单个键的惰性只读视图

use crate::data::cache::{KeyState, Subscription};
use crate::models::ConfigValue;
use crate::services::coordinator::ConfigCache;
use std::sync::atomic::{AtomicBool, Ordering};

/// 构造时不发请求；首次读取且该键没有记录、也不新鲜时，
/// 在下一个调度轮次安排一次 `request_key`，读取本身从不阻塞。
#[derive(Debug)]
pub struct KeyView {
    cache: ConfigCache,
    key: String,
    accessed: AtomicBool,
}

impl KeyView {
    pub(crate) fn new(cache: ConfigCache, key: String) -> Self {
        Self {
            cache,
            key,
            accessed: AtomicBool::new(false),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// 当前状态
    pub fn state(&self) -> KeyState {
        if !self.accessed.swap(true, Ordering::AcqRel) {
            self.schedule_fetch();
        }
        self.cache.key_snapshot(&self.key)
    }

    pub fn data(&self) -> Option<ConfigValue> {
        self.state().data
    }

    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&KeyState) + Send + Sync + 'static,
    {
        self.cache.subscribe_key(&self.key, listener)
    }

    fn schedule_fetch(&self) {
        if self.cache.has_key_entry(&self.key) || self.cache.is_key_fresh(&self.key) {
            return;
        }

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let cache = self.cache.clone();
                let key = self.key.clone();
                tracing::trace!(key = %key, "安排惰性请求");
                handle.spawn(async move { cache.request_key(&key).await });
            }
            Err(_) => {
                // 没有运行时：下次读取再试
                tracing::warn!(key = %self.key, "当前不在 tokio 运行时中，无法安排请求");
                self.accessed.store(false, Ordering::Release);
            }
        }
    }
}
