// Cache Coordinator - 配置缓存协调器
//
// 决定何时请求、去重在途请求、维护新鲜窗口，并把结果写入条目存储。
//
// 并发约定：
// - 守卫判断与“进入加载状态”在同一把状态锁内完成，之后才发起请求
// - 锁顺序固定为 条目状态 -> 新鲜度 -> 不可达集合，不会反向获取
// - 请求一旦发出就会完成并落地；失效/刷新不会取消在途请求，
//   后到的响应会覆盖先到的响应（不按发起时间排序）

use crate::core::error::{CacheError, CacheResult};
use crate::data::cache::store::lock;
use crate::data::cache::{
    EntryId, EntryStore, FreshnessTracker, KeyMap, KeyState, KeyedStore, Subscription,
};
use crate::models::{
    AggregateState, CacheOptions, ConfigMap, ConfigValue, FetchEnvelope, FetchState,
    UpdatedConfig,
};
use crate::services::fetcher::{FetchAdapter, HttpFetcher};
use crate::services::key_view::KeyView;
use crate::services::writer::ConfigWriter;
use futures_util::future::join_all;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// 跳过请求的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Skip {
    Fresh,
    InFlight,
}

/// 一次请求的结果分类
enum Outcome<T> {
    /// 正常返回且无错误
    Data(T),
    /// 应用层错误，或本地拒绝（如无效键）；计入新鲜度
    Rejected(String),
    /// 传输层失败：不计入新鲜度，下次立即重试
    Unreachable(String),
}

impl<T> Outcome<T> {
    fn classify(result: CacheResult<FetchEnvelope<T>>) -> Self {
        match result {
            Ok(FetchEnvelope {
                error: Some(message),
                ..
            }) => Outcome::Rejected(message),
            Ok(envelope) => Outcome::Data(envelope.data),
            Err(err) if err.is_transport() => Outcome::Unreachable(err.to_string()),
            Err(err) => Outcome::Rejected(err.to_string()),
        }
    }

    fn error_message(&self) -> Option<&str> {
        match self {
            Outcome::Data(_) => None,
            Outcome::Rejected(message) | Outcome::Unreachable(message) => Some(message),
        }
    }
}

struct CacheInner {
    options: CacheOptions,
    adapter: Arc<dyn FetchAdapter>,
    writer: Option<ConfigWriter>,
    document: EntryStore<AggregateState>,
    keys: KeyedStore,
    freshness: Mutex<FreshnessTracker>,
    /// 最近一次因传输层失败而结束的条目
    unreachable: Mutex<HashSet<EntryId>>,
}

/// 单个配置文档的缓存实例
///
/// 克隆得到的是同一实例的句柄，状态共享。
///
/// ```rust,ignore
/// let cache = ConfigCache::new(CacheOptions::new("abc").with_secret("s3cret"))?;
/// let _sub = cache.subscribe_key("feature/beta", |state| println!("{state:?}"));
/// cache.request_key("feature/beta").await;
/// ```
#[derive(Clone)]
pub struct ConfigCache {
    inner: Arc<CacheInner>,
}

impl std::fmt::Debug for ConfigCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigCache")
            .field("id", &self.inner.options.id)
            .field("base_url", &self.inner.options.base_url)
            .field("cache_timeout", &self.inner.options.cache_timeout)
            .field("keys", &self.inner.keys.snapshot().len())
            .finish()
    }
}

impl ConfigCache {
    /// 使用 HTTP 读取实现创建缓存
    pub fn new(options: CacheOptions) -> CacheResult<Self> {
        let options = options.normalized()?;
        let fetcher = HttpFetcher::new(options.base_url.clone())?;
        let writer = ConfigWriter::new(options.base_url.clone())?;
        Ok(Self::with_parts(options, Arc::new(fetcher), Some(writer)))
    }

    /// 使用自定义读取实现创建缓存（不支持写入）
    pub fn with_adapter(options: CacheOptions, adapter: Arc<dyn FetchAdapter>) -> Self {
        Self::with_parts(options, adapter, None)
    }

    pub fn with_parts(
        options: CacheOptions,
        adapter: Arc<dyn FetchAdapter>,
        writer: Option<ConfigWriter>,
    ) -> Self {
        tracing::debug!(
            id = %options.id,
            cache_timeout_ms = options.cache_timeout.as_millis() as u64,
            "创建配置缓存"
        );
        let freshness = FreshnessTracker::new(options.cache_timeout);
        Self {
            inner: Arc::new(CacheInner {
                options,
                adapter,
                writer,
                document: EntryStore::new(AggregateState::default()),
                keys: KeyedStore::new(),
                freshness: Mutex::new(freshness),
                unreachable: Mutex::new(HashSet::new()),
            }),
        }
    }

    pub fn options(&self) -> &CacheOptions {
        &self.inner.options
    }

    fn secret(&self) -> Option<&str> {
        self.inner.options.secret.as_deref()
    }

    fn is_fresh(&self, id: &EntryId) -> bool {
        lock(&self.inner.freshness).is_fresh(id)
    }

    /// 请求完成：更新新鲜度与不可达记录
    ///
    /// 调用方持有该条目的状态锁。
    fn record_outcome<T>(&self, id: &EntryId, outcome: &Outcome<T>) {
        let unreachable = matches!(outcome, Outcome::Unreachable(_));
        if !unreachable {
            lock(&self.inner.freshness).stamp(id.clone());
        }

        let mut set = lock(&self.inner.unreachable);
        if unreachable {
            set.insert(id.clone());
        } else {
            set.remove(id);
        }
    }

    fn forget(&self, id: &EntryId) {
        lock(&self.inner.freshness).clear(id);
        lock(&self.inner.unreachable).remove(id);
    }

    // ==================== 整份文档 ====================

    /// 确保整份文档新鲜：已新鲜或已有原地刷新在途时直接返回
    pub async fn request_document(&self) {
        let mut skipped = None;
        self.inner.document.update(|current| {
            if self.is_fresh(&EntryId::Document) {
                skipped = Some(Skip::Fresh);
                return None;
            }
            if current.loading && current.data.is_some() {
                skipped = Some(Skip::InFlight);
                return None;
            }
            Some(current.begin_loading())
        });

        if let Some(reason) = skipped {
            tracing::debug!(id = %self.inner.options.id, reason = ?reason, "跳过文档请求");
            return;
        }

        tracing::debug!(id = %self.inner.options.id, "请求整份配置");
        let result = self
            .inner
            .adapter
            .fetch_document(&self.inner.options.id, self.secret())
            .await;
        self.complete_document(Outcome::classify(result));
    }

    fn complete_document(&self, outcome: Outcome<ConfigMap>) {
        if let Some(message) = outcome.error_message() {
            tracing::warn!(id = %self.inner.options.id, error = %message, "整份配置请求失败");
        }

        self.inner.document.update(|current| {
            self.record_outcome(&EntryId::Document, &outcome);
            Some(match &outcome {
                Outcome::Data(data) => AggregateState::ready(data.clone()),
                Outcome::Rejected(message) | Outcome::Unreachable(message) => {
                    current.failed(message.clone())
                }
            })
        });
    }

    /// 清除新鲜度并把文档状态重置为空；不取消在途请求
    pub fn invalidate_document(&self) {
        self.inner.document.update(|_| {
            self.forget(&EntryId::Document);
            Some(AggregateState::cleared())
        });
        tracing::info!(id = %self.inner.options.id, "整份配置缓存已失效");
    }

    /// 强制重新获取整份文档，期间保留旧数据
    pub async fn refresh_document(&self) {
        lock(&self.inner.freshness).clear(&EntryId::Document);
        tracing::info!(id = %self.inner.options.id, "刷新整份配置");
        self.request_document().await;
    }

    pub fn document_snapshot(&self) -> AggregateState {
        self.inner.document.snapshot()
    }

    pub fn is_document_fresh(&self) -> bool {
        self.is_fresh(&EntryId::Document)
    }

    pub fn subscribe_document<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&AggregateState) + Send + Sync + 'static,
    {
        self.inner.document.subscribe(listener)
    }

    // ==================== 单个键 ====================

    /// 确保单个键新鲜：该键已在加载或仍新鲜时直接返回
    pub async fn request_key(&self, key: &str) {
        let id = EntryId::key(key);
        let mut skipped = None;
        self.inner.keys.update_entry(key, |current| {
            if current.map(|state| state.loading).unwrap_or(false) {
                skipped = Some(Skip::InFlight);
                return None;
            }
            if self.is_fresh(&id) {
                skipped = Some(Skip::Fresh);
                return None;
            }
            Some(current.cloned().unwrap_or_default().begin_loading())
        });

        if let Some(reason) = skipped {
            tracing::debug!(key = %key, reason = ?reason, "跳过键请求");
            return;
        }

        tracing::debug!(id = %self.inner.options.id, key = %key, "请求配置键");
        let result = self
            .inner
            .adapter
            .fetch_key(&self.inner.options.id, key, self.secret())
            .await;
        self.complete_key(key, &id, Outcome::classify(result));
    }

    fn complete_key(&self, key: &str, id: &EntryId, outcome: Outcome<ConfigValue>) {
        if let Some(message) = outcome.error_message() {
            tracing::warn!(key = %key, error = %message, "配置键请求失败");
        }

        self.inner.keys.update_entry(key, |current| {
            self.record_outcome(id, &outcome);
            Some(match &outcome {
                Outcome::Data(value) => KeyState::ready(value.clone()),
                Outcome::Rejected(message) | Outcome::Unreachable(message) => {
                    current.cloned().unwrap_or_default().failed(message.clone())
                }
            })
        });
    }

    /// 并发请求多个键
    pub async fn request_keys(&self, keys: &[&str]) {
        join_all(keys.iter().map(|key| self.request_key(key))).await;
    }

    /// 删除单个键的缓存与新鲜度记录，其他键不受影响
    pub fn invalidate_key(&self, key: &str) {
        self.forget(&EntryId::key(key));
        self.inner.keys.remove_entry(key);
        tracing::info!(key = %key, "配置键缓存已失效");
    }

    pub async fn refresh_key(&self, key: &str) {
        lock(&self.inner.freshness).clear(&EntryId::key(key));
        tracing::info!(key = %key, "刷新配置键");
        self.request_key(key).await;
    }

    /// 单个键的状态，没有记录时为空状态
    pub fn key_snapshot(&self, key: &str) -> KeyState {
        self.inner.keys.state(key)
    }

    /// 所有键的状态快照
    pub fn keys_snapshot(&self) -> Arc<KeyMap> {
        self.inner.keys.snapshot()
    }

    pub fn is_key_fresh(&self, key: &str) -> bool {
        self.is_fresh(&EntryId::key(key))
    }

    pub(crate) fn has_key_entry(&self, key: &str) -> bool {
        self.inner.keys.contains(key)
    }

    pub fn subscribe_key<F>(&self, key: &str, listener: F) -> Subscription
    where
        F: Fn(&KeyState) + Send + Sync + 'static,
    {
        self.inner.keys.subscribe_key(key, listener)
    }

    pub fn subscribe_keys<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&Arc<KeyMap>) + Send + Sync + 'static,
    {
        self.inner.keys.subscribe(listener)
    }

    /// 单个键的惰性视图：首次读取时才安排请求
    pub fn key_view(&self, key: impl Into<String>) -> KeyView {
        KeyView::new(self.clone(), key.into())
    }

    // ==================== 一次性读取 ====================

    /// 请求单个键并等待其加载结束
    ///
    /// 应用层错误以 `error` 字段返回；请求未收到响应时返回 `CacheError::Unreachable`。
    pub async fn get(&self, key: &str) -> CacheResult<KeyState> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let subscription = self.subscribe_key(key, move |state: &KeyState| {
            if state.is_settled() {
                let _ = tx.send(state.clone());
            }
        });

        self.request_key(key).await;

        let current = self.key_snapshot(key);
        let settled = if current.is_settled() {
            current
        } else {
            rx.recv().await.ok_or(CacheError::Closed)?
        };
        subscription.unsubscribe();

        self.settle(&EntryId::key(key), settled)
    }

    /// 请求整份文档并等待其加载结束
    pub async fn get_document(&self) -> CacheResult<AggregateState> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let subscription = self.subscribe_document(move |state: &AggregateState| {
            if state.is_settled() {
                let _ = tx.send(state.clone());
            }
        });

        self.request_document().await;

        let current = self.document_snapshot();
        let settled = if current.is_settled() {
            current
        } else {
            rx.recv().await.ok_or(CacheError::Closed)?
        };
        subscription.unsubscribe();

        self.settle(&EntryId::Document, settled)
    }

    fn settle<T>(&self, id: &EntryId, state: FetchState<T>) -> CacheResult<FetchState<T>> {
        match &state.error {
            Some(message) if lock(&self.inner.unreachable).contains(id) => {
                Err(CacheError::Unreachable(message.clone()))
            }
            _ => Ok(state),
        }
    }

    // ==================== 写入 ====================

    /// 覆盖更新配置，成功后刷新整份文档
    pub async fn update_document(&self, body_text: &str) -> CacheResult<UpdatedConfig> {
        let writer = self
            .inner
            .writer
            .as_ref()
            .ok_or_else(|| CacheError::Config("当前缓存未配置写入客户端".to_string()))?;

        let updated = writer
            .update(&self.inner.options.id, self.secret(), body_text)
            .await?;
        self.refresh_document().await;
        Ok(updated)
    }
}
