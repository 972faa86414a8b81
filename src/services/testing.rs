// 协调器测试用的 Fetch Adapter 替身

use crate::core::error::{CacheError, CacheResult};
use crate::models::{ConfigMap, DocumentEnvelope, KeyEnvelope};
use crate::services::fetcher::FetchAdapter;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::oneshot;

type DocumentResponder = Box<dyn FnMut() -> CacheResult<DocumentEnvelope> + Send>;
type KeyResponder = Box<dyn FnMut(&str) -> CacheResult<KeyEnvelope> + Send>;

/// 立即返回预设结果，并统计调用次数
pub(crate) struct ScriptedAdapter {
    document: Mutex<DocumentResponder>,
    key: Mutex<KeyResponder>,
    document_calls: AtomicUsize,
    key_calls: Mutex<HashMap<String, usize>>,
}

impl ScriptedAdapter {
    pub(crate) fn new() -> Self {
        Self {
            document: Mutex::new(Box::new(|| -> CacheResult<DocumentEnvelope> {
                Ok(DocumentEnvelope::ok(ConfigMap::new()))
            })),
            key: Mutex::new(Box::new(|key: &str| -> CacheResult<KeyEnvelope> {
                Ok(KeyEnvelope::error(
                    serde_json::Value::Null,
                    format!("Failed to fetch config: Config key could not be found. ({key})"),
                ))
            })),
            document_calls: AtomicUsize::new(0),
            key_calls: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn on_document(
        self,
        responder: impl FnMut() -> CacheResult<DocumentEnvelope> + Send + 'static,
    ) -> Self {
        *self.document.lock().unwrap() = Box::new(responder);
        self
    }

    pub(crate) fn on_key(
        self,
        responder: impl FnMut(&str) -> CacheResult<KeyEnvelope> + Send + 'static,
    ) -> Self {
        *self.key.lock().unwrap() = Box::new(responder);
        self
    }

    pub(crate) fn document_calls(&self) -> usize {
        self.document_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn key_calls(&self, key: &str) -> usize {
        self.key_calls.lock().unwrap().get(key).copied().unwrap_or(0)
    }
}

#[async_trait]
impl FetchAdapter for ScriptedAdapter {
    async fn fetch_document(
        &self,
        _id: &str,
        _secret: Option<&str>,
    ) -> CacheResult<DocumentEnvelope> {
        self.document_calls.fetch_add(1, Ordering::SeqCst);
        let mut responder = self.document.lock().unwrap();
        (*responder)()
    }

    async fn fetch_key(
        &self,
        _id: &str,
        key: &str,
        _secret: Option<&str>,
    ) -> CacheResult<KeyEnvelope> {
        *self
            .key_calls
            .lock()
            .unwrap()
            .entry(key.to_string())
            .or_insert(0) += 1;
        let mut responder = self.key.lock().unwrap();
        (*responder)(key)
    }
}

/// 每次调用都挂起，直到测试手动给出结果；可按任意顺序完成
#[derive(Default)]
pub(crate) struct ManualAdapter {
    documents: Mutex<Vec<oneshot::Sender<CacheResult<DocumentEnvelope>>>>,
    keys: Mutex<Vec<(String, oneshot::Sender<CacheResult<KeyEnvelope>>)>>,
}

impl ManualAdapter {
    pub(crate) fn pending_documents(&self) -> usize {
        self.documents.lock().unwrap().len()
    }

    pub(crate) fn pending_keys(&self, key: &str) -> usize {
        self.keys
            .lock()
            .unwrap()
            .iter()
            .filter(|(pending, _)| pending == key)
            .count()
    }

    /// 完成第 `index` 个挂起的文档请求（按发起顺序）
    pub(crate) fn resolve_document(&self, index: usize, result: CacheResult<DocumentEnvelope>) {
        let sender = self.documents.lock().unwrap().remove(index);
        let _ = sender.send(result);
    }

    /// 完成指定键的第 `index` 个挂起请求
    pub(crate) fn resolve_key(&self, key: &str, index: usize, result: CacheResult<KeyEnvelope>) {
        let mut keys = self.keys.lock().unwrap();
        let position = keys
            .iter()
            .enumerate()
            .filter(|(_, (pending, _))| pending == key)
            .map(|(position, _)| position)
            .nth(index)
            .expect("没有对应的挂起请求");
        let (_, sender) = keys.remove(position);
        let _ = sender.send(result);
    }
}

#[async_trait]
impl FetchAdapter for ManualAdapter {
    async fn fetch_document(
        &self,
        _id: &str,
        _secret: Option<&str>,
    ) -> CacheResult<DocumentEnvelope> {
        let (tx, rx) = oneshot::channel();
        self.documents.lock().unwrap().push(tx);
        rx.await
            .unwrap_or_else(|_| Err(CacheError::Unreachable("请求被丢弃".to_string())))
    }

    async fn fetch_key(
        &self,
        _id: &str,
        key: &str,
        _secret: Option<&str>,
    ) -> CacheResult<KeyEnvelope> {
        let (tx, rx) = oneshot::channel();
        self.keys.lock().unwrap().push((key.to_string(), tx));
        rx.await
            .unwrap_or_else(|_| Err(CacheError::Unreachable("请求被丢弃".to_string())))
    }
}

/// 等待后台任务推进，直到条件满足
pub(crate) async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..1000 {
        if condition() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("等待条件超时");
}
