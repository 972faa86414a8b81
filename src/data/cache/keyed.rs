//! 按键存储的条目状态
//!
//! 快照是 `Arc<HashMap<..>>`，每次更新都构造新的映射，
//! 未改动的条目通过 `Arc` 共享；先前取得的快照始终是不可变的。
//! `subscribe_key` 只在对应键的状态变化时触发，无关键的更新不会打扰它。

use super::store::{lock, EntryStore, Subscription};
use crate::models::{ConfigValue, FetchState};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// 单个键的状态
pub type KeyState = FetchState<ConfigValue>;

/// 键到状态的映射快照
pub type KeyMap = HashMap<String, Arc<KeyState>>;

/// 映射的一个版本：按指针判等
///
/// 结构比较只在 `update_entry` 中针对被修改的键进行；
/// 映射本身只要生成了新版本就视为变化，无需逐项比较整张表。
#[derive(Debug, Clone)]
struct MapVersion(Arc<KeyMap>);

impl PartialEq for MapVersion {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// 多键状态存储
#[derive(Debug, Clone)]
pub struct KeyedStore {
    store: EntryStore<MapVersion>,
}

impl Default for KeyedStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyedStore {
    pub fn new() -> Self {
        Self {
            store: EntryStore::new(MapVersion(Arc::new(KeyMap::new()))),
        }
    }

    /// 整个映射的快照
    pub fn snapshot(&self) -> Arc<KeyMap> {
        self.store.snapshot().0
    }

    /// 指定键的状态（没有记录时为 `None`）
    pub fn entry(&self, key: &str) -> Option<Arc<KeyState>> {
        self.snapshot().get(key).cloned()
    }

    /// 指定键的状态，没有记录时返回空状态
    pub fn state(&self, key: &str) -> KeyState {
        self.entry(key)
            .map(|state| (*state).clone())
            .unwrap_or_default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.snapshot().contains_key(key)
    }

    pub fn set_entry(&self, key: &str, state: KeyState) -> bool {
        self.update_entry(key, |_| Some(state))
    }

    /// 原子地更新单个键
    ///
    /// 闭包收到该键的当前状态；返回 `None` 放弃更新。
    /// 新状态与旧状态结构相等时不会生成新映射，也不通知订阅者。
    pub fn update_entry<F>(&self, key: &str, f: F) -> bool
    where
        F: FnOnce(Option<&KeyState>) -> Option<KeyState>,
    {
        let mut accepted = false;
        self.store.update(|MapVersion(map)| {
            let current = map.get(key);
            let next = f(current.map(|state| state.as_ref()))?;
            accepted = true;

            if current.map(|state| state.as_ref()) == Some(&next) {
                return None;
            }

            let mut updated: KeyMap = map.as_ref().clone();
            updated.insert(key.to_string(), Arc::new(next));
            Some(MapVersion(Arc::new(updated)))
        });
        accepted
    }

    /// 删除单个键的记录，返回是否存在
    pub fn remove_entry(&self, key: &str) -> bool {
        let mut removed = false;
        self.store.update(|MapVersion(map)| {
            if !map.contains_key(key) {
                return None;
            }
            let mut updated: KeyMap = map.as_ref().clone();
            updated.remove(key);
            removed = true;
            Some(MapVersion(Arc::new(updated)))
        });
        removed
    }

    /// 订阅整个映射
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&Arc<KeyMap>) + Send + Sync + 'static,
    {
        self.store.subscribe(move |version: &MapVersion| listener(&version.0))
    }

    /// 订阅单个键：仅当该键状态（结构上）变化时回调
    ///
    /// 键被删除时回调收到空状态。
    pub fn subscribe_key<F>(&self, key: &str, listener: F) -> Subscription
    where
        F: Fn(&KeyState) + Send + Sync + 'static,
    {
        let key = key.to_string();
        let last_seen = Mutex::new(self.entry(&key));

        self.store.subscribe(move |MapVersion(map): &MapVersion| {
            let current = map.get(&key).cloned();
            {
                let mut last = lock(&last_seen);
                let unchanged = match (last.as_ref(), current.as_ref()) {
                    (Some(a), Some(b)) => Arc::ptr_eq(a, b) || a == b,
                    (None, None) => true,
                    _ => false,
                };
                if unchanged {
                    return;
                }
                *last = current.clone();
            }
            match current {
                Some(state) => listener(&state),
                None => listener(&KeyState::default()),
            }
        })
    }

    pub fn listener_count(&self) -> usize {
        self.store.listener_count()
    }
}
