//! 条目存储与订阅
//!
//! `EntryStore<S>` 保存一个条目的最新状态，并向订阅者广播变化：
//! - 新状态与旧状态结构相等时不通知
//! - 通知在状态锁之外派发，监听器可以重入读取或修改存储
//! - 所有通知经同一个 FIFO 队列、由单一派发者依次投递，
//!   因此每个订阅者看到的状态序列完全一致
//! - 移除全部订阅不会清空已保存的状态
//!
//! # 使用示例
//!
//! ```rust
//! use jsoncf::data::cache::EntryStore;
//!
//! let store = EntryStore::new(0u32);
//! let sub = store.subscribe(|value| println!("new value: {value}"));
//! store.set(1);
//! drop(sub); // 取消订阅
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

type Listener<S> = Arc<dyn Fn(&S) + Send + Sync>;

/// 获取锁；监听器 panic 导致的中毒不影响已保存的状态
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

struct DispatchQueue<S> {
    pending: VecDeque<S>,
    running: bool,
}

struct StoreInner<S> {
    state: Mutex<S>,
    listeners: Mutex<Vec<(u64, Listener<S>)>>,
    queue: Mutex<DispatchQueue<S>>,
    next_id: AtomicU64,
}

/// 单条目状态存储
pub struct EntryStore<S> {
    inner: Arc<StoreInner<S>>,
}

impl<S> Clone for EntryStore<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: std::fmt::Debug> std::fmt::Debug for EntryStore<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntryStore")
            .field("state", &*lock(&self.inner.state))
            .field("listeners", &lock(&self.inner.listeners).len())
            .finish()
    }
}

impl<S> EntryStore<S>
where
    S: Clone + PartialEq + Send + Sync + 'static,
{
    pub fn new(initial: S) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                state: Mutex::new(initial),
                listeners: Mutex::new(Vec::new()),
                queue: Mutex::new(DispatchQueue {
                    pending: VecDeque::new(),
                    running: false,
                }),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// 当前状态快照
    pub fn snapshot(&self) -> S {
        lock(&self.inner.state).clone()
    }

    /// 替换状态；结构相等时不通知，返回是否发生变化
    pub fn set(&self, next: S) -> bool {
        let changed = {
            let mut state = lock(&self.inner.state);
            self.replace_locked(&mut state, next)
        };
        if changed {
            self.dispatch();
        }
        changed
    }

    /// 原子地“检查并设置”
    ///
    /// 闭包在状态锁内执行：返回 `None` 表示放弃更新。
    /// 返回值表示闭包是否给出了新状态（与是否真正变化无关）。
    pub fn update<F>(&self, f: F) -> bool
    where
        F: FnOnce(&S) -> Option<S>,
    {
        let (accepted, changed) = {
            let mut state = lock(&self.inner.state);
            match f(&state) {
                Some(next) => (true, self.replace_locked(&mut state, next)),
                None => (false, false),
            }
        };
        if changed {
            self.dispatch();
        }
        accepted
    }

    /// 注册监听器，返回的句柄被 drop 时自动取消订阅
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&S) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.inner.listeners).push((id, Arc::new(listener)));

        let weak: Weak<StoreInner<S>> = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                lock(&inner.listeners).retain(|(existing, _)| *existing != id);
            }
        })
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.inner.listeners).len()
    }

    /// 在持有状态锁时写入并入队，保证队列顺序与状态顺序一致
    fn replace_locked(&self, state: &mut S, next: S) -> bool {
        if *state == next {
            return false;
        }
        *state = next.clone();
        lock(&self.inner.queue).pending.push_back(next);
        true
    }

    fn dispatch(&self) {
        {
            let mut queue = lock(&self.inner.queue);
            if queue.running {
                // 已有派发者在投递，新状态会被它一并处理
                return;
            }
            queue.running = true;
        }

        let mut guard = DispatchGuard {
            queue: &self.inner.queue,
            armed: true,
        };

        loop {
            let next = {
                let mut queue = lock(&self.inner.queue);
                match queue.pending.pop_front() {
                    Some(next) => next,
                    None => {
                        // 与出队在同一临界区内交出派发权，避免新入队的状态无人投递
                        queue.running = false;
                        guard.armed = false;
                        return;
                    }
                }
            };

            let listeners: Vec<Listener<S>> = lock(&self.inner.listeners)
                .iter()
                .map(|(_, listener)| Arc::clone(listener))
                .collect();

            for listener in &listeners {
                listener(&next);
            }
        }
    }
}

/// 监听器 panic 时释放派发权
struct DispatchGuard<'a, S> {
    queue: &'a Mutex<DispatchQueue<S>>,
    armed: bool,
}

impl<S> Drop for DispatchGuard<'_, S> {
    fn drop(&mut self) {
        if self.armed {
            lock(self.queue).running = false;
        }
    }
}

/// 订阅句柄
///
/// drop 或调用 `unsubscribe` 时移除监听器；`detach` 使监听器与存储同寿命。
#[must_use = "订阅句柄被丢弃时会立即取消订阅"]
pub struct Subscription {
    remover: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub(crate) fn new(remover: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            remover: Some(Box::new(remover)),
        }
    }

    pub fn unsubscribe(mut self) {
        if let Some(remove) = self.remover.take() {
            remove();
        }
    }

    pub fn detach(mut self) {
        self.remover.take();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(remove) = self.remover.take() {
            remove();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.remover.is_some())
            .finish()
    }
}
