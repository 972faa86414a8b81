// 缓存条目的可观测状态

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 任意 JSON 配置值（字符串、数字、布尔、null、数组或对象）
pub type ConfigValue = Value;

/// 整份配置文档：键名到配置值的映射
pub type ConfigMap = Map<String, ConfigValue>;

/// 单个缓存条目（一个键或整份文档）的状态
///
/// 约束：
/// - `loading == true` 表示该条目当前有请求在途
/// - `error` 非空表示最近一次请求失败，`data` 仍保存最后一次成功获取的值
///
/// 相等性是结构相等（`serde_json::Value` 的 `PartialEq` 逐层比较值树），
/// 订阅方据此抑制重复通知。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchState<T> {
    pub data: Option<T>,
    pub loading: bool,
    pub error: Option<String>,
}

/// 整份文档的聚合状态
pub type AggregateState = FetchState<ConfigMap>;

impl<T> Default for FetchState<T> {
    fn default() -> Self {
        Self {
            data: None,
            loading: false,
            error: None,
        }
    }
}

impl<T: Clone> FetchState<T> {
    /// 进入加载状态，保留已有数据（原地刷新）
    pub fn begin_loading(&self) -> Self {
        Self {
            data: self.data.clone(),
            loading: true,
            error: None,
        }
    }

    /// 请求失败：保留上一次成功的数据
    pub fn failed(&self, message: impl Into<String>) -> Self {
        Self {
            data: self.data.clone(),
            loading: false,
            error: Some(message.into()),
        }
    }
}

impl<T> FetchState<T> {
    /// 请求成功后的稳定状态
    pub fn ready(data: T) -> Self {
        Self {
            data: Some(data),
            loading: false,
            error: None,
        }
    }

    pub fn is_settled(&self) -> bool {
        !self.loading
    }
}

impl AggregateState {
    /// 失效后的空文档状态
    pub fn cleared() -> Self {
        Self::ready(ConfigMap::new())
    }
}
