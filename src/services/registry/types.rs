use dashmap::{DashMap, DashSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use super::error::RegistryError;
use crate::url::Url;

/// 订阅回调：远端端点集合变化时由具体注册中心调用
pub trait NotifyListener: Send + Sync {
    fn notify(&self, urls: &[Url]);
}

pub type Listener = Arc<dyn NotifyListener>;

/// 按指针身份比较的监听器引用
///
/// 同一个 `Arc` 的克隆视为同一个监听器，内容相同的两个实例视为不同监听器。
#[derive(Clone)]
pub struct ListenerRef(Listener);

impl ListenerRef {
    pub fn new(listener: Listener) -> Self {
        Self(listener)
    }

    pub fn listener(&self) -> &Listener {
        &self.0
    }

    fn addr(&self) -> *const () {
        Arc::as_ptr(&self.0) as *const ()
    }
}

impl PartialEq for ListenerRef {
    fn eq(&self, other: &Self) -> bool {
        self.addr() == other.addr()
    }
}

impl Eq for ListenerRef {}

impl Hash for ListenerRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr().hash(state);
    }
}

impl fmt::Debug for ListenerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Listener({:p})", self.addr())
    }
}

// 已注册集合（规范字符串）
pub type RegisteredSet = Arc<DashSet<String>>;

pub type ListenerSet = Arc<DashSet<ListenerRef>>;

// 订阅表（查询规范字符串 -> 监听器集合）
pub type SubscriptionMap = Arc<DashMap<String, ListenerSet>>;

/// 具体注册中心对外暴露的能力
///
/// 实现者组合一个 [`RegistryState`](super::RegistryState)，在自身网络调用前后调用其记账方法；
/// `recover` 与 `destroy` 会回调这里的 `register`/`subscribe`/`unregister`，
/// 从而重放实现者自己的远端操作。
pub trait Registry: Send + Sync {
    /// 注册中心自身的标识
    fn url(&self) -> &Url;

    fn register(&self, url: &Url, listener: Option<&Listener>) -> Result<(), RegistryError>;

    fn unregister(&self, url: &Url, listener: Option<&Listener>) -> Result<(), RegistryError>;

    fn subscribe(&self, url: &Url, listener: Option<&Listener>) -> Result<(), RegistryError>;

    fn unsubscribe(&self, url: &Url, listener: Option<&Listener>) -> Result<(), RegistryError>;

    fn lookup(&self, query: &Url) -> Result<Vec<Url>, RegistryError>;

    fn destroy(&self);

    fn is_available(&self) -> bool {
        true
    }
}
