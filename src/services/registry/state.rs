use dashmap::{DashMap, DashSet};
use std::fmt;
use std::sync::Arc;

use super::error::RegistryError;
use super::types::{
    Listener, ListenerRef, ListenerSet, RegisteredSet, Registry, SubscriptionMap,
};
use crate::url::{Url, is_match};

/// 注册中心本地状态
///
/// 记录本进程意图注册的端点与当前有效的订阅，并在重连后重放。
/// 每个具体注册中心实例持有一份独立的状态。
#[derive(Debug)]
pub struct RegistryState {
    registry_url: Url,
    registered: RegisteredSet,
    subscribed: SubscriptionMap,
}

impl RegistryState {
    pub fn new(registry_url: Url) -> Result<Self, RegistryError> {
        if registry_url.is_empty() {
            return Err(RegistryError::InvalidArgument("registry url is empty".into()));
        }
        Ok(Self {
            registry_url,
            registered: Arc::new(DashSet::new()),
            subscribed: Arc::new(DashMap::new()),
        })
    }

    pub fn url(&self) -> &Url {
        &self.registry_url
    }

    // 返回共享的集合本身，而不是副本
    pub fn registered(&self) -> &RegisteredSet {
        &self.registered
    }

    pub fn subscribed(&self) -> &SubscriptionMap {
        &self.subscribed
    }

    /// 记录注册意图，监听器参数仅供具体实现使用
    pub fn register(&self, url: &Url, _listener: Option<&Listener>) -> Result<(), RegistryError> {
        require_url(url, "register")?;
        tracing::info!(url = %url, "Register");
        self.registered.insert(url.to_full_string());
        Ok(())
    }

    pub fn unregister(&self, url: &Url, _listener: Option<&Listener>) -> Result<(), RegistryError> {
        require_url(url, "unregister")?;
        tracing::info!(url = %url, "Unregister");
        self.registered.remove(&url.to_full_string());
        Ok(())
    }

    pub fn subscribe(&self, url: &Url, listener: Option<&Listener>) -> Result<(), RegistryError> {
        require_url(url, "subscribe")?;
        let listener = require_listener(listener, "subscribe")?;
        tracing::info!(url = %url, "Subscribe");

        // entry 在分片锁内完成“不存在则创建”，并发的首次订阅只会创建一个集合
        let listeners: ListenerSet = self
            .subscribed
            .entry(url.to_full_string())
            .or_insert_with(|| Arc::new(DashSet::new()))
            .value()
            .clone();
        listeners.insert(ListenerRef::new(listener.clone()));
        Ok(())
    }

    pub fn unsubscribe(&self, url: &Url, listener: Option<&Listener>) -> Result<(), RegistryError> {
        require_url(url, "unsubscribe")?;
        let listener = require_listener(listener, "unsubscribe")?;
        tracing::info!(url = %url, "Unsubscribe");

        if let Some(listeners) = self.listeners_of(&url.to_full_string()) {
            listeners.remove(&ListenerRef::new(listener.clone()));
        }
        Ok(())
    }

    /// 在已注册集合中查找满足查询的端点，不保证顺序
    pub fn lookup(&self, query: &Url) -> Result<Vec<Url>, RegistryError> {
        let mut urls = Vec::new();
        for key in self.registered_snapshot() {
            let url = Url::parse(&key)?;
            if is_match(query, &url) {
                urls.push(url);
            }
        }
        Ok(urls)
    }

    /// 重连后重放注册与订阅
    ///
    /// 先对两张表取快照再逐条回调 `registry`，重放期间新增的条目不会被重复重放。
    /// 任意一条失败都原样返回给调用方，由调用方决定重试策略。
    pub fn recover<R: Registry + ?Sized>(&self, registry: &R) -> Result<(), RegistryError> {
        let recover_registered = self.registered_snapshot();
        let recover_subscribed = self.subscribed_snapshot();

        if !recover_registered.is_empty() {
            tracing::info!(
                registry = %self.registry_url,
                services = ?recover_registered,
                "Recover register services"
            );
            for key in &recover_registered {
                registry.register(&Url::parse(key)?, None)?;
            }
        }

        if !recover_subscribed.is_empty() {
            tracing::info!(
                registry = %self.registry_url,
                subscriptions = recover_subscribed.len(),
                "Recover subscribe services"
            );
            for (key, listeners) in &recover_subscribed {
                let url = Url::parse(key)?;
                for listener in listeners {
                    registry.subscribe(&url, Some(listener))?;
                }
            }
        }

        Ok(())
    }

    /// 尽力注销所有已注册端点，单条失败只记录日志，不影响其余条目
    ///
    /// 订阅表保持不变。
    pub fn destroy<R: Registry + ?Sized>(&self, registry: &R) {
        tracing::info!(registry = %self.registry_url, "Destroy registry");

        for key in self.registered_snapshot() {
            let result = Url::parse(&key)
                .map_err(RegistryError::from)
                .and_then(|url| registry.unregister(&url, None));
            if let Err(e) = result {
                tracing::warn!(url = %key, error = %e, "Failed to unregister url on destroy");
            }
        }
    }

    /// 把端点列表投递给订阅了 `query` 的每个监听器，每个监听器恰好一次
    ///
    /// 投递前先复制监听器集合，回调中可以安全地订阅或取消订阅。返回被通知的监听器数量。
    pub fn notify(&self, query: &Url, urls: &[Url]) -> usize {
        let Some(listeners) = self.listeners_of(&query.to_full_string()) else {
            return 0;
        };
        let listeners: Vec<Listener> = listeners
            .iter()
            .map(|entry| entry.key().listener().clone())
            .collect();

        for listener in &listeners {
            listener.notify(urls);
        }

        tracing::debug!(
            query = %query,
            url_count = urls.len(),
            listener_count = listeners.len(),
            "Notified subscribers"
        );
        listeners.len()
    }

    /// 当前所有订阅查询（包括已没有监听器的残留条目）
    pub fn subscribed_queries(&self) -> Result<Vec<Url>, RegistryError> {
        let keys: Vec<String> = self
            .subscribed
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        keys.iter()
            .map(|key| Url::parse(key).map_err(RegistryError::from))
            .collect()
    }

    fn listeners_of(&self, key: &str) -> Option<ListenerSet> {
        self.subscribed.get(key).map(|entry| entry.value().clone())
    }

    fn registered_snapshot(&self) -> Vec<String> {
        self.registered.iter().map(|entry| entry.key().clone()).collect()
    }

    // 先复制 key 与监听器集合的引用，释放分片锁后再展开监听器
    fn subscribed_snapshot(&self) -> Vec<(String, Vec<Listener>)> {
        let sets: Vec<(String, ListenerSet)> = self
            .subscribed
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        sets.into_iter()
            .map(|(key, listeners)| {
                let listeners = listeners
                    .iter()
                    .map(|entry| entry.key().listener().clone())
                    .collect();
                (key, listeners)
            })
            .collect()
    }
}

impl Registry for RegistryState {
    fn url(&self) -> &Url {
        RegistryState::url(self)
    }

    fn register(&self, url: &Url, listener: Option<&Listener>) -> Result<(), RegistryError> {
        RegistryState::register(self, url, listener)
    }

    fn unregister(&self, url: &Url, listener: Option<&Listener>) -> Result<(), RegistryError> {
        RegistryState::unregister(self, url, listener)
    }

    fn subscribe(&self, url: &Url, listener: Option<&Listener>) -> Result<(), RegistryError> {
        RegistryState::subscribe(self, url, listener)
    }

    fn unsubscribe(&self, url: &Url, listener: Option<&Listener>) -> Result<(), RegistryError> {
        RegistryState::unsubscribe(self, url, listener)
    }

    fn lookup(&self, query: &Url) -> Result<Vec<Url>, RegistryError> {
        RegistryState::lookup(self, query)
    }

    fn destroy(&self) {
        RegistryState::destroy(self, self)
    }
}

impl fmt::Display for RegistryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.registry_url, f)
    }
}

fn require_url(url: &Url, operation: &str) -> Result<(), RegistryError> {
    if url.is_empty() {
        return Err(RegistryError::InvalidArgument(format!("{operation} url is empty")));
    }
    Ok(())
}

fn require_listener<'a>(
    listener: Option<&'a Listener>,
    operation: &str,
) -> Result<&'a Listener, RegistryError> {
    listener.ok_or_else(|| RegistryError::InvalidArgument(format!("{operation} listener is none")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::registry::NotifyListener;

    struct Noop;

    impl NotifyListener for Noop {
        fn notify(&self, _urls: &[Url]) {}
    }

    #[test]
    fn empty_listener_set_is_kept_after_unsubscribe() {
        let state = RegistryState::new(Url::new("registry", "127.0.0.1", 9090, "")).unwrap();
        let query = Url::new("svc", "*", 0, "Foo");
        let listener: Listener = Arc::new(Noop);

        state.subscribe(&query, Some(&listener)).unwrap();
        state.unsubscribe(&query, Some(&listener)).unwrap();

        let entry = state.subscribed().get(&query.to_full_string()).unwrap();
        assert!(entry.value().is_empty());
    }

    #[test]
    fn subscribed_snapshot_expands_listeners() {
        let state = RegistryState::new(Url::new("registry", "127.0.0.1", 9090, "")).unwrap();
        let listener: Listener = Arc::new(Noop);
        state.subscribe(&Url::new("svc", "*", 0, "Foo"), Some(&listener)).unwrap();
        state.subscribe(&Url::new("svc", "*", 0, "Bar"), Some(&listener)).unwrap();

        let snapshot = state.subscribed_snapshot();
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.iter().all(|(_, listeners)| listeners.len() == 1));
    }
}
