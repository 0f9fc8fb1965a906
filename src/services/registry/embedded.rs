use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use super::error::RegistryError;
use super::state::RegistryState;
use super::types::{Listener, Registry};
use crate::url::{Url, is_match};

/// 嵌入式注册中心：不开端口，直接以本地状态表作为存储
///
/// 注册/注销后向所有匹配的订阅推送最新端点列表；新订阅立即收到一次当前列表。
#[derive(Debug)]
pub struct EmbeddedRegistry {
    state: RegistryState,
    available: AtomicBool,
}

impl EmbeddedRegistry {
    pub fn new(registry_url: Url) -> Result<Self, RegistryError> {
        Ok(Self {
            state: RegistryState::new(registry_url)?,
            available: AtomicBool::new(true),
        })
    }

    pub fn state(&self) -> &RegistryState {
        &self.state
    }

    /// 重放本地记录的注册与订阅
    pub fn recover(&self) -> Result<(), RegistryError> {
        self.ensure_available()?;
        self.state.recover(self)
    }

    fn ensure_available(&self) -> Result<(), RegistryError> {
        if self.is_available() {
            Ok(())
        } else {
            Err(RegistryError::Unavailable(self.state.url().to_string()))
        }
    }

    // 向所有与变更端点匹配的订阅推送最新列表
    fn notify_changed(&self, changed: &Url) -> Result<(), RegistryError> {
        for query in self.state.subscribed_queries()? {
            if !is_match(&query, changed) {
                continue;
            }
            let urls = self.state.lookup(&query)?;
            self.state.notify(&query, &urls);
        }
        Ok(())
    }
}

impl Registry for EmbeddedRegistry {
    fn url(&self) -> &Url {
        self.state.url()
    }

    fn register(&self, url: &Url, listener: Option<&Listener>) -> Result<(), RegistryError> {
        self.ensure_available()?;
        self.state.register(url, listener)?;
        self.notify_changed(url)
    }

    fn unregister(&self, url: &Url, listener: Option<&Listener>) -> Result<(), RegistryError> {
        self.state.unregister(url, listener)?;
        self.notify_changed(url)
    }

    fn subscribe(&self, url: &Url, listener: Option<&Listener>) -> Result<(), RegistryError> {
        self.ensure_available()?;
        self.state.subscribe(url, listener)?;

        // 仅向新订阅者推送当前快照，已有订阅者的视图没有变化
        let urls = self.state.lookup(url)?;
        if let Some(listener) = listener {
            listener.notify(&urls);
        }
        Ok(())
    }

    fn unsubscribe(&self, url: &Url, listener: Option<&Listener>) -> Result<(), RegistryError> {
        self.state.unsubscribe(url, listener)
    }

    fn lookup(&self, query: &Url) -> Result<Vec<Url>, RegistryError> {
        self.state.lookup(query)
    }

    fn destroy(&self) {
        if !self.available.swap(false, Ordering::AcqRel) {
            return;
        }
        // unregister 不检查可用性，销毁过程中的注销仍会通知订阅者
        self.state.destroy(self);
    }

    fn is_available(&self) -> bool {
        self.available.load(Ordering::Acquire)
    }
}

impl fmt::Display for EmbeddedRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.state, f)
    }
}
