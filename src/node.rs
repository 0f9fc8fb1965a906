use std::sync::Arc;

use crate::config::Config;
use crate::services::registry::{EmbeddedRegistry, Listener, NotifyListener, Registry};
use crate::url::Url;

/// 把收到的端点列表写入日志的监听器
#[derive(Debug)]
pub struct LoggingListener {
    query: Url,
}

impl LoggingListener {
    pub fn new(query: Url) -> Self {
        Self { query }
    }
}

impl NotifyListener for LoggingListener {
    fn notify(&self, urls: &[Url]) {
        let urls: Vec<String> = urls.iter().map(Url::to_full_string).collect();
        tracing::info!(query = %self.query, urls = ?urls, "Endpoints changed");
    }
}

/// 按配置创建注册中心，并完成初始注册与订阅
pub fn build_registry(config: &Config) -> Result<EmbeddedRegistry, Box<dyn std::error::Error>> {
    let registry = EmbeddedRegistry::new(config.registry_url()?)?;

    for url in config.subscribe_urls()? {
        let listener: Listener = Arc::new(LoggingListener::new(url.clone()));
        registry.subscribe(&url, Some(&listener))?;
    }

    for url in config.export_urls()? {
        registry.register(&url, None)?;
    }

    Ok(registry)
}

pub async fn start(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let registry = build_registry(&config)?;

    tracing::info!(
        registry = %registry,
        registered = registry.state().registered().len(),
        subscribed = registry.state().subscribed().len(),
        "Registry node started"
    );

    tokio::signal::ctrl_c().await?;

    tracing::info!("Shutdown signal received");
    registry.destroy();
    Ok(())
}
