use registry_core::config::Config;
use registry_core::node;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;

    // RUST_LOG 优先，其次使用配置中的日志级别
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    tracing::info!("Starting registry node...");
    node::start(config).await?;
    Ok(())
}
