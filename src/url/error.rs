/// 端点描述符解析错误
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UrlError {
    #[error("Empty url")]
    Empty,
    #[error("Invalid host: {0}")]
    InvalidHost(String),
    #[error("Invalid port: {0}")]
    InvalidPort(String),
    #[error("Invalid parameter encoding: {0}")]
    InvalidEncoding(String),
}
