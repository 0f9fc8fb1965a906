use crate::url::UrlError;

/// 注册中心错误类型
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// 必填参数缺失，立即返回，不修改任何状态
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Invalid url: {0}")]
    InvalidUrl(#[from] UrlError),
    #[error("Registry unavailable: {0}")]
    Unavailable(String),
    #[error("Remote registry error: {0}")]
    Remote(String),
}
