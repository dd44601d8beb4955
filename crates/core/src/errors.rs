use thiserror::Error;

/// 存活检测错误类型定义
#[derive(Debug, Error)]
pub enum AliveError {
    #[error("存储错误: {0}")]
    Store(String),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("配置错误: {0}")]
    Configuration(String),

    #[error("HTTP服务错误: {0}")]
    Server(String),

    #[error("进程错误: {0}")]
    Process(#[from] std::io::Error),

    #[error("内部错误: {0}")]
    Internal(String),
}

impl AliveError {
    /// Address already bound by another process; expected for followers.
    pub fn is_addr_in_use(&self) -> bool {
        matches!(self, AliveError::Process(e) if e.kind() == std::io::ErrorKind::AddrInUse)
    }
}

/// 统一的Result类型
pub type AliveResult<T> = std::result::Result<T, AliveError>;
