// 错误类型定义
// 生命周期引擎与存储层的错误分类

use thiserror::Error;

/// 生命周期操作错误
///
/// 所有错误对当前操作都是终止性的，引擎内部不做重试。
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    /// 输入格式错误 (RUC、SWIFT、IBAN、MAC、状态代码等)
    #[error("validation error: {0}")]
    Validation(String),

    /// 引用的商户或终端不存在
    #[error("not found: {0}")]
    NotFound(String),

    /// 违反业务约束 (重复、配额、状态冲突)，以及携带原始信息的存储失败
    #[error("conflict: {0}")]
    Conflict(String),
}

/// 错误类别，供传输层映射状态码使用
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
}

impl LifecycleError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    /// 获取错误类别
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Conflict(_) => ErrorKind::Conflict,
        }
    }

    /// 商户不存在
    pub fn merchant_not_found(code: &str) -> Self {
        Self::NotFound(format!("merchant with code {} does not exist", code))
    }

    /// 终端不存在
    pub fn terminal_not_found(code: &str) -> Self {
        Self::NotFound(format!("terminal with code {} does not exist", code))
    }
}

/// 存储层错误
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// 主键或唯一列冲突
    #[error("duplicate record: {0}")]
    Duplicate(String),

    /// 其他存储故障
    #[error("backend failure: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                StoreError::Duplicate(db_err.message().to_string())
            }
            _ => StoreError::Backend(err.to_string()),
        }
    }
}

/// 存储失败统一包装为冲突错误，保留原始信息
impl From<StoreError> for LifecycleError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate(msg) => LifecycleError::Conflict(msg),
            StoreError::Backend(msg) => {
                LifecycleError::Conflict(format!("storage failure: {}", msg))
            }
        }
    }
}

pub type LifecycleResult<T> = Result<T, LifecycleError>;
