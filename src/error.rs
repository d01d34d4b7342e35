use miette::Diagnostic;
use thiserror::Error;

/**
 * 资源池错误类型 - 使用 miette 提供诊断信息
 *
 * Every failure a pool operation can end in. Backend-level failures are
 * carried back to the controlling context inside the operation's delivery,
 * never swallowed.
 */
#[derive(Error, Debug, Diagnostic)]
pub enum PoolError {
    #[error("Configuration error: {0}")]
    #[diagnostic(
        code(pool::configuration_error),
        help("Check the provider name, credentials and backend root in the pool configuration")
    )]
    Configuration(String),

    #[error("Size exceeded: {size} bytes is larger than the maximum of {maximum} bytes")]
    #[diagnostic(code(pool::size_exceeded))]
    SizeExceeded { size: u64, maximum: u64 },

    #[error("Checksum {checksum} is stored with {recorded} bytes but was declared with {declared}")]
    #[diagnostic(
        code(pool::checksum_size_mismatch),
        help("The entry will be treated as unmatched and overwritten by the next upload")
    )]
    ChecksumSizeMismatch {
        checksum: String,
        declared: u64,
        recorded: u64,
    },

    #[error("Backend unavailable: {message}")]
    #[diagnostic(
        code(pool::backend_unavailable),
        help("The storage provider could not be reached; the operation can be retried")
    )]
    BackendUnavailable { message: String, key: Option<String> },

    #[error("Backend rejected request for {key}: HTTP {status}")]
    #[diagnostic(code(pool::backend_rejected))]
    BackendRejected { status: u16, key: String },

    #[error("Not found: {0}")]
    #[diagnostic(code(pool::not_found))]
    NotFound(String),

    #[error("Invalid checksum: {0}")]
    #[diagnostic(
        code(pool::invalid_checksum),
        help("Checksums are 40 hexadecimal characters (SHA-1)")
    )]
    InvalidChecksum(String),

    #[error("IO error: {0}")]
    #[diagnostic(code(pool::io_error))]
    Io(#[from] std::io::Error),

    #[error("Worker lost: {0}")]
    #[diagnostic(code(pool::worker_lost))]
    WorkerLost(String),

    #[error("Internal error: {0}")]
    #[diagnostic(code(pool::internal_error))]
    Internal(String),
}

impl PoolError {
    /**
     * 创建配置错误
     */
    pub fn configuration(message: impl Into<String>) -> Self {
        PoolError::Configuration(message.into())
    }

    /**
     * 创建超限错误
     */
    pub fn size_exceeded(size: u64, maximum: u64) -> Self {
        PoolError::SizeExceeded { size, maximum }
    }

    /**
     * 创建后端不可用错误
     */
    pub fn backend_unavailable(message: impl Into<String>, key: Option<String>) -> Self {
        PoolError::BackendUnavailable {
            message: message.into(),
            key,
        }
    }

    /**
     * 创建未找到错误
     */
    pub fn not_found(message: impl Into<String>) -> Self {
        PoolError::NotFound(message.into())
    }

    /// Transient failures the caller may retry. The pool itself never does.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PoolError::BackendUnavailable { .. })
    }

    /// `NotFound` is an expected outcome for `get` and `delete`.
    pub fn is_not_found(&self) -> bool {
        matches!(self, PoolError::NotFound(_))
    }

    /**
     * 为错误添加上下文信息
     */
    pub fn with_context(self, context: impl Into<String>) -> Self {
        let context = context.into();
        match self {
            PoolError::BackendUnavailable { message, key } => PoolError::BackendUnavailable {
                message: format!("{}: {}", context, message),
                key,
            },
            PoolError::Internal(message) => PoolError::Internal(format!("{}: {}", context, message)),
            other => other,
        }
    }
}

/**
 * 统一结果类型
 */
pub type Result<T> = std::result::Result<T, PoolError>;
