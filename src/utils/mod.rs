//! 通用工具函数模块

pub mod retry;

pub use retry::{retry_async, RetryPolicy};
