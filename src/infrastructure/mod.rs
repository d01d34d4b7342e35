//! 基础设施层 - 技术实现
//!
//! 配置加载与日志初始化

pub mod config;
pub mod logging;

pub use config::{
    BackendConnection, BridgeConfig, Credentials, LoggingConfig, PoolConfiguration, Provider,
};
pub use logging::init_logging;
