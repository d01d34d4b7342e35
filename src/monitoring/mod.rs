/*!
 * 资源池监控模块
 *
 * 无锁原子计数器，记录匹配、存储和后端失败情况
 */
pub mod metrics;

pub use metrics::{Counter, MetricsSnapshot, PoolMetrics};
