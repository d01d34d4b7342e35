pub mod descriptor;

// 重新导出核心类型
pub use descriptor::{dedup_descriptors, Checksum, MatchReport, ResourceDescriptor, CHECKSUM_LEN};
