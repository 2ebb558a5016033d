use serde::{Deserialize, Serialize};

/// 默认逻辑块大小：4KB
pub const DEFAULT_BLOCK_SIZE: u64 = 4096;

/// 默认每个 superblock 文件包含 256 块，即 1MiB 一个文件
pub const DEFAULT_SUPERBLOCK_SIZE: u64 = 256;

/// 默认对外暴露的磁盘大小：1GiB
pub const DEFAULT_DISK_SIZE: u64 = 1 << 30;

/// superblock 文件与目录的权限位
pub const CONTAINER_MODE: u32 = 0o770;

/// 线性块地址
pub type BlockAddress = u64;

/// superblock 文件编号
pub type ContainerIndex = u64;

/// 共享的容量信息（字节）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeInfo {
    pub size: u64,
    pub free: u64,
}
