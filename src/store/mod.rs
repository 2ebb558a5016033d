//! 远端共享的文件原语
//!
//! 语义与 POSIX 文件操作一致：失败时返回带 errno 的 `io::Error`，
//! 文件或目录不存在时为 `ErrorKind::NotFound`，目录已存在时为 `ErrorKind::AlreadyExists`。

use std::io::{self, SeekFrom};

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

pub mod memory;
pub mod mounted;

pub use memory::MemoryShare;
pub use mounted::MountedShare;

bitflags! {
    /// 打开文件的访问方式
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OpenFlags: u32 {
        const READ = 0b0001;
        const WRITE = 0b0010;
        const CREATE = 0b0100;
    }
}

impl OpenFlags {
    pub fn is_writing(&self) -> bool {
        self.contains(Self::WRITE)
    }
}

/// 文件状态，目前只关心长度
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub size: u64,
}

/// 文件系统统计信息
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatVfs {
    pub block_size: u64,
    pub fragment_size: u64,
    pub total_blocks: u64,
    pub free_blocks: u64,
}

impl StatVfs {
    /// 容量单位；部分实现不填 fragment_size，此时退回 block_size
    pub fn unit(&self) -> u64 {
        if self.fragment_size != 0 {
            self.fragment_size
        } else {
            self.block_size
        }
    }

    pub fn total_bytes(&self) -> u64 {
        self.unit().saturating_mul(self.total_blocks)
    }

    pub fn free_bytes(&self) -> u64 {
        self.unit().saturating_mul(self.free_blocks)
    }
}

/// 单个共享上的阻塞式文件操作
///
/// 路径均相对于共享根目录，以 '/' 分隔。
pub trait RemoteStore {
    type File;

    fn open(&mut self, path: &str, flags: OpenFlags, mode: u32) -> io::Result<Self::File>;

    fn close(&mut self, file: Self::File) -> io::Result<()>;

    fn read(&mut self, file: &mut Self::File, buf: &mut [u8]) -> io::Result<usize>;

    fn write(&mut self, file: &mut Self::File, buf: &[u8]) -> io::Result<usize>;

    fn seek(&mut self, file: &mut Self::File, pos: SeekFrom) -> io::Result<u64>;

    fn fstat(&mut self, file: &Self::File) -> io::Result<FileStat>;

    /// 允许稀疏扩展
    fn ftruncate(&mut self, file: &mut Self::File, len: u64) -> io::Result<()>;

    fn mkdir(&mut self, path: &str, mode: u32) -> io::Result<()>;

    fn statvfs(&mut self, path: &str) -> io::Result<StatVfs>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statvfs_uses_fragment_size() {
        let info = StatVfs {
            block_size: 1 << 20,
            fragment_size: 4096,
            total_blocks: 10,
            free_blocks: 4,
        };
        assert_eq!(info.total_bytes(), 40960);
        assert_eq!(info.free_bytes(), 16384);
    }

    #[test]
    fn statvfs_falls_back_to_block_size() {
        let info = StatVfs {
            block_size: 512,
            fragment_size: 0,
            total_blocks: 8,
            free_blocks: 2,
        };
        assert_eq!(info.total_bytes(), 4096);
        assert_eq!(info.free_bytes(), 1024);
    }

    #[test]
    fn write_flags() {
        assert!((OpenFlags::WRITE | OpenFlags::CREATE).is_writing());
        assert!(!OpenFlags::READ.is_writing());
    }
}
