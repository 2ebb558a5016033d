//! 块地址到 superblock 文件的映射
//!
//! 文件编号以 64 位整数表示，按 16 个十六进制位从低到高排列：
//! 前 3 位作为目录名，后 13 位加 `.img` 作为文件名。
//! 例如编号 `0x123` 对应 `321/0000000000000.img`。
//! 低位在前使相邻文件分散到不同目录，每个目录最多 4096 个子目录。

use std::fmt;

use crate::{
    config::DiskConfig,
    disk::types::{BlockAddress, ContainerIndex},
    error::{DiskError, Result},
};

const DIR_DIGITS: usize = 3;
const INDEX_DIGITS: usize = 16;
const EXTENSION: &str = ".img";

/// superblock 文件在磁盘目录下的相对路径
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerPath {
    dir: String,
    file: String,
}

impl ContainerPath {
    pub fn new(index: ContainerIndex) -> Self {
        let digits: String = format!("{index:0width$x}", width = INDEX_DIGITS)
            .chars()
            .rev()
            .collect();
        let (dir, rest) = digits.split_at(DIR_DIGITS);
        Self {
            dir: dir.to_string(),
            file: format!("{rest}{EXTENSION}"),
        }
    }

    /// 反向解析相对路径，格式不符时返回 None
    pub fn parse(path: &str) -> Option<ContainerIndex> {
        let (dir, file) = path.split_once('/')?;
        let rest = file.strip_suffix(EXTENSION)?;
        if dir.len() != DIR_DIGITS || dir.len() + rest.len() != INDEX_DIGITS {
            return None;
        }
        let digits: String = dir.chars().chain(rest.chars()).rev().collect();
        if !digits.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f')) {
            return None;
        }
        ContainerIndex::from_str_radix(&digits, 16).ok()
    }

    pub fn dir(&self) -> &str {
        &self.dir
    }

    pub fn file(&self) -> &str {
        &self.file
    }

    /// 拼接磁盘根目录，根目录为空时即为相对路径本身
    pub fn under(&self, root: &str) -> (String, String) {
        let root = root.trim_matches('/');
        if root.is_empty() {
            (self.dir.clone(), self.to_string())
        } else {
            (format!("{root}/{}", self.dir), format!("{root}/{self}"))
        }
    }
}

impl fmt::Display for ContainerPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.dir, self.file)
    }
}

/// 会话内固定的块几何参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    block_size: u64,
    superblock_size: u64,
    container_bytes: u64,
}

impl Layout {
    pub fn new(block_size: u64, superblock_size: u64) -> Result<Self> {
        if block_size == 0 || superblock_size == 0 {
            return Err(DiskError::Config(format!(
                "invalid geometry: block size {block_size}, superblock size {superblock_size}"
            )));
        }
        let container_bytes = block_size.checked_mul(superblock_size).ok_or_else(|| {
            DiskError::Config(format!(
                "superblock file size overflows: {superblock_size} blocks of {block_size} bytes"
            ))
        })?;
        Ok(Self {
            block_size,
            superblock_size,
            container_bytes,
        })
    }

    pub fn from_config(config: &DiskConfig) -> Result<Self> {
        Self::new(config.block_size, config.superblock_size)
    }

    pub fn block_size(&self) -> u64 {
        self.block_size
    }

    pub fn superblock_size(&self) -> u64 {
        self.superblock_size
    }

    /// 单个 superblock 文件的字节数
    pub fn container_bytes(&self) -> u64 {
        self.container_bytes
    }

    pub fn container_index(&self, block: BlockAddress) -> ContainerIndex {
        block / self.superblock_size
    }

    pub fn container_path(&self, index: ContainerIndex) -> ContainerPath {
        ContainerPath::new(index)
    }

    /// 该块是否为所在文件的第一块
    pub fn is_container_boundary(&self, block: BlockAddress) -> bool {
        block % self.superblock_size == 0
    }

    /// 块在所在文件内的字节偏移，等价于 (block * block_size) mod container_bytes
    pub fn container_offset(&self, block: BlockAddress) -> u64 {
        (block % self.superblock_size) * self.block_size
    }

    /// `count` 个块占用的字节数
    pub fn run_bytes(&self, count: u64) -> Option<usize> {
        count
            .checked_mul(self.block_size)
            .and_then(|bytes| usize::try_from(bytes).ok())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn container_index_and_boundaries() {
        let layout = Layout::new(4096, 256).unwrap();
        assert_eq!(layout.container_index(0), 0);
        assert_eq!(layout.container_index(255), 0);
        assert_eq!(layout.container_index(256), 1);
        assert_eq!(layout.container_index(300), 1);
        assert!(layout.is_container_boundary(0));
        assert!(layout.is_container_boundary(512));
        assert!(!layout.is_container_boundary(300));
        assert_eq!(layout.container_offset(300), 44 * 4096);
        assert_eq!(layout.container_bytes(), 1 << 20);
    }

    #[test]
    fn offset_does_not_overflow_for_large_blocks() {
        let layout = Layout::new(4096, 256).unwrap();
        let block = u64::MAX - 1;
        assert_eq!(layout.container_offset(block), (block % 256) * 4096);
        assert_eq!(layout.container_index(block), block / 256);
    }

    #[test]
    fn path_layout_is_low_nibble_first() {
        assert_eq!(ContainerPath::new(0).to_string(), "000/0000000000000.img");
        assert_eq!(ContainerPath::new(1).to_string(), "100/0000000000000.img");
        assert_eq!(ContainerPath::new(0x123).to_string(), "321/0000000000000.img");
        assert_eq!(
            ContainerPath::new(0xafaf_bc).to_string(),
            "cbf/afa0000000000.img"
        );
        assert_eq!(
            ContainerPath::new(u64::MAX).to_string(),
            "fff/fffffffffffff.img"
        );
    }

    #[test]
    fn path_is_stable_and_collision_free() {
        let mut seen = HashSet::new();
        let samples = (0..5000u64)
            .chain((0..64).map(|bit| 1u64 << bit))
            .chain([u64::MAX, u64::MAX - 1, 0xdead_beef]);
        for index in samples {
            let path = ContainerPath::new(index);
            assert_eq!(path, ContainerPath::new(index));
            assert_eq!(ContainerPath::parse(&path.to_string()), Some(index));
            seen.insert((index, path.to_string()));
        }
        let paths: HashSet<_> = seen.iter().map(|(_, p)| p.clone()).collect();
        assert_eq!(paths.len(), seen.len());
    }

    #[test]
    fn parse_rejects_foreign_names() {
        assert_eq!(ContainerPath::parse("000/000.img"), None);
        assert_eq!(ContainerPath::parse("00g/0000000000000.img"), None);
        assert_eq!(ContainerPath::parse("000/0000000000000.raw"), None);
        assert_eq!(ContainerPath::parse("0000000000000000.img"), None);
    }

    #[test]
    fn paths_are_joined_under_disk_root() {
        let path = ContainerPath::new(1);
        assert_eq!(
            path.under(""),
            ("100".to_string(), "100/0000000000000.img".to_string())
        );
        assert_eq!(
            path.under("/vm/disk0/"),
            (
                "vm/disk0/100".to_string(),
                "vm/disk0/100/0000000000000.img".to_string()
            )
        );
    }

    #[test]
    fn rejects_degenerate_geometry() {
        assert!(Layout::new(0, 256).is_err());
        assert!(Layout::new(4096, 0).is_err());
        assert!(Layout::new(u64::MAX, 2).is_err());
    }
}
