use serde::{Deserialize, Serialize};

use crate::{
    disk::types::{DEFAULT_BLOCK_SIZE, DEFAULT_DISK_SIZE, DEFAULT_SUPERBLOCK_SIZE},
    error::{DiskError, Result},
};

/// 虚拟磁盘的几何参数，会话建立后不再改变
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskConfig {
    /// 每块大小（字节）
    pub block_size: u64,
    /// 每个 superblock 文件包含的块数
    pub superblock_size: u64,
    /// 对外暴露的磁盘大小（字节）
    pub size: u64,
}

impl Default for DiskConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            superblock_size: DEFAULT_SUPERBLOCK_SIZE,
            size: DEFAULT_DISK_SIZE,
        }
    }
}

impl DiskConfig {
    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 {
            return Err(DiskError::Config("block size must be non-zero".into()));
        }
        if self.superblock_size == 0 {
            return Err(DiskError::Config("superblock size must be non-zero".into()));
        }
        if self.container_bytes().is_none() {
            return Err(DiskError::Config(format!(
                "superblock file size overflows: {} blocks of {} bytes",
                self.superblock_size, self.block_size
            )));
        }
        if self.size == 0 {
            return Err(DiskError::Config("disk size must be non-zero".into()));
        }
        Ok(())
    }

    /// 单个 superblock 文件的字节数
    pub fn container_bytes(&self) -> Option<u64> {
        self.block_size.checked_mul(self.superblock_size)
    }
}

/// 解析 "1G"、"512M"、"4096" 之类的大小字符串（二进制倍数）
pub fn parse_size(input: &str) -> Result<u64> {
    let s = input.trim();
    let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (digits, suffix) = s.split_at(split);
    if digits.is_empty() {
        return Err(DiskError::Config(format!("could not parse size '{input}'")));
    }

    let value: u64 = digits
        .parse()
        .map_err(|_| DiskError::Config(format!("size '{input}' is too large")))?;

    let shift = match suffix {
        "" | "b" | "B" => 0,
        "k" | "K" => 10,
        "m" | "M" => 20,
        "g" | "G" => 30,
        "t" | "T" => 40,
        "p" | "P" => 50,
        "e" | "E" => 60,
        other => {
            return Err(DiskError::Config(format!(
                "unknown size suffix '{other}' in '{input}'"
            )))
        }
    };

    value
        .checked_mul(1u64 << shift)
        .ok_or_else(|| DiskError::Config(format!("size '{input}' is too large")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_describe_one_mib_superblocks() {
        let config = DiskConfig::default();
        assert_eq!(config.block_size, 4096);
        assert_eq!(config.superblock_size, 256);
        assert_eq!(config.container_bytes(), Some(1 << 20));
        assert_eq!(config.size, 1 << 30);
        config.validate().unwrap();
    }

    #[test]
    fn rejects_bad_geometry() {
        let zero_block = DiskConfig {
            block_size: 0,
            ..DiskConfig::default()
        };
        assert!(zero_block.validate().is_err());

        let overflow = DiskConfig {
            block_size: u64::MAX / 2,
            superblock_size: 4,
            ..DiskConfig::default()
        };
        assert!(matches!(overflow.validate(), Err(DiskError::Config(_))));
    }

    #[test]
    fn parses_sizes_with_suffixes() {
        assert_eq!(parse_size("4096").unwrap(), 4096);
        assert_eq!(parse_size("1G").unwrap(), 1 << 30);
        assert_eq!(parse_size("512m").unwrap(), 512 << 20);
        assert_eq!(parse_size(" 2T ").unwrap(), 2 << 40);
        assert_eq!(parse_size("7b").unwrap(), 7);
    }

    #[test]
    fn rejects_malformed_sizes() {
        assert!(parse_size("").is_err());
        assert!(parse_size("G").is_err());
        assert!(parse_size("12X").is_err());
        assert!(parse_size("1.5G").is_err());
        assert!(parse_size("99999999999E").is_err());
    }
}
