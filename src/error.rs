use std::fmt;
use std::io;

use thiserror::Error;

/// 远端存储原语，用于在错误中标明失败的操作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    Connect,
    Open,
    Close,
    Read,
    Write,
    Seek,
    Stat,
    Truncate,
    Mkdir,
    Statvfs,
}

impl fmt::Display for StoreOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connect => "connect",
            Self::Open => "open",
            Self::Close => "close",
            Self::Read => "read",
            Self::Write => "write",
            Self::Seek => "seek",
            Self::Stat => "stat",
            Self::Truncate => "truncate",
            Self::Mkdir => "mkdir",
            Self::Statvfs => "statvfs",
        };
        f.write_str(name)
    }
}

/// 虚拟磁盘错误类型
#[derive(Debug, Error)]
pub enum DiskError {
    /// 远端存储原语失败，保留底层错误码
    #[error("{op} failed on '{path}': {source}")]
    Store {
        op: StoreOp,
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("invalid share url: {0}")]
    InvalidUrl(String),

    #[error("unsupported protocol '{0}' in url, expected 'smb'")]
    UnsupportedScheme(String),

    /// 配置错误（几何参数、大小、未知配置项等）
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("buffer too small: need {needed} bytes, got {actual}")]
    BufferTooSmall { needed: usize, actual: usize },

    #[error("block range overflows: start {index}, count {count}")]
    RangeOverflow { index: u64, count: u64 },

    #[error("request not aligned to {block_size}-byte blocks: offset {offset}, count {count}")]
    Unaligned {
        offset: u64,
        count: u64,
        block_size: u64,
    },

    #[error("disk is opened read-only")]
    ReadOnly,

    #[error("{0} is not supported")]
    Unsupported(&'static str),
}

impl DiskError {
    pub(crate) fn store(op: StoreOp, path: impl Into<String>, source: io::Error) -> Self {
        Self::Store {
            op,
            path: path.into(),
            source,
        }
    }

    /// 映射为 POSIX errno，供宿主适配层返回
    pub fn to_errno(&self) -> i32 {
        match self {
            Self::Store { source, .. } => source.raw_os_error().unwrap_or(libc::EIO),
            Self::InvalidUrl(_) => libc::EINVAL,
            Self::UnsupportedScheme(_) => libc::EPROTONOSUPPORT,
            Self::Config(_) => libc::EINVAL,
            Self::BufferTooSmall { .. } => libc::EINVAL,
            Self::RangeOverflow { .. } => libc::EOVERFLOW,
            Self::Unaligned { .. } => libc::EINVAL,
            Self::ReadOnly => libc::EROFS,
            Self::Unsupported(_) => libc::EOPNOTSUPP,
        }
    }
}

/// 统一结果类型
pub type Result<T> = std::result::Result<T, DiskError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_keeps_os_code() {
        let err = DiskError::store(
            StoreOp::Open,
            "disk/000/0000000000000.img",
            io::Error::from_raw_os_error(libc::EACCES),
        );
        assert_eq!(err.to_errno(), libc::EACCES);
        assert!(err.to_string().starts_with("open failed on"));
    }

    #[test]
    fn synthetic_store_error_falls_back_to_eio() {
        let err = DiskError::store(
            StoreOp::Write,
            "x",
            io::Error::new(io::ErrorKind::WriteZero, "remote accepted no bytes"),
        );
        assert_eq!(err.to_errno(), libc::EIO);
    }

    #[test]
    fn configuration_errors_map_to_einval() {
        assert_eq!(DiskError::InvalidUrl("x".into()).to_errno(), libc::EINVAL);
        assert_eq!(DiskError::Config("x".into()).to_errno(), libc::EINVAL);
        assert_eq!(DiskError::Unsupported("trim").to_errno(), libc::EOPNOTSUPP);
        assert_eq!(DiskError::ReadOnly.to_errno(), libc::EROFS);
    }
}
