//! 把一块虚拟磁盘切成固定大小的 superblock 文件存放在 SMB 共享上

pub mod config;
pub mod disk;
pub mod error;
pub mod plugin;
pub mod share_url;
pub mod shell;
pub mod store;
pub mod utils;

pub use config::DiskConfig;
pub use disk::{BlockDevice, Layout, Session, SuperblockDisk};
pub use error::{DiskError, Result};
pub use share_url::ShareUrl;
