//! 一次磁盘会话：绑定地址、几何参数和远端连接

use std::path::PathBuf;

use chrono::{DateTime, Local};
use serde::Serialize;
use tracing::{info, info_span, Span};
use uuid::Uuid;

use crate::{
    config::DiskConfig,
    disk::{
        block_device::BlockDevice,
        engine::{Location, SuperblockDisk},
        layout::Layout,
        types::{BlockAddress, SizeInfo},
    },
    error::Result,
    share_url::ShareUrl,
    store::{MemoryShare, MountedShare},
    utils::{current_time, generate_session_id},
};

/// 默认的共享挂载根目录
pub const DEFAULT_MOUNT_ROOT: &str = "/mnt/smb";

/// 共享的接入方式
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    /// 共享已挂载在 `<root>/<host>/<share>`
    Mounted { root: PathBuf },
    /// 进程内共享，会话结束即丢弃
    Memory,
}

impl Default for Backend {
    fn default() -> Self {
        Backend::Mounted {
            root: PathBuf::from(DEFAULT_MOUNT_ROOT),
        }
    }
}

impl Backend {
    pub fn name(&self) -> &'static str {
        match self {
            Backend::Mounted { .. } => "mounted",
            Backend::Memory => "memory",
        }
    }
}

/// 会话概要，用于展示
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub id: Uuid,
    pub url: String,
    pub backend: String,
    pub block_size: u64,
    pub superblock_size: u64,
    pub superblock_bytes: u64,
    pub size: u64,
    pub opened_at: DateTime<Local>,
}

pub struct Session {
    id: Uuid,
    url: ShareUrl,
    config: DiskConfig,
    backend: &'static str,
    opened_at: DateTime<Local>,
    span: Span,
    disk: Box<dyn BlockDevice>,
}

impl Session {
    /// 校验配置并连接共享；配置错误在任何 I/O 之前返回
    pub fn open(url: ShareUrl, config: DiskConfig, backend: &Backend) -> Result<Self> {
        config.validate()?;
        let layout = Layout::from_config(&config)?;

        let id = generate_session_id();
        let span = info_span!("session", id = %id);

        let disk = span.in_scope(|| -> Result<Box<dyn BlockDevice>> {
            let disk: Box<dyn BlockDevice> = match backend {
                Backend::Mounted { root } => {
                    let store = MountedShare::connect(root, &url)?;
                    Box::new(SuperblockDisk::new(store, url.path.clone(), layout))
                }
                Backend::Memory => {
                    let mut store = MemoryShare::new();
                    store.create_dir_all(&url.path);
                    Box::new(SuperblockDisk::new(store, url.path.clone(), layout))
                }
            };
            info!(
                url = %url,
                backend = backend.name(),
                block_size = config.block_size,
                superblock_size = config.superblock_size,
                "session opened"
            );
            Ok(disk)
        })?;

        Ok(Self {
            id,
            url,
            config,
            backend: backend.name(),
            opened_at: current_time(),
            span,
            disk,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn url(&self) -> &ShareUrl {
        &self.url
    }

    pub fn config(&self) -> &DiskConfig {
        &self.config
    }

    pub fn layout(&self) -> Layout {
        self.disk.layout()
    }

    pub fn info(&self) -> SessionInfo {
        let layout = self.layout();
        SessionInfo {
            id: self.id,
            url: self.url.to_string(),
            backend: self.backend.to_string(),
            block_size: layout.block_size(),
            superblock_size: layout.superblock_size(),
            superblock_bytes: layout.container_bytes(),
            size: self.config.size,
            opened_at: self.opened_at,
        }
    }

    pub fn read_block(&mut self, block_index: BlockAddress, block_count: u64, buf: &mut [u8]) -> Result<()> {
        let _guard = self.span.enter();
        self.disk.read_block(block_index, block_count, buf)
    }

    pub fn write_block(&mut self, block_index: BlockAddress, block_count: u64, buf: Option<&[u8]>) -> Result<()> {
        let _guard = self.span.enter();
        self.disk.write_block(block_index, block_count, buf)
    }

    pub fn trim_block(&mut self, block_index: BlockAddress, block_count: u64) -> Result<()> {
        let _guard = self.span.enter();
        self.disk.trim_block(block_index, block_count)
    }

    pub fn get_size_info(&mut self) -> Result<SizeInfo> {
        let _guard = self.span.enter();
        self.disk.get_size_info()
    }

    pub fn locate(&self, block: BlockAddress) -> Location {
        self.disk.locate(block)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        let _guard = self.span.enter();
        info!("session closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DiskError;

    #[test]
    fn memory_session_round_trips() {
        let url = ShareUrl::parse("smb://nas/disks/vm0").unwrap();
        let mut session = Session::open(url, DiskConfig::default(), &Backend::Memory).unwrap();
        let data = vec![0x5au8; 4096];
        session.write_block(7, 1, Some(&data[..])).unwrap();
        let mut out = vec![0u8; 4096];
        session.read_block(7, 1, &mut out).unwrap();
        assert_eq!(out, data);
        assert_eq!(session.locate(7).path, "vm0/000/0000000000000.img");
    }

    #[test]
    fn info_hides_credentials() {
        let url = ShareUrl::parse("smb://alice:pw@nas/disks").unwrap();
        let session = Session::open(url, DiskConfig::default(), &Backend::Memory).unwrap();
        let info = session.info();
        assert_eq!(info.url, "smb://nas/disks/");
        assert_eq!(info.superblock_bytes, 1 << 20);
        assert_eq!(info.backend, "memory");
    }

    #[test]
    fn invalid_geometry_fails_before_connecting() {
        let url = ShareUrl::parse("smb://nas/disks").unwrap();
        let config = DiskConfig {
            superblock_size: 0,
            ..DiskConfig::default()
        };
        let backend = Backend::Mounted {
            root: PathBuf::from("/nonexistent/mount/root"),
        };
        let err = Session::open(url, config, &backend).err().unwrap();
        assert!(matches!(err, DiskError::Config(_)));
    }
}
