//! 宿主适配层：把引擎暴露为按字节寻址的块设备
//!
//! 配置以 key=value 形式逐项传入，`config_complete` 之后才允许打开连接。
//! 读写接口返回 0 或 errno，与块设备服务端的回调约定一致。

use std::path::PathBuf;

use tracing::{debug, error};

use crate::{
    config::{parse_size, DiskConfig},
    disk::{Backend, Session},
    error::{DiskError, Result},
    share_url::ShareUrl,
};

pub const NAME: &str = "smb";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, Default)]
pub struct PluginConfig {
    url: Option<String>,
    disk: DiskConfig,
    backend: Backend,
}

impl PluginConfig {
    pub const HELP: &'static str = "\
url=smb://[[WORKGROUP:][USER][:PASSWORD]@]HOST/SHARE/PATH/
    The SMB URL at which the disk should be stored
size=1G
    The size of the disk
root=/mnt/smb
    Directory where shares are mounted as <root>/<HOST>/<SHARE>
backend=mounted|memory
    Where superblock files are kept
block-size=4096
superblock-size=256
    Geometry of the superblock files";

    pub fn new() -> Self {
        Self::default()
    }

    /// 处理一项配置
    pub fn config(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "url" => self.url = Some(value.to_string()),
            "size" => self.disk.size = parse_size(value)?,
            "block-size" => self.disk.block_size = parse_size(value)?,
            "superblock-size" => {
                self.disk.superblock_size = value
                    .trim()
                    .parse()
                    .map_err(|_| DiskError::Config(format!("invalid superblock size '{value}'")))?
            }
            "root" => {
                self.backend = Backend::Mounted {
                    root: PathBuf::from(value),
                }
            }
            "backend" => {
                self.backend = match value {
                    "memory" => Backend::Memory,
                    "mounted" => match &self.backend {
                        Backend::Mounted { root } => Backend::Mounted { root: root.clone() },
                        Backend::Memory => Backend::default(),
                    },
                    other => return Err(DiskError::Config(format!("unknown backend '{other}'"))),
                }
            }
            other => return Err(DiskError::Config(format!("unknown parameter '{other}'"))),
        }
        Ok(())
    }

    /// 所有配置项传入后调用，校验地址与几何参数
    pub fn config_complete(&self) -> Result<()> {
        let url = self.url.as_deref().ok_or_else(|| {
            DiskError::Config(
                "you must supply the url parameter after the plugin name on the command line"
                    .into(),
            )
        })?;
        ShareUrl::parse(url)?;
        self.disk.validate()
    }

    pub fn dump(&self) -> String {
        format!(
            "url={}\nsize={}\nblock-size={}\nsuperblock-size={}\nbackend={}",
            self.url
                .as_deref()
                .and_then(|u| ShareUrl::parse(u).ok())
                .map(|u| u.to_string())
                .unwrap_or_default(),
            self.disk.size,
            self.disk.block_size,
            self.disk.superblock_size,
            self.backend.name(),
        )
    }

    pub fn disk(&self) -> &DiskConfig {
        &self.disk
    }
}

/// 已完成配置的插件
#[derive(Debug)]
pub struct Plugin {
    url: ShareUrl,
    config: PluginConfig,
}

impl Plugin {
    pub fn new(config: PluginConfig) -> Result<Self> {
        config.config_complete()?;
        let url = ShareUrl::parse(config.url.as_deref().unwrap_or_default())?;
        Ok(Self { url, config })
    }

    pub fn open(&self, readonly: bool) -> Result<Connection> {
        let session = Session::open(self.url.clone(), self.config.disk, &self.config.backend)?;
        debug!(session = %session.id(), readonly, "connection opened");
        Ok(Connection { session, readonly })
    }
}

/// 每个客户端连接持有一个会话
pub struct Connection {
    session: Session,
    readonly: bool,
}

impl Connection {
    pub fn get_size(&self) -> u64 {
        self.session.config().size
    }

    pub fn can_write(&self) -> bool {
        !self.readonly
    }

    /// 未实现 trim
    pub fn can_trim(&self) -> bool {
        false
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// 将字节区间换算为块区间
    fn blocks(&self, count: usize, offset: u64) -> Result<(u64, u64)> {
        let block_size = self.session.layout().block_size();
        let count = count as u64;
        if offset % block_size != 0 || count % block_size != 0 {
            return Err(DiskError::Unaligned {
                offset,
                count,
                block_size,
            });
        }
        Ok((offset / block_size, count / block_size))
    }

    pub fn try_pread(&mut self, buf: &mut [u8], offset: u64) -> Result<()> {
        let (index, count) = self.blocks(buf.len(), offset)?;
        self.session.read_block(index, count, buf)
    }

    pub fn try_pwrite(&mut self, buf: &[u8], offset: u64) -> Result<()> {
        if self.readonly {
            return Err(DiskError::ReadOnly);
        }
        let (index, count) = self.blocks(buf.len(), offset)?;
        self.session.write_block(index, count, Some(buf))
    }

    /// 返回 0 或 errno
    pub fn pread(&mut self, buf: &mut [u8], offset: u64) -> i32 {
        status(self.try_pread(buf, offset))
    }

    /// 返回 0 或 errno
    pub fn pwrite(&mut self, buf: &[u8], offset: u64) -> i32 {
        status(self.try_pwrite(buf, offset))
    }

    pub fn close(self) {
        debug!(session = %self.session.id(), "connection closed");
    }
}

fn status(result: Result<()>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(e) => {
            error!("{e}");
            e.to_errno()
        }
    }
}
