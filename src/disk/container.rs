//! superblock 文件的打开、创建与尺寸规整
//!
//! 每个子区间独占一个句柄，离开作用域时自动关闭，因此同一时刻最多只有一个打开的文件。

use std::io::{self, SeekFrom};

use tracing::{debug, warn};

use crate::{
    disk::{layout::Layout, runs::SubRun, types::CONTAINER_MODE},
    error::{DiskError, Result, StoreOp},
    store::{OpenFlags, RemoteStore},
};

/// 访问方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
}

impl Access {
    fn flags(self) -> OpenFlags {
        match self {
            Access::Read => OpenFlags::READ,
            Access::Write => OpenFlags::WRITE | OpenFlags::CREATE,
        }
    }
}

/// 作用域内的文件句柄
pub struct ContainerFile<'a, S: RemoteStore> {
    store: &'a mut S,
    file: Option<S::File>,
    path: String,
}

impl<'a, S: RemoteStore> ContainerFile<'a, S> {
    pub fn path(&self) -> &str {
        &self.path
    }

    fn parts(&mut self) -> io::Result<(&mut S, &mut S::File)> {
        match self.file.as_mut() {
            Some(file) => Ok((&mut *self.store, file)),
            None => Err(io::Error::from_raw_os_error(libc::EBADF)),
        }
    }

    fn fail(&self, op: StoreOp, source: io::Error) -> DiskError {
        DiskError::store(op, self.path.clone(), source)
    }

    pub fn len(&mut self) -> Result<u64> {
        let stat = self
            .parts()
            .and_then(|(store, file)| store.fstat(file))
            .map_err(|e| self.fail(StoreOp::Stat, e))?;
        Ok(stat.size)
    }

    pub fn set_len(&mut self, len: u64) -> Result<()> {
        self.parts()
            .and_then(|(store, file)| store.ftruncate(file, len))
            .map_err(|e| self.fail(StoreOp::Truncate, e))
    }

    pub fn seek(&mut self, offset: u64) -> Result<()> {
        self.parts()
            .and_then(|(store, file)| store.seek(file, SeekFrom::Start(offset)))
            .map_err(|e| self.fail(StoreOp::Seek, e))?;
        Ok(())
    }

    /// 读满整个缓冲区；文件提前结束时剩余部分补零
    pub fn read_full(&mut self, buf: &mut [u8]) -> Result<()> {
        let mut filled = 0;
        while filled < buf.len() {
            let res = self
                .parts()
                .and_then(|(store, file)| store.read(file, &mut buf[filled..]));
            match res {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(self.fail(StoreOp::Read, e)),
            }
        }
        if filled < buf.len() {
            debug!(path = %self.path, filled, wanted = buf.len(), "short superblock file, padding with zeros");
            buf[filled..].fill(0);
        }
        Ok(())
    }

    pub fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        let mut written = 0;
        while written < buf.len() {
            let res = self
                .parts()
                .and_then(|(store, file)| store.write(file, &buf[written..]));
            match res {
                Ok(0) => {
                    return Err(self.fail(
                        StoreOp::Write,
                        io::Error::new(io::ErrorKind::WriteZero, "remote accepted no bytes"),
                    ))
                }
                Ok(n) => written += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(self.fail(StoreOp::Write, e)),
            }
        }
        Ok(())
    }

    /// 显式关闭并上报错误；出错路径上由 Drop 关闭
    pub fn close(mut self) -> Result<()> {
        match self.file.take() {
            Some(file) => self
                .store
                .close(file)
                .map_err(|e| self.fail(StoreOp::Close, e)),
            None => Ok(()),
        }
    }

    /// 写入前将文件长度规整为完整的 superblock 大小
    fn normalize(&mut self, container_bytes: u64) -> Result<()> {
        let size = self.len()?;
        if size != container_bytes {
            debug!(path = %self.path, from = size, to = container_bytes, "resizing superblock file");
            self.set_len(container_bytes)?;
        }
        Ok(())
    }
}

impl<S: RemoteStore> Drop for ContainerFile<'_, S> {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            // 不能覆盖正在传播的错误，只记录
            if let Err(e) = self.store.close(file) {
                warn!(path = %self.path, error = %e, "failed to close superblock file");
            }
        }
    }
}

/// 为子区间取得已定位的句柄
///
/// 读取时文件或目录不存在返回 `None`；写入时按需创建目录和文件并规整尺寸。
pub fn acquire<'a, S: RemoteStore>(
    store: &'a mut S,
    root: &str,
    layout: &Layout,
    run: &SubRun,
    access: Access,
) -> Result<Option<ContainerFile<'a, S>>> {
    let (dir, path) = layout.container_path(run.container).under(root);
    let flags = access.flags();

    let file = match store.open(&path, flags, CONTAINER_MODE) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => match access {
            Access::Read => {
                debug!(path = %path, "superblock file absent, reading zeros");
                return Ok(None);
            }
            Access::Write => {
                match store.mkdir(&dir, CONTAINER_MODE) {
                    Ok(()) => debug!(dir = %dir, "created superblock directory"),
                    // 其他写者可能已抢先创建
                    Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                        debug!(dir = %dir, "superblock directory already exists")
                    }
                    Err(e) => return Err(DiskError::store(StoreOp::Mkdir, dir, e)),
                }
                store
                    .open(&path, flags, CONTAINER_MODE)
                    .map_err(|e| DiskError::store(StoreOp::Open, path.clone(), e))?
            }
        },
        Err(e) => return Err(DiskError::store(StoreOp::Open, path, e)),
    };

    let mut container = ContainerFile {
        store,
        file: Some(file),
        path,
    };
    if access == Access::Write {
        container.normalize(layout.container_bytes())?;
    }
    container.seek(layout.container_offset(run.start))?;
    Ok(Some(container))
}
