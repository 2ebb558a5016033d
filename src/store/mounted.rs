//! 挂载到本地目录的共享（例如 CIFS 挂载在 `<root>/<host>/<share>`）

use std::{
    fs::{self, DirBuilder, File, OpenOptions},
    io::{self, Read, Seek, SeekFrom, Write},
    os::{
        fd::IntoRawFd,
        unix::fs::{DirBuilderExt, OpenOptionsExt},
    },
    path::{Path, PathBuf},
};

use tracing::{debug, info, warn};

use crate::{
    error::{DiskError, Result, StoreOp},
    share_url::ShareUrl,
    store::{FileStat, OpenFlags, RemoteStore, StatVfs},
};

/// CIFS 挂载参数 domain/username/password 的长度上限
const MAX_WORKGROUP_LEN: usize = 256;
const MAX_USERNAME_LEN: usize = 256;
const MAX_PASSWORD_LEN: usize = 512;

#[derive(Debug)]
pub struct MountedShare {
    root: PathBuf,
}

impl MountedShare {
    /// 直接以某个目录作为共享根目录
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// 按地址定位挂载目录，并走一遍认证回调
    pub fn connect<P: AsRef<Path>>(mount_root: P, url: &ShareUrl) -> Result<Self> {
        let auth = url.auth_data(&url.host, &url.share).truncated(
            MAX_WORKGROUP_LEN,
            MAX_USERNAME_LEN,
            MAX_PASSWORD_LEN,
        );
        if auth.workgroup != url.workgroup
            || auth.username != url.user
            || auth.password != url.password
        {
            warn!(host = %url.host, "credentials exceed mount limits and were truncated");
        }
        debug!(
            host = %url.host,
            share = %url.share,
            workgroup = %auth.workgroup,
            user = %auth.username,
            "connecting to mounted share"
        );

        let root = mount_root.as_ref().join(&url.host).join(&url.share);
        let meta = fs::metadata(&root)
            .map_err(|e| DiskError::store(StoreOp::Connect, root.display().to_string(), e))?;
        if !meta.is_dir() {
            return Err(DiskError::store(
                StoreOp::Connect,
                root.display().to_string(),
                io::Error::from_raw_os_error(libc::ENOTDIR),
            ));
        }

        info!(root = %root.display(), "share connected");
        Ok(Self::new(root))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let rel = path.trim_start_matches('/');
        if rel.is_empty() {
            self.root.clone()
        } else {
            self.root.join(rel)
        }
    }
}

impl RemoteStore for MountedShare {
    type File = File;

    fn open(&mut self, path: &str, flags: OpenFlags, mode: u32) -> io::Result<File> {
        OpenOptions::new()
            .read(flags.contains(OpenFlags::READ))
            .write(flags.contains(OpenFlags::WRITE))
            .create(flags.contains(OpenFlags::CREATE))
            .mode(mode)
            .open(self.resolve(path))
    }

    /// 直接调用 close(2)，回写错误可能只在关闭时出现
    fn close(&mut self, file: File) -> io::Result<()> {
        nix::unistd::close(file.into_raw_fd()).map_err(io::Error::from)
    }

    fn read(&mut self, file: &mut File, buf: &mut [u8]) -> io::Result<usize> {
        file.read(buf)
    }

    fn write(&mut self, file: &mut File, buf: &[u8]) -> io::Result<usize> {
        file.write(buf)
    }

    fn seek(&mut self, file: &mut File, pos: SeekFrom) -> io::Result<u64> {
        file.seek(pos)
    }

    fn fstat(&mut self, file: &File) -> io::Result<FileStat> {
        Ok(FileStat {
            size: file.metadata()?.len(),
        })
    }

    fn ftruncate(&mut self, file: &mut File, len: u64) -> io::Result<()> {
        file.set_len(len)
    }

    fn mkdir(&mut self, path: &str, mode: u32) -> io::Result<()> {
        DirBuilder::new().mode(mode).create(self.resolve(path))
    }

    fn statvfs(&mut self, path: &str) -> io::Result<StatVfs> {
        let info = nix::sys::statvfs::statvfs(&self.resolve(path)).map_err(io::Error::from)?;
        Ok(StatVfs {
            block_size: info.block_size() as u64,
            fragment_size: info.fragment_size() as u64,
            total_blocks: info.blocks() as u64,
            free_blocks: info.blocks_free() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_resolves_host_and_share() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("nas").join("disks")).unwrap();
        let url = ShareUrl::parse("smb://alice:pw@nas/disks/vm").unwrap();
        let share = MountedShare::connect(tmp.path(), &url).unwrap();
        assert_eq!(share.root(), tmp.path().join("nas").join("disks"));
    }

    #[test]
    fn connect_fails_when_share_is_not_mounted() {
        let tmp = tempfile::tempdir().unwrap();
        let url = ShareUrl::parse("smb://nas/missing").unwrap();
        let err = MountedShare::connect(tmp.path(), &url).unwrap_err();
        assert_eq!(err.to_errno(), libc::ENOENT);
    }

    #[test]
    fn open_without_parent_is_not_found_and_mkdir_reports_exists() {
        let tmp = tempfile::tempdir().unwrap();
        let mut share = MountedShare::new(tmp.path());
        let err = share
            .open("abc/file.img", OpenFlags::WRITE | OpenFlags::CREATE, 0o770)
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);

        share.mkdir("abc", 0o770).unwrap();
        let err = share.mkdir("abc", 0o770).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);

        let mut file = share
            .open("abc/file.img", OpenFlags::WRITE | OpenFlags::CREATE, 0o770)
            .unwrap();
        share.ftruncate(&mut file, 8192).unwrap();
        assert_eq!(share.fstat(&file).unwrap().size, 8192);
        share.close(file).unwrap();
    }

    #[test]
    fn close_releases_handle_after_write() {
        let tmp = tempfile::tempdir().unwrap();
        let mut share = MountedShare::new(tmp.path());
        let mut file = share
            .open("data.img", OpenFlags::WRITE | OpenFlags::CREATE, 0o770)
            .unwrap();
        assert_eq!(share.write(&mut file, b"superblock").unwrap(), 10);
        share.close(file).unwrap();
        assert_eq!(fs::read(tmp.path().join("data.img")).unwrap(), b"superblock");
    }

    #[test]
    fn overlong_credentials_still_connect() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("nas").join("disks")).unwrap();
        let mut url = ShareUrl::parse("smb://alice@nas/disks").unwrap();
        url.password = "x".repeat(MAX_PASSWORD_LEN + 10);
        assert!(MountedShare::connect(tmp.path(), &url).is_ok());
    }

    #[test]
    fn statvfs_reports_capacity() {
        let tmp = tempfile::tempdir().unwrap();
        let mut share = MountedShare::new(tmp.path());
        let info = share.statvfs("").unwrap();
        assert!(info.total_bytes() >= info.free_bytes());
        assert!(info.total_bytes() > 0);
    }
}
