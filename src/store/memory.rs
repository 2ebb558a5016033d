//! 进程内的共享实现，用于测试与 `--memory` 会话
//!
//! 支持故障注入：让某个原语的第 n 次调用以指定 errno 失败。

use std::{
    collections::{HashMap, HashSet},
    io::{self, SeekFrom},
};

use tracing::trace;

use crate::{
    error::StoreOp,
    store::{FileStat, OpenFlags, RemoteStore, StatVfs},
};

#[derive(Debug, Clone, Copy)]
struct Fault {
    op: StoreOp,
    skip: usize,
    errno: i32,
}

/// 打开的文件句柄
#[derive(Debug)]
pub struct MemoryFile {
    path: String,
    pos: u64,
    readable: bool,
    writable: bool,
}

#[derive(Debug)]
pub struct MemoryShare {
    files: HashMap<String, Vec<u8>>,
    dirs: HashSet<String>,
    faults: Vec<Fault>,
    mkdir_race: bool,
    capacity: StatVfs,
    open_handles: usize,
    max_open_handles: usize,
    opens: usize,
}

impl Default for MemoryShare {
    fn default() -> Self {
        Self::new()
    }
}

fn errno(code: i32) -> io::Error {
    io::Error::from_raw_os_error(code)
}

fn normalize(path: &str) -> String {
    path.trim_matches('/').to_string()
}

fn parent(path: &str) -> &str {
    path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

impl MemoryShare {
    pub fn new() -> Self {
        let mut dirs = HashSet::new();
        dirs.insert(String::new());
        Self {
            files: HashMap::new(),
            dirs,
            faults: Vec::new(),
            mkdir_race: false,
            // 默认 1TiB，全部空闲
            capacity: StatVfs {
                block_size: 4096,
                fragment_size: 4096,
                total_blocks: 1 << 28,
                free_blocks: 1 << 28,
            },
            open_handles: 0,
            max_open_handles: 0,
            opens: 0,
        }
    }

    pub fn with_capacity(mut self, capacity: StatVfs) -> Self {
        self.capacity = capacity;
        self
    }

    /// 让 `op` 的下一次调用以 `errno` 失败
    pub fn fail_next(&mut self, op: StoreOp, errno: i32) {
        self.fail_nth(op, 0, errno);
    }

    /// 放过 `skip` 次调用后，让 `op` 以 `errno` 失败一次
    pub fn fail_nth(&mut self, op: StoreOp, skip: usize, errno: i32) {
        self.faults.push(Fault { op, skip, errno });
    }

    /// 下一次 mkdir 时模拟其他写者抢先创建了目录
    pub fn simulate_mkdir_race(&mut self) {
        self.mkdir_race = true;
    }

    pub fn create_dir_all(&mut self, path: &str) {
        let path = normalize(path);
        let mut current = String::new();
        for part in path.split('/').filter(|p| !p.is_empty()) {
            if !current.is_empty() {
                current.push('/');
            }
            current.push_str(part);
            self.dirs.insert(current.clone());
        }
    }

    /// 直接放入一个文件，父目录自动补齐
    pub fn insert_file(&mut self, path: &str, data: Vec<u8>) {
        let path = normalize(path);
        self.create_dir_all(parent(&path));
        self.files.insert(path, data);
    }

    pub fn has_dir(&self, path: &str) -> bool {
        self.dirs.contains(&normalize(path))
    }

    pub fn file_len(&self, path: &str) -> Option<u64> {
        self.files.get(&normalize(path)).map(|d| d.len() as u64)
    }

    pub fn file_bytes(&self, path: &str) -> Option<&[u8]> {
        self.files.get(&normalize(path)).map(Vec::as_slice)
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn open_handles(&self) -> usize {
        self.open_handles
    }

    pub fn max_open_handles(&self) -> usize {
        self.max_open_handles
    }

    /// 累计成功打开的次数
    pub fn opens(&self) -> usize {
        self.opens
    }

    fn check_fault(&mut self, op: StoreOp) -> io::Result<()> {
        let Some(pos) = self.faults.iter().position(|f| f.op == op) else {
            return Ok(());
        };
        if self.faults[pos].skip > 0 {
            self.faults[pos].skip -= 1;
            return Ok(());
        }
        let fault = self.faults.remove(pos);
        trace!(op = %op, errno = fault.errno, "injected fault");
        Err(errno(fault.errno))
    }

    fn data_mut(&mut self, file: &MemoryFile) -> io::Result<&mut Vec<u8>> {
        self.files.get_mut(&file.path).ok_or_else(|| errno(libc::ESTALE))
    }
}

impl RemoteStore for MemoryShare {
    type File = MemoryFile;

    fn open(&mut self, path: &str, flags: OpenFlags, _mode: u32) -> io::Result<MemoryFile> {
        self.check_fault(StoreOp::Open)?;
        let path = normalize(path);
        if !self.dirs.contains(parent(&path)) {
            return Err(errno(libc::ENOENT));
        }
        if self.dirs.contains(&path) {
            return Err(errno(libc::EISDIR));
        }
        if !self.files.contains_key(&path) {
            if !flags.contains(OpenFlags::CREATE) {
                return Err(errno(libc::ENOENT));
            }
            self.files.insert(path.clone(), Vec::new());
        }

        self.opens += 1;
        self.open_handles += 1;
        self.max_open_handles = self.max_open_handles.max(self.open_handles);
        Ok(MemoryFile {
            path,
            pos: 0,
            readable: flags.contains(OpenFlags::READ) || !flags.is_writing(),
            writable: flags.is_writing(),
        })
    }

    fn close(&mut self, file: MemoryFile) -> io::Result<()> {
        self.open_handles = self.open_handles.saturating_sub(1);
        trace!(path = %file.path, "closed");
        self.check_fault(StoreOp::Close)
    }

    fn read(&mut self, file: &mut MemoryFile, buf: &mut [u8]) -> io::Result<usize> {
        self.check_fault(StoreOp::Read)?;
        if !file.readable {
            return Err(errno(libc::EBADF));
        }
        let data = self.data_mut(file)?;
        let start = usize::try_from(file.pos).map_err(|_| errno(libc::EOVERFLOW))?;
        if start >= data.len() {
            return Ok(0);
        }
        let n = buf.len().min(data.len() - start);
        buf[..n].copy_from_slice(&data[start..start + n]);
        file.pos += n as u64;
        Ok(n)
    }

    fn write(&mut self, file: &mut MemoryFile, buf: &[u8]) -> io::Result<usize> {
        self.check_fault(StoreOp::Write)?;
        if !file.writable {
            return Err(errno(libc::EBADF));
        }
        let start = usize::try_from(file.pos).map_err(|_| errno(libc::EOVERFLOW))?;
        let data = self.data_mut(file)?;
        let end = start + buf.len();
        if data.len() < end {
            data.resize(end, 0);
        }
        data[start..end].copy_from_slice(buf);
        file.pos = end as u64;
        Ok(buf.len())
    }

    fn seek(&mut self, file: &mut MemoryFile, pos: SeekFrom) -> io::Result<u64> {
        self.check_fault(StoreOp::Seek)?;
        let len = self.data_mut(file)?.len() as u64;
        let target = match pos {
            SeekFrom::Start(n) => Some(n),
            SeekFrom::Current(d) => file.pos.checked_add_signed(d),
            SeekFrom::End(d) => len.checked_add_signed(d),
        };
        file.pos = target.ok_or_else(|| errno(libc::EINVAL))?;
        Ok(file.pos)
    }

    fn fstat(&mut self, file: &MemoryFile) -> io::Result<FileStat> {
        self.check_fault(StoreOp::Stat)?;
        let size = self.data_mut(file)?.len() as u64;
        Ok(FileStat { size })
    }

    fn ftruncate(&mut self, file: &mut MemoryFile, len: u64) -> io::Result<()> {
        self.check_fault(StoreOp::Truncate)?;
        if !file.writable {
            return Err(errno(libc::EBADF));
        }
        let len = usize::try_from(len).map_err(|_| errno(libc::EFBIG))?;
        self.data_mut(file)?.resize(len, 0);
        Ok(())
    }

    fn mkdir(&mut self, path: &str, _mode: u32) -> io::Result<()> {
        self.check_fault(StoreOp::Mkdir)?;
        let path = normalize(path);
        if self.mkdir_race {
            self.mkdir_race = false;
            self.create_dir_all(&path);
            return Err(errno(libc::EEXIST));
        }
        if !self.dirs.contains(parent(&path)) {
            return Err(errno(libc::ENOENT));
        }
        if self.dirs.contains(&path) || self.files.contains_key(&path) {
            return Err(errno(libc::EEXIST));
        }
        self.dirs.insert(path);
        Ok(())
    }

    fn statvfs(&mut self, path: &str) -> io::Result<StatVfs> {
        self.check_fault(StoreOp::Statvfs)?;
        if !self.dirs.contains(&normalize(path)) {
            return Err(errno(libc::ENOENT));
        }
        Ok(self.capacity)
    }
}
