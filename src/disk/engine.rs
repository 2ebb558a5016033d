//! 块地址翻译引擎：将连续块请求分派到各个 superblock 文件

use serde::Serialize;
use tracing::{instrument, trace};

use crate::{
    disk::{
        block_device::BlockDevice,
        container::{self, Access},
        layout::Layout,
        types::{BlockAddress, ContainerIndex, SizeInfo},
    },
    error::{DiskError, Result, StoreOp},
    store::RemoteStore,
};

/// 某个块在共享上的位置
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Location {
    pub block: BlockAddress,
    pub container: ContainerIndex,
    pub path: String,
    pub offset: u64,
    pub boundary: bool,
}

/// 以 superblock 文件为存储单元的虚拟磁盘
///
/// 不做内部同步：同一实例上的调用必须串行（由 `&mut self` 保证）。
#[derive(Debug)]
pub struct SuperblockDisk<S: RemoteStore> {
    store: S,
    layout: Layout,
    root: String,
}

impl<S: RemoteStore> SuperblockDisk<S> {
    /// `root` 为共享内存放 superblock 文件的目录，必须已存在
    pub fn new(store: S, root: impl Into<String>, layout: Layout) -> Self {
        Self {
            store,
            layout,
            root: root.into().trim_matches('/').to_string(),
        }
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn block_size(&self) -> u64 {
        self.layout.block_size()
    }

    pub fn superblock_size(&self) -> u64 {
        self.layout.superblock_size()
    }

    pub fn locate(&self, block: BlockAddress) -> Location {
        let container = self.layout.container_index(block);
        let (_, path) = self.layout.container_path(container).under(&self.root);
        Location {
            block,
            container,
            path,
            offset: self.layout.container_offset(block),
            boundary: self.layout.is_container_boundary(block),
        }
    }

    /// 检查区间与缓冲区长度，返回请求的字节数
    fn check_range(&self, index: BlockAddress, count: u64, buf_len: Option<usize>) -> Result<usize> {
        let overflow = || DiskError::RangeOverflow { index, count };
        index.checked_add(count).ok_or_else(overflow)?;
        let needed = self.layout.run_bytes(count).ok_or_else(overflow)?;
        if let Some(actual) = buf_len {
            if actual < needed {
                return Err(DiskError::BufferTooSmall { needed, actual });
            }
        }
        Ok(needed)
    }

    fn region(&self, skip: u64, len: u64) -> std::ops::Range<usize> {
        // 已由 check_range 保证不会溢出
        let bs = self.layout.block_size() as usize;
        let lo = skip as usize * bs;
        lo..lo + len as usize * bs
    }

    /// 读取 `block_count` 个块；不存在的文件对应区域填零
    #[instrument(level = "debug", skip(self, buf), fields(root = %self.root))]
    pub fn read_block(
        &mut self,
        block_index: BlockAddress,
        block_count: u64,
        buf: &mut [u8],
    ) -> Result<()> {
        self.check_range(block_index, block_count, Some(buf.len()))?;

        for run in self.layout.sub_runs(block_index, block_count) {
            trace!(start = run.start, len = run.len, container = run.container, "read sub-run");
            let region = &mut buf[self.region(run.skip, run.len)];
            match container::acquire(&mut self.store, &self.root, &self.layout, &run, Access::Read)? {
                Some(mut file) => {
                    file.read_full(region)?;
                    file.close()?;
                }
                None => region.fill(0),
            }
        }
        Ok(())
    }

    /// 写入 `block_count` 个块
    ///
    /// `buf` 为 `None` 时只创建并规整文件，不写数据，用于预分配。
    /// 中途失败不回滚，之前的子区间保持已写入状态。
    #[instrument(level = "debug", skip(self, buf), fields(root = %self.root, payload = buf.is_some()))]
    pub fn write_block(
        &mut self,
        block_index: BlockAddress,
        block_count: u64,
        buf: Option<&[u8]>,
    ) -> Result<()> {
        self.check_range(block_index, block_count, buf.map(<[u8]>::len))?;

        for run in self.layout.sub_runs(block_index, block_count) {
            trace!(start = run.start, len = run.len, container = run.container, "write sub-run");
            let region = self.region(run.skip, run.len);
            let mut file =
                container::acquire(&mut self.store, &self.root, &self.layout, &run, Access::Write)?
                    .ok_or_else(|| {
                        DiskError::store(
                            StoreOp::Open,
                            run.container.to_string(),
                            std::io::Error::from_raw_os_error(libc::ENOENT),
                        )
                    })?;
            if let Some(data) = buf {
                file.write_all(&data[region])?;
            }
            file.close()?;
        }
        Ok(())
    }

    /// 未实现：明确报告不支持，而不是静默丢弃
    pub fn trim_block(&mut self, block_index: BlockAddress, block_count: u64) -> Result<()> {
        trace!(block_index, block_count, "trim requested");
        Err(DiskError::Unsupported("trim"))
    }

    /// 直接查询共享的容量，不缓存
    pub fn get_size_info(&mut self) -> Result<SizeInfo> {
        let info = self
            .store
            .statvfs(&self.root)
            .map_err(|e| DiskError::store(StoreOp::Statvfs, self.root.clone(), e))?;
        Ok(SizeInfo {
            size: info.total_bytes(),
            free: info.free_bytes(),
        })
    }
}

impl<S> BlockDevice for SuperblockDisk<S>
where
    S: RemoteStore + Send,
{
    fn layout(&self) -> Layout {
        self.layout
    }

    fn read_block(&mut self, block_index: BlockAddress, block_count: u64, buf: &mut [u8]) -> Result<()> {
        SuperblockDisk::read_block(self, block_index, block_count, buf)
    }

    fn write_block(&mut self, block_index: BlockAddress, block_count: u64, buf: Option<&[u8]>) -> Result<()> {
        SuperblockDisk::write_block(self, block_index, block_count, buf)
    }

    fn trim_block(&mut self, block_index: BlockAddress, block_count: u64) -> Result<()> {
        SuperblockDisk::trim_block(self, block_index, block_count)
    }

    fn get_size_info(&mut self) -> Result<SizeInfo> {
        SuperblockDisk::get_size_info(self)
    }

    fn locate(&self, block: BlockAddress) -> Location {
        SuperblockDisk::locate(self, block)
    }
}
