use crate::{
    disk::{
        engine::Location,
        layout::Layout,
        types::{BlockAddress, SizeInfo},
    },
    error::Result,
};

/// 以块为单位的虚拟磁盘接口
pub trait BlockDevice: Send {
    fn layout(&self) -> Layout;
    fn read_block(&mut self, block_index: BlockAddress, block_count: u64, buf: &mut [u8]) -> Result<()>;
    fn write_block(&mut self, block_index: BlockAddress, block_count: u64, buf: Option<&[u8]>) -> Result<()>;
    fn trim_block(&mut self, block_index: BlockAddress, block_count: u64) -> Result<()>;
    fn get_size_info(&mut self) -> Result<SizeInfo>;
    fn locate(&self, block: BlockAddress) -> Location;
}
