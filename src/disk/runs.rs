//! 按 superblock 文件边界拆分连续块请求

use crate::disk::{
    layout::Layout,
    types::{BlockAddress, ContainerIndex},
};

/// 落在同一个 superblock 文件内的一段连续块
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubRun {
    /// 起始块地址
    pub start: BlockAddress,
    /// 块数
    pub len: u64,
    /// 所属文件编号
    pub container: ContainerIndex,
    /// 相对整个请求起点的块偏移，用于定位调用方缓冲区
    pub skip: u64,
}

/// 惰性的子区间序列，可由相同输入重新计算
#[derive(Debug, Clone)]
pub struct SubRuns {
    layout: Layout,
    next: BlockAddress,
    skip: u64,
    remaining: u64,
}

impl SubRuns {
    pub fn new(layout: Layout, block_index: BlockAddress, block_count: u64) -> Self {
        Self {
            layout,
            next: block_index,
            skip: 0,
            remaining: block_count,
        }
    }
}

impl Iterator for SubRuns {
    type Item = SubRun;

    fn next(&mut self) -> Option<SubRun> {
        if self.remaining == 0 {
            return None;
        }
        let start = self.next;
        let until_boundary =
            self.layout.superblock_size() - start % self.layout.superblock_size();
        let len = until_boundary.min(self.remaining);

        let run = SubRun {
            start,
            len,
            container: self.layout.container_index(start),
            skip: self.skip,
        };

        self.remaining -= len;
        self.skip += len;
        self.next = start.wrapping_add(len);
        Some(run)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.remaining == 0 {
            return (0, Some(0));
        }
        (1, None)
    }
}

impl Layout {
    /// 将 [block_index, block_index + block_count) 拆分为子区间
    pub fn sub_runs(&self, block_index: BlockAddress, block_count: u64) -> SubRuns {
        SubRuns::new(*self, block_index, block_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> Layout {
        Layout::new(4096, 256).unwrap()
    }

    #[test]
    fn run_inside_one_container() {
        let runs: Vec<_> = layout().sub_runs(300, 10).collect();
        assert_eq!(
            runs,
            vec![SubRun {
                start: 300,
                len: 10,
                container: 1,
                skip: 0
            }]
        );
    }

    #[test]
    fn boundary_split_is_one_then_full_container() {
        let runs: Vec<_> = layout().sub_runs(255, 257).collect();
        assert_eq!(runs.len(), 2);
        assert_eq!((runs[0].start, runs[0].len, runs[0].container), (255, 1, 0));
        assert_eq!(
            (runs[1].start, runs[1].len, runs[1].container, runs[1].skip),
            (256, 256, 1, 1)
        );
    }

    #[test]
    fn runs_are_contiguous_and_cover_the_request() {
        let layout = Layout::new(512, 7).unwrap();
        for (start, count) in [(0u64, 0u64), (0, 1), (3, 30), (6, 8), (13, 100), (14, 7)] {
            let runs: Vec<_> = layout.sub_runs(start, count).collect();
            assert_eq!(runs.iter().map(|r| r.len).sum::<u64>(), count);
            let mut expected = start;
            for run in &runs {
                assert_eq!(run.start, expected);
                assert_eq!(run.skip, expected - start);
                assert!(run.len > 0);
                assert_eq!(layout.container_index(run.start + run.len - 1), run.container);
                expected += run.len;
            }
            // 除最后一段外，每段都止于文件边界
            for run in runs.iter().rev().skip(1) {
                assert!(layout.is_container_boundary(run.start + run.len));
            }
        }
    }

    #[test]
    fn empty_request_yields_nothing() {
        assert_eq!(layout().sub_runs(42, 0).count(), 0);
    }

    #[test]
    fn sequence_is_restartable() {
        let runs = layout().sub_runs(100, 1000);
        let first: Vec<_> = runs.clone().collect();
        let second: Vec<_> = runs.collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 5);
    }
}
