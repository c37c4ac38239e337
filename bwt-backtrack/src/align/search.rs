//! FM 索引上的反向搜索，每次处理 read 的一个位置。
//!
//! 位置从 read 的 3' 端计数：位置 0 是 read 的最后一个碱基，位置 `len - 1` 是第一个。
//! 行区间两端都是闭的。

use crate::index::{Bound, FmIndex};
use crate::util::dna::{Base, BaseSet};

/// 闭区间 `[low, high]`，永不为空。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaRange {
    pub low: usize,
    pub high: usize,
}

impl SaRange {
    /// 行数，即已匹配串的出现次数
    pub fn count(&self) -> usize {
        self.high - self.low + 1
    }

    pub fn rows(&self) -> std::ops::RangeInclusive<usize> {
        self.low..=self.high
    }
}

/// 以 `b` 开头的全部轮转，即位置 0 的区间。
pub fn initial_range(fm: &FmIndex, b: Base) -> Option<SaRange> {
    fm.block(b).map(|(low, high)| SaRange { low, high })
}

/// 在当前匹配前加上 `c` 并收窄区间；参考中不存在这样的子串时返回 `None`。
pub fn extend(fm: &FmIndex, range: SaRange, c: Base) -> Option<SaRange> {
    let c0 = fm.cumulative_offset(c);
    let low = c0 + fm.rank(c, range.low, Bound::Low) + 1;
    let high = c0 + fm.rank(c, range.high, Bound::High);
    if low > high {
        return None;
    }
    Some(SaRange { low, high })
}

/// 匹配完一个位置后的状态。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchFrame {
    pub range: SaRange,
    /// 此位置采用的碱基（read 原碱基或替换碱基）
    pub base: Base,
    /// 下一个位置已尝试过的碱基
    pub tried: BaseSet,
}

/// 单条 read 的搜索进度：第 `k` 帧对应位置 `k`。
#[derive(Debug, Clone)]
pub struct SearchState {
    pub frames: Vec<SearchFrame>,
    /// 位置 0 已尝试过的碱基（位置 0 没有前一帧）
    pub origin_tried: BaseSet,
}

impl SearchState {
    pub fn new(first: Base, capacity: usize) -> Self {
        Self { frames: Vec::with_capacity(capacity), origin_tried: BaseSet::single(first) }
    }

    /// 已匹配的位置数，也就是正在搜索的位置。
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// 搜索位置 `pos` 时的起始区间；位置 0 为 `None`。
    pub fn resume_range(&self, pos: usize) -> Option<SaRange> {
        pos.checked_sub(1).and_then(|k| self.frames.get(k)).map(|f| f.range)
    }

    /// 位置 `pos` 的已尝试集合；超出现有帧时为 `None`。
    pub fn tried_at(&mut self, pos: usize) -> Option<&mut BaseSet> {
        match pos {
            0 => Some(&mut self.origin_tried),
            _ => self.frames.get_mut(pos - 1).map(|f| &mut f.tried),
        }
    }

    pub fn push(&mut self, range: SaRange, base: Base) {
        self.frames.push(SearchFrame { range, base, tried: BaseSet::empty() });
    }

    /// 丢弃 `pos` 及之后的帧，返回丢弃的数量。
    pub fn rewind(&mut self, pos: usize) -> usize {
        let dropped = self.frames.len().saturating_sub(pos);
        self.frames.truncate(pos);
        dropped
    }

    /// 目前采用的碱基，按 read 的 5' 到 3' 顺序。
    pub fn matched_bases(&self) -> Vec<Base> {
        self.frames.iter().rev().map(|f| f.base).collect()
    }
}
