use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::error::{IndexError, IndexResult};
use super::{bwt, sa};
use crate::util::dna::{self, Base, SENTINEL, SIGMA};

/// rank 查询服务于闭区间的哪一端。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    /// 下端：只计该行之前
    Low,
    /// 上端：计到该行（含）
    High,
}

/// 构建参数与来源信息，仅用于诊断。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexMeta {
    pub reference_file: Option<String>,
    pub build_args: Option<String>,
    pub build_timestamp: Option<String>,
}

/// FM 索引（只读，可在线程间共享）：
/// - 文本为参考序列 + 唯一的 `$`，因此 BWT 行数为 `total_len() + 1`，第 0 行以 `$` 开头。
/// - `first_col[k]` 为符号 k 在首列中所占块的结束行（不含），由此导出各碱基计数与 C 表。
/// - `tally[b][k]` 为 `bwt[0, k*checkpoint)` 中碱基 b 的精确计数；两检查点之间的 rank
///   从最近的检查点顺扫补偿，扫描长度不超过半个间距。
/// - `suffix_sample` 为稀疏 SA：行号 -> 文本位置，只保留位置为 `sample_spacing` 倍数的行。
#[derive(Debug, Clone)]
pub struct FmIndex {
    first_col: [u32; SIGMA],
    checkpoint: u8,
    sample_spacing: u8,
    bwt: Vec<u8>,
    tally: Vec<Vec<u32>>,
    suffix_sample: HashMap<u32, u32>,
    sentinel_row: usize,
    meta: IndexMeta,
}

impl FmIndex {
    /// 从 ACGT 参考序列（大小写均可）构建全部四个部件。
    pub fn build(reference: &[u8], checkpoint: u8, sample_spacing: u8) -> IndexResult<Self> {
        if reference.is_empty() {
            return Err(IndexError::EmptyReference);
        }
        if checkpoint == 0 || sample_spacing == 0 {
            return Err(IndexError::Inconsistent("checkpoint and sample spacing must be >= 1".into()));
        }
        let mut text = Vec::with_capacity(reference.len() + 1);
        for (pos, &byte) in reference.iter().enumerate() {
            let base = Base::from_ascii(byte).ok_or(IndexError::InvalidReferenceBase { pos, byte })?;
            text.push(base.code());
        }
        text.push(SENTINEL);

        let sa_arr = sa::build_sa(&text);
        let bwt_arr = bwt::build_bwt(&text, &sa_arr);

        // 首列块边界
        let mut freq = [0u32; SIGMA];
        for &ch in &text {
            freq[ch as usize] += 1;
        }
        let mut first_col = [0u32; SIGMA];
        let mut acc = 0u32;
        for (i, f) in freq.iter().enumerate() {
            acc += f;
            first_col[i] = acc;
        }

        let tally = build_tally(&bwt_arr, checkpoint as usize);
        let suffix_sample = sa::sample_sa(&sa_arr, sample_spacing as u32);
        Self::from_parts(first_col, checkpoint, sample_spacing, bwt_arr, tally, suffix_sample)
    }

    /// 由读入的部件组装索引；部件之间不能描述同一个 BWT 时报错。
    pub fn from_parts(
        first_col: [u32; SIGMA],
        checkpoint: u8,
        sample_spacing: u8,
        bwt: Vec<u8>,
        tally: Vec<Vec<u32>>,
        suffix_sample: HashMap<u32, u32>,
    ) -> IndexResult<Self> {
        let bad = |msg: String| Err(IndexError::Inconsistent(msg));

        if checkpoint == 0 || sample_spacing == 0 {
            return bad(format!("zero spacing (checkpoint {}, sample {})", checkpoint, sample_spacing));
        }
        if first_col[0] != 1 {
            return bad(format!("expected exactly one sentinel row, count record says {}", first_col[0]));
        }
        if first_col.windows(2).any(|w| w[0] > w[1]) {
            return bad(format!("count record is not cumulative: {:?}", first_col));
        }
        if bwt.len() != first_col[SIGMA - 1] as usize {
            return bad(format!("BWT has {} rows, count record expects {}", bwt.len(), first_col[SIGMA - 1]));
        }
        if bwt.len() < 2 {
            return bad("BWT holds no reference bases".into());
        }

        let mut freq = [0u32; SIGMA];
        let mut sentinel_row = None;
        for (row, &ch) in bwt.iter().enumerate() {
            if ch as usize >= SIGMA {
                return bad(format!("invalid BWT symbol {} at row {}", ch, row));
            }
            if ch == SENTINEL {
                sentinel_row = Some(row);
            }
            freq[ch as usize] += 1;
        }
        let mut prev = 0u32;
        for (sym, &end) in first_col.iter().enumerate() {
            if freq[sym] != end - prev {
                return bad(format!("symbol {} occurs {} times in BWT, count record says {}", sym, freq[sym], end - prev));
            }
            prev = end;
        }
        let sentinel_row = match sentinel_row {
            Some(r) => r,
            None => return bad("BWT has no sentinel".into()),
        };

        let expected = build_tally(&bwt, checkpoint as usize);
        if tally.len() != expected.len() || tally.iter().zip(&expected).any(|(a, b)| a.len() != b.len()) {
            return bad(format!(
                "tally table shape mismatch: expected 4 x {}",
                expected.first().map_or(0, Vec::len)
            ));
        }
        if tally != expected {
            return bad("tally table disagrees with BWT".into());
        }

        let rows = bwt.len() as u32;
        if let Some((&row, &pos)) = suffix_sample.iter().find(|&(&row, &pos)| row >= rows || pos >= rows) {
            return bad(format!("suffix sample entry {} -> {} out of range", row, pos));
        }

        let fm = Self {
            first_col,
            checkpoint,
            sample_spacing,
            bwt,
            tally,
            suffix_sample,
            sentinel_row,
            meta: IndexMeta::default(),
        };
        fm.check_suffix_sample()?;
        Ok(fm)
    }

    /// 从第 0 行（`$` 轮转，SA = total_len）沿 LF 走到哨兵行，逐行核对采样值；
    /// 每个 `sample_spacing` 的倍数都必须恰好出现在它所在的行上。
    fn check_suffix_sample(&self) -> IndexResult<()> {
        let spacing = self.sample_spacing as usize;
        let mut row = 0usize;
        let mut pos = self.total_len();
        loop {
            match self.sampled(row) {
                Some(v) if v as usize != pos => {
                    return Err(IndexError::Inconsistent(format!(
                        "suffix sample maps row {} to {}, LF walk gives {}",
                        row, v, pos
                    )));
                }
                None if pos % spacing == 0 => {
                    return Err(IndexError::Inconsistent(format!("suffix sample lacks text offset {} (row {})", pos, row)));
                }
                _ => {}
            }
            let Some(next) = self.lf(row) else { break };
            if pos == 0 {
                return Err(IndexError::Inconsistent(format!("LF walk passes text start at row {}", row)));
            }
            pos -= 1;
            row = next;
        }
        // 只有哨兵行的 LF 为空
        if pos != 0 {
            return Err(IndexError::Inconsistent(format!("LF walk reaches the sentinel at text offset {}", pos)));
        }
        let expected = self.total_len() / spacing + 1;
        if self.suffix_sample.len() != expected {
            return Err(IndexError::Inconsistent(format!(
                "suffix sample has {} entries, expected {}",
                self.suffix_sample.len(),
                expected
            )));
        }
        Ok(())
    }

    pub fn set_meta(&mut self, meta: IndexMeta) {
        self.meta = meta;
    }

    pub fn meta(&self) -> &IndexMeta {
        &self.meta
    }

    pub fn first_col(&self) -> [u32; SIGMA] {
        self.first_col
    }

    pub fn checkpoint(&self) -> u8 {
        self.checkpoint
    }

    pub fn sample_spacing(&self) -> u8 {
        self.sample_spacing
    }

    pub fn bwt(&self) -> &[u8] {
        &self.bwt
    }

    pub fn tally(&self) -> &[Vec<u32>] {
        &self.tally
    }

    pub fn suffix_sample(&self) -> &HashMap<u32, u32> {
        &self.suffix_sample
    }

    /// BWT 行数（参考长度 + 1）。
    #[inline]
    pub fn len(&self) -> usize {
        self.bwt.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bwt.is_empty()
    }

    /// 参考长度，即各碱基计数之和。
    #[inline]
    pub fn total_len(&self) -> usize {
        self.bwt.len() - 1
    }

    #[inline]
    pub fn base_count(&self, b: Base) -> usize {
        let k = b.code() as usize;
        (self.first_col[k] - self.first_col[k - 1]) as usize
    }

    /// 严格小于 `b` 的碱基总数（C 表，不含哨兵）。
    #[inline]
    pub fn cumulative_offset(&self, b: Base) -> usize {
        let k = b.code() as usize;
        (self.first_col[k - 1] - self.first_col[0]) as usize
    }

    /// 以 `b` 开头的轮转所在的闭区间；`b` 不出现时为 `None`。
    pub fn block(&self, b: Base) -> Option<(usize, usize)> {
        let n = self.base_count(b);
        if n == 0 {
            return None;
        }
        let c0 = self.cumulative_offset(b);
        Some((c0 + 1, c0 + n))
    }

    /// 返回 BWT[0..pos) 中 b 的出现次数。
    #[inline]
    pub fn occ(&self, b: Base, pos: usize) -> usize {
        let d = self.checkpoint as usize;
        let code = b.code();
        let row = &self.tally[b.index()];
        let k = pos / d;
        let rem = pos % d;
        // 离下一个检查点更近时从后往前扣减
        if rem > d / 2 && k + 1 < row.len() {
            let end = (k + 1) * d;
            let seen = self.bwt[pos..end].iter().filter(|&&ch| ch == code).count();
            row[k + 1] as usize - seen
        } else {
            let seen = self.bwt[k * d..pos].iter().filter(|&&ch| ch == code).count();
            row[k] as usize + seen
        }
    }

    /// `b` 在 `row` 处的 rank：[`Bound::High`] 计 `bwt[0..=row]`，[`Bound::Low`] 计 `bwt[0..row)`。
    #[inline]
    pub fn rank(&self, b: Base, row: usize, bound: Bound) -> usize {
        match bound {
            Bound::Low => self.occ(b, row),
            Bound::High => self.occ(b, row + 1),
        }
    }

    /// `row` 行的符号编码。
    #[inline]
    pub fn symbol(&self, row: usize) -> u8 {
        self.bwt[row]
    }

    /// LF 映射：文本起点左移一位的轮转所在行；哨兵行返回 `None`。
    #[inline]
    pub fn lf(&self, row: usize) -> Option<usize> {
        let b = Base::from_code(self.bwt[row])?;
        Some(self.cumulative_offset(b) + self.rank(b, row, Bound::High))
    }

    #[inline]
    pub fn sampled(&self, row: usize) -> Option<u32> {
        self.suffix_sample.get(&(row as u32)).copied()
    }

    pub fn sentinel_row(&self) -> usize {
        self.sentinel_row
    }

    /// 沿 LF 还原参考序列，仅用于诊断和测试。
    pub fn reconstruct(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.total_len());
        let mut row = 0usize; // 以 $ 开头的轮转，其最后一列是参考的最后一个碱基
        while let Some(b) = Base::from_code(self.bwt[row]) {
            out.push(b.to_ascii());
            row = self.cumulative_offset(b) + self.rank(b, row, Bound::High);
        }
        out.reverse();
        out
    }
}

/// `tally[b][k]` = `bwt[0, k*d)` 中碱基 `b` 的计数，`k` 取 `0..=bwt.len()/d`。
pub fn build_tally(bwt: &[u8], d: usize) -> Vec<Vec<u32>> {
    let n_cp = bwt.len() / d + 1;
    let mut tally = vec![vec![0u32; n_cp]; 4];
    let mut running = [0u32; 4];
    for k in 0..n_cp {
        for b in 0..4 {
            tally[b][k] = running[b];
        }
        let start = k * d;
        let end = ((k + 1) * d).min(bwt.len());
        if start < end {
            for &ch in &bwt[start..end] {
                if let Some(b) = Base::from_code(ch) {
                    running[b.index()] += 1;
                }
            }
        }
    }
    tally
}

/// 把 BWT 编码还原为 ASCII（哨兵为 `$`）。
pub fn bwt_to_ascii(bwt: &[u8]) -> Vec<u8> {
    bwt.iter().map(|&a| dna::from_alphabet(a)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_reference(len: usize, seed: u32) -> Vec<u8> {
        let bases = [b'A', b'C', b'G', b'T'];
        let mut x = seed;
        (0..len)
            .map(|_| {
                x = x.wrapping_mul(1_103_515_245).wrapping_add(12_345);
                bases[(x >> 16) as usize % 4]
            })
            .collect()
    }

    fn naive_occ(idx: &FmIndex, b: Base, pos: usize) -> usize {
        idx.bwt()[..pos].iter().filter(|&&ch| ch == b.code()).count()
    }

    #[test]
    fn counts_and_offsets() {
        let idx = FmIndex::build(b"ACAACG", 2, 2).unwrap();
        assert_eq!(idx.len(), 7);
        assert_eq!(idx.total_len(), 6);
        assert_eq!(idx.base_count(Base::A), 3);
        assert_eq!(idx.base_count(Base::C), 2);
        assert_eq!(idx.base_count(Base::G), 1);
        assert_eq!(idx.base_count(Base::T), 0);
        assert_eq!(idx.cumulative_offset(Base::A), 0);
        assert_eq!(idx.cumulative_offset(Base::C), 3);
        assert_eq!(idx.cumulative_offset(Base::G), 5);
        assert_eq!(idx.block(Base::A), Some((1, 3)));
        assert_eq!(idx.block(Base::G), Some((6, 6)));
        assert_eq!(idx.block(Base::T), None);
        assert_eq!(bwt_to_ascii(idx.bwt()), b"GC$AAAC");
    }

    #[test]
    fn tally_exact_at_every_checkpoint() {
        let reference = make_reference(503, 7);
        for d in [1u8, 3, 8, 32, 64] {
            let idx = FmIndex::build(&reference, d, 4).unwrap();
            let d = d as usize;
            for b in Base::ALL {
                for (k, &t) in idx.tally()[b.index()].iter().enumerate() {
                    assert_eq!(t as usize, naive_occ(&idx, b, k * d), "d={} k={}", d, k);
                }
            }
        }
    }

    #[test]
    fn rank_matches_brute_force_and_is_monotone() {
        let reference = make_reference(777, 99);
        for d in [2u8, 5, 16, 100] {
            let idx = FmIndex::build(&reference, d, 8).unwrap();
            for b in Base::ALL {
                let mut last = 0;
                for row in 0..idx.len() {
                    let hi = idx.rank(b, row, Bound::High);
                    assert_eq!(hi, naive_occ(&idx, b, row + 1), "d={} row={}", d, row);
                    assert_eq!(idx.rank(b, row, Bound::Low), naive_occ(&idx, b, row));
                    assert!(hi >= last);
                    last = hi;
                }
            }
        }
    }

    #[test]
    fn lf_walk_reconstructs_reference() {
        let reference = make_reference(300, 3);
        let idx = FmIndex::build(&reference, 16, 8).unwrap();
        assert_eq!(idx.reconstruct(), reference);
    }

    #[test]
    fn build_rejects_bad_reference() {
        assert!(matches!(FmIndex::build(b"", 4, 4), Err(IndexError::EmptyReference)));
        assert!(matches!(
            FmIndex::build(b"ACGNT", 4, 4),
            Err(IndexError::InvalidReferenceBase { pos: 3, byte: b'N' })
        ));
    }

    #[test]
    fn from_parts_rejects_corrupt_tally() {
        let idx = FmIndex::build(b"ACGTTGCA", 2, 2).unwrap();
        let mut tally = idx.tally().to_vec();
        tally[1][2] += 1;
        let res = FmIndex::from_parts(
            idx.first_col(),
            idx.checkpoint(),
            idx.sample_spacing(),
            idx.bwt().to_vec(),
            tally,
            idx.suffix_sample().clone(),
        );
        assert!(matches!(res, Err(IndexError::Inconsistent(_))));
    }

    #[test]
    fn from_parts_rejects_count_mismatch() {
        let idx = FmIndex::build(b"ACGTTGCA", 2, 2).unwrap();
        let mut first_col = idx.first_col();
        first_col[1] += 1;
        let res = FmIndex::from_parts(
            first_col,
            idx.checkpoint(),
            idx.sample_spacing(),
            idx.bwt().to_vec(),
            idx.tally().to_vec(),
            idx.suffix_sample().clone(),
        );
        assert!(matches!(res, Err(IndexError::Inconsistent(_))));
    }

    #[test]
    fn from_parts_rejects_corrupt_sample() {
        let idx = FmIndex::build(b"ACGTTGCA", 2, 2).unwrap();
        let mut sample = idx.suffix_sample().clone();
        let (&row, _) = sample.iter().find(|&(_, &pos)| pos == 4).unwrap();
        // 偏移仍在范围内，只有 LF 核对能发现
        sample.insert(row, 7);
        let res = FmIndex::from_parts(
            idx.first_col(),
            idx.checkpoint(),
            idx.sample_spacing(),
            idx.bwt().to_vec(),
            idx.tally().to_vec(),
            sample,
        );
        assert!(matches!(res, Err(IndexError::Inconsistent(_))));
    }

    #[test]
    fn from_parts_rejects_missing_sample() {
        let idx = FmIndex::build(&make_reference(200, 5), 8, 4).unwrap();
        let mut sample = idx.suffix_sample().clone();
        let (&row, _) = sample.iter().find(|&(_, &pos)| pos == 100).unwrap();
        sample.remove(&row);
        let res = FmIndex::from_parts(
            idx.first_col(),
            idx.checkpoint(),
            idx.sample_spacing(),
            idx.bwt().to_vec(),
            idx.tally().to_vec(),
            sample,
        );
        assert!(matches!(res, Err(IndexError::Inconsistent(_))));
    }

    #[test]
    fn from_parts_accepts_every_spacing() {
        let reference = make_reference(257, 13);
        for spacing in [1u8, 2, 7, 16, 255] {
            let idx = FmIndex::build(&reference, 8, spacing).unwrap();
            assert_eq!(idx.suffix_sample().len(), 257 / spacing as usize + 1);
        }
    }
}
