use super::error::SearchFailure;
use super::search::SaRange;
use crate::index::FmIndex;

/// 借助稀疏 SA 采样把 BWT 行号解析为参考坐标。
#[derive(Debug, Clone, Copy)]
pub struct SuffixLocator<'a> {
    fm: &'a FmIndex,
}

impl<'a> SuffixLocator<'a> {
    pub fn new(fm: &'a FmIndex) -> Self {
        Self { fm }
    }

    /// `row` 对应后缀在参考中的起点（0 起）。每走一步 LF 文本位置左移一位，
    /// 所以结果 = 采样值 + 步数。
    pub fn locate(&self, row: usize) -> Result<u32, SearchFailure> {
        if row >= self.fm.len() {
            return Err(SearchFailure::Internal(format!("row {} outside BWT of {} rows", row, self.fm.len())));
        }
        let mut cur = row;
        let mut hops = 0u32;
        loop {
            if let Some(pos) = self.fm.sampled(cur) {
                return Ok(pos + hops);
            }
            if hops as usize >= self.fm.len() {
                return Err(SearchFailure::Internal(format!("no sampled row reached from row {}", row)));
            }
            cur = self
                .fm
                .lf(cur)
                .ok_or_else(|| SearchFailure::Internal(format!("LF walk from row {} hit the sentinel", row)))?;
            hops += 1;
        }
    }

    /// `range` 内每一行的参考坐标，升序。
    pub fn locate_range(&self, range: SaRange) -> Result<Vec<u32>, SearchFailure> {
        let mut out = range.rows().map(|row| self.locate(row)).collect::<Result<Vec<_>, _>>()?;
        out.sort_unstable();
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::sa::build_sa;
    use crate::util::dna::to_alphabet;

    fn full_sa(reference: &[u8]) -> Vec<u32> {
        let mut text: Vec<u8> = reference.iter().map(|&b| to_alphabet(b)).collect();
        text.push(0);
        build_sa(&text)
    }

    #[test]
    fn locate_matches_full_suffix_array() {
        let reference = b"TGCATGCAAACGTTAGCGGATCCAGTACGTTAGCATGACGATCGA";
        let sa = full_sa(reference);
        for spacing in [1u8, 2, 5, 16] {
            let fm = FmIndex::build(reference, 4, spacing).unwrap();
            let loc = SuffixLocator::new(&fm);
            for (row, &expected) in sa.iter().enumerate() {
                assert_eq!(loc.locate(row).unwrap(), expected, "spacing={} row={}", spacing, row);
            }
        }
    }

    #[test]
    fn locate_range_is_sorted() {
        let reference = b"ACGTACGTACGTACGT";
        let fm = FmIndex::build(reference, 4, 3).unwrap();
        let loc = SuffixLocator::new(&fm);
        let (low, high) = fm.block(crate::util::dna::Base::A).unwrap();
        let got = loc.locate_range(SaRange { low, high }).unwrap();
        assert_eq!(got, vec![0, 4, 8, 12]);
    }

    #[test]
    fn locate_out_of_range_is_internal() {
        let fm = FmIndex::build(b"ACGT", 2, 2).unwrap();
        assert!(matches!(SuffixLocator::new(&fm).locate(99), Err(SearchFailure::Internal(_))));
    }
}
