//! read 比对：带质量引导回溯的反向搜索，最后把结果区间内的每一行解析为参考坐标。

pub mod backtrack;
pub mod error;
pub mod locate;
pub mod search;
pub mod select;

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use rayon::prelude::*;

use crate::index::{FmIndex, IndexResult};
use crate::util::dna::{self, Base};

pub use backtrack::{BacktrackController, BacktrackLimits, BacktrackOutcome, BACKTRACK_ITER_THRESHOLD, BACKTRACK_THRESHOLD};
pub use error::{ReadError, SearchFailure};
pub use locate::SuffixLocator;
pub use search::{SaRange, SearchFrame, SearchState};
pub use select::{BaseSelector, OrderedSelector, RandomSelector, Selection};

/// 每条 read 的扩展步数上限，独立于回溯预算。
pub const DEFAULT_MAX_STEPS: usize = 1_000_000;

#[derive(Debug, Clone)]
pub struct AlignConfig {
    /// 每条 read 允许的回溯次数
    pub backtrack_threshold: usize,
    pub limits: BacktrackLimits,
    /// 每条 read 允许的扩展步数，`None` 表示不限
    pub max_steps: Option<usize>,
    pub selection: Selection,
}

impl Default for AlignConfig {
    fn default() -> Self {
        Self {
            backtrack_threshold: BACKTRACK_THRESHOLD,
            limits: BacktrackLimits::default(),
            max_steps: Some(DEFAULT_MAX_STEPS),
            selection: Selection::Random,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoMatchReason {
    BacktrackBudget,
    PositionBudget,
    NoCandidate,
    StepLimit,
}

impl fmt::Display for NoMatchReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NoMatchReason::BacktrackBudget => "backtrack-budget",
            NoMatchReason::PositionBudget => "position-budget",
            NoMatchReason::NoCandidate => "no-candidate",
            NoMatchReason::StepLimit => "step-limit",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlignResult {
    /// `matched` 是比对上的参考串，发生替换的位置与 read 不同。
    Matched { matched: String, positions: Vec<u32> },
    NoMatch(NoMatchReason),
    /// 引擎或索引本身的缺陷，而非生物学意义上的未比对。
    InternalError(String),
}

impl AlignResult {
    pub fn is_matched(&self) -> bool {
        matches!(self, AlignResult::Matched { .. })
    }
}

impl From<SearchFailure> for AlignResult {
    fn from(e: SearchFailure) -> Self {
        match e {
            SearchFailure::BacktrackBudget(_) => AlignResult::NoMatch(NoMatchReason::BacktrackBudget),
            SearchFailure::PositionBudget(_) => AlignResult::NoMatch(NoMatchReason::PositionBudget),
            SearchFailure::NoCandidate => AlignResult::NoMatch(NoMatchReason::NoCandidate),
            SearchFailure::StepLimit(_) => AlignResult::NoMatch(NoMatchReason::StepLimit),
            SearchFailure::Internal(msg) => AlignResult::InternalError(msg),
        }
    }
}

/// 批处理中的一条 read：原始碱基与 Phred 质量值（非 ASCII）。
#[derive(Debug, Clone)]
pub struct ReadInput {
    pub id: String,
    pub seq: Vec<u8>,
    pub qual: Vec<u8>,
}

/// 多条 read 并发共享同一个只读索引；每条 read 的状态都在 [`Aligner::align_with`] 的栈上。
#[derive(Debug, Clone)]
pub struct Aligner {
    index: Arc<FmIndex>,
    config: AlignConfig,
}

impl Aligner {
    pub fn new(index: Arc<FmIndex>, config: AlignConfig) -> Self {
        Self { index, config }
    }

    pub fn load(dir: impl AsRef<Path>, config: AlignConfig) -> IndexResult<Self> {
        let index = FmIndex::load_from_dir(dir)?;
        log::info!("index loaded: {} bases, checkpoint {}, sample {}", index.total_len(), index.checkpoint(), index.sample_spacing());
        Ok(Self::new(Arc::new(index), config))
    }

    pub fn index(&self) -> &FmIndex {
        &self.index
    }

    pub fn config(&self) -> &AlignConfig {
        &self.config
    }

    /// 使用配置中的替换碱基策略比对。
    pub fn align(&self, read: &[u8], qualities: &[u8]) -> Result<AlignResult, ReadError> {
        let mut selector = self.config.selection.selector();
        self.align_with(read, qualities, selector.as_mut())
    }

    /// 使用调用方注入的替换碱基策略比对。
    pub fn align_with(
        &self,
        read: &[u8],
        qualities: &[u8],
        selector: &mut dyn BaseSelector,
    ) -> Result<AlignResult, ReadError> {
        let bases = validate(read, qualities)?;
        // 质量值按搜索位置排列：位置 0 是 read 的最后一个碱基
        let search_quals: Vec<u8> = qualities.iter().rev().copied().collect();

        let state = match self.search(&bases, &search_quals, selector) {
            Ok(state) => state,
            Err(e) => {
                log::debug!("read of {} bp not aligned: {}", bases.len(), e);
                return Ok(e.into());
            }
        };

        let matched = dna::bases_to_string(&state.matched_bases());
        let Some(last) = state.frames.last() else {
            return Ok(AlignResult::InternalError("match completed without frames".into()));
        };
        let positions = match SuffixLocator::new(&self.index).locate_range(last.range) {
            Ok(p) => p,
            Err(e) => return Ok(e.into()),
        };
        log::debug!("aligned against {} at {} position(s)", matched, positions.len());
        Ok(AlignResult::Matched { matched, positions })
    }

    /// 扩展/回溯循环，直到 read 的所有位置都匹配或失败。
    fn search(
        &self,
        read: &[Base],
        quals: &[u8],
        selector: &mut dyn BaseSelector,
    ) -> Result<SearchState, SearchFailure> {
        let n = read.len();
        let base_at = |pos: usize| read[n - 1 - pos];
        let controller = BacktrackController::new(self.config.limits);

        let mut state = SearchState::new(base_at(0), n);
        let mut pos = 0usize;
        let mut base = base_at(0);
        let mut from: Option<SaRange> = None;
        let mut events = 0usize;
        let mut steps = 0usize;

        loop {
            steps += 1;
            if let Some(limit) = self.config.max_steps {
                if steps > limit {
                    return Err(SearchFailure::StepLimit(limit));
                }
            }
            if state.depth() != pos {
                return Err(SearchFailure::Internal(format!("{} frames at position {}", state.depth(), pos)));
            }

            let next = match from {
                None => search::initial_range(&self.index, base),
                Some(range) => search::extend(&self.index, range, base),
            };

            match next {
                Some(range) => {
                    log::trace!("position {} matched {} -> [{}, {}]", pos, base, range.low, range.high);
                    state.push(range, base);
                    if pos + 1 == n {
                        return Ok(state);
                    }
                    pos += 1;
                    base = base_at(pos);
                    from = Some(range);
                    if let Some(tried) = state.tried_at(pos) {
                        tried.insert(base);
                    }
                }
                None => {
                    events += 1;
                    if events > self.config.backtrack_threshold {
                        log::debug!("backtrack budget of {} exhausted", self.config.backtrack_threshold);
                        return Err(SearchFailure::BacktrackBudget(self.config.backtrack_threshold));
                    }
                    let out = controller.recover(&mut state, pos, quals, selector)?;
                    pos = out.position;
                    base = out.next_base;
                    from = out.from;
                }
            }
        }
    }

    /// 并行比对整批 read；单条失败只影响自己的结果。
    pub fn align_batch(&self, reads: &[ReadInput]) -> Vec<Result<AlignResult, ReadError>> {
        reads.par_iter().map(|r| self.align(&r.seq, &r.qual)).collect()
    }
}

fn validate(read: &[u8], qualities: &[u8]) -> Result<Vec<Base>, ReadError> {
    if read.len() <= 1 {
        return Err(ReadError::TooShort(read.len()));
    }
    if qualities.len() != read.len() {
        return Err(ReadError::LengthMismatch { read: read.len(), qualities: qualities.len() });
    }
    dna::parse_bases(read).map_err(|(pos, byte)| ReadError::InvalidBase { pos, byte })
}
