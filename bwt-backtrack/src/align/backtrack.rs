//! 错配恢复：扩展失败时，在已匹配的位置中找最可能是测序错误的一个
//! （质量最低、离失败位置近），换一个碱基后从那里继续搜索。

use super::error::SearchFailure;
use super::search::{SaRange, SearchState};
use super::select::BaseSelector;
use crate::util::dna::Base;

/// 每条 read 允许的回溯次数。
pub const BACKTRACK_THRESHOLD: usize = 1000;
/// 单次回溯中允许的候选尝试次数。
pub const BACKTRACK_ITER_THRESHOLD: usize = 50;
/// 候选位置距失败位置（向 3' 端方向）的最大距离。
pub const LOOKBACK_WINDOW: usize = 128;
/// 质量不高于此值的候选直接采用，不再继续扫描。
pub const READ_QUALITY_CUTOFF: u8 = 35;

// 高于任何 Phred 值
const EXHAUSTED: u16 = u16::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BacktrackLimits {
    pub per_position: usize,
    pub window: usize,
    pub quality_cutoff: u8,
}

impl Default for BacktrackLimits {
    fn default() -> Self {
        Self {
            per_position: BACKTRACK_ITER_THRESHOLD,
            window: LOOKBACK_WINDOW,
            quality_cutoff: READ_QUALITY_CUTOFF,
        }
    }
}

/// 回溯后搜索从哪里、以什么碱基继续。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BacktrackOutcome {
    /// 继续搜索的位置
    pub position: usize,
    /// 在该位置尝试的替换碱基
    pub next_base: Base,
    /// 扩展的起始区间；从位置 0 重新开始时为 `None`
    pub from: Option<SaRange>,
    /// 回退丢弃的帧数
    pub frames_rewound: usize,
}

/// 单次回溯使用的质量值副本；没有可选碱基的位置被抬高到 [`EXHAUSTED`]。
#[derive(Debug, Clone)]
pub struct BacktrackContext {
    qualities: Vec<u16>,
    attempts: usize,
}

impl BacktrackContext {
    /// `qualities` 按搜索位置排列（3' 端在前）。
    pub fn new(qualities: &[u8]) -> Self {
        Self { qualities: qualities.iter().map(|&q| u16::from(q)).collect(), attempts: 0 }
    }

    pub fn attempts(&self) -> usize {
        self.attempts
    }

    pub fn exhaust(&mut self, pos: usize) {
        self.qualities[pos] = EXHAUSTED;
    }

    pub fn is_exhausted(&self, pos: usize) -> bool {
        self.qualities[pos] == EXHAUSTED
    }

    /// `[from - window, from]` 中质量最低的位置，从 `from` 向位置 0 扫描。
    /// 相同质量保留先遇到的；第一个不高于 `cutoff` 的新最小值结束扫描。
    pub fn candidate(&self, from: usize, window: usize, cutoff: u8) -> usize {
        let cutoff = u16::from(cutoff);
        let mut best = from;
        let mut lowest = self.qualities[from];
        let span = window.min(from);
        for pos in (from - span..from).rev() {
            let q = self.qualities[pos];
            if q < lowest {
                lowest = q;
                best = pos;
                if lowest <= cutoff {
                    break;
                }
            }
        }
        best
    }
}

pub struct BacktrackController {
    limits: BacktrackLimits,
}

impl BacktrackController {
    pub fn new(limits: BacktrackLimits) -> Self {
        Self { limits }
    }

    /// 处理位置 `failing` 的空区间。成功时 `state` 回退到返回的位置，
    /// 替换碱基记入已尝试集合。
    pub fn recover(
        &self,
        state: &mut SearchState,
        failing: usize,
        qualities: &[u8],
        selector: &mut dyn BaseSelector,
    ) -> Result<BacktrackOutcome, SearchFailure> {
        if failing != state.depth() || failing >= qualities.len() {
            return Err(SearchFailure::Internal(format!(
                "backtrack from position {} with {} frames over {} qualities",
                failing,
                state.depth(),
                qualities.len()
            )));
        }

        let mut ctx = BacktrackContext::new(qualities);
        while ctx.attempts < self.limits.per_position {
            ctx.attempts += 1;
            let pos = ctx.candidate(failing, self.limits.window, self.limits.quality_cutoff);
            if ctx.is_exhausted(pos) {
                log::debug!("backtrack from {}: window exhausted after {} attempts", failing, ctx.attempts);
                return Err(SearchFailure::NoCandidate);
            }

            let tried = state
                .tried_at(pos)
                .ok_or_else(|| SearchFailure::Internal(format!("no tried-set for position {}", pos)))?;
            let Some(next_base) = selector.pick(*tried) else {
                log::trace!("position {} has no untried base left", pos);
                ctx.exhaust(pos);
                continue;
            };
            if !tried.insert(next_base) {
                return Err(SearchFailure::Internal(format!("selector returned tried base {} at {}", next_base, pos)));
            }

            let frames_rewound = state.rewind(pos);
            let from = state.resume_range(pos);
            if pos > 0 && from.is_none() {
                return Err(SearchFailure::Internal(format!("no frame to resume position {}", pos)));
            }
            log::trace!(
                "backtrack from {} to {} with {} ({} frames rewound)",
                failing,
                pos,
                next_base,
                frames_rewound
            );
            return Ok(BacktrackOutcome { position: pos, next_base, from, frames_rewound });
        }

        log::debug!("backtrack from {}: {} attempts without progress", failing, ctx.attempts);
        Err(SearchFailure::PositionBudget(self.limits.per_position))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::align::select::OrderedSelector;
    use crate::util::dna::BaseSet;

    fn state_with(depth: usize) -> SearchState {
        let mut st = SearchState::new(Base::A, depth);
        for i in 0..depth {
            st.push(SaRange { low: i + 1, high: i + 2 }, Base::A);
            st.frames[i].tried.insert(Base::A);
        }
        st
    }

    #[test]
    fn candidate_prefers_lowest_quality() {
        let ctx = BacktrackContext::new(&[40, 38, 36, 39, 40]);
        assert_eq!(ctx.candidate(4, 128, 35), 2);
        assert_eq!(ctx.candidate(0, 128, 35), 0);
    }

    #[test]
    fn candidate_stops_at_first_low_quality_hit() {
        // 位置 3 低于阈值即返回，不再看更低的位置 1
        let ctx = BacktrackContext::new(&[40, 2, 40, 30, 40]);
        assert_eq!(ctx.candidate(4, 128, 35), 3);
    }

    #[test]
    fn candidate_respects_window_and_ties() {
        let ctx = BacktrackContext::new(&[1, 40, 40, 40, 40]);
        assert_eq!(ctx.candidate(4, 2, 35), 4);
        assert_eq!(ctx.candidate(4, 4, 35), 0);
    }

    #[test]
    fn exhausted_positions_are_skipped() {
        let mut ctx = BacktrackContext::new(&[40, 10, 40]);
        ctx.exhaust(1);
        assert_eq!(ctx.candidate(2, 128, 35), 2);
        ctx.exhaust(2);
        assert_eq!(ctx.candidate(2, 128, 35), 0);
        ctx.exhaust(0);
        assert!(ctx.is_exhausted(ctx.candidate(2, 128, 35)));
    }

    #[test]
    fn recover_rewinds_to_low_quality_position() {
        let mut st = state_with(5);
        let quals = [40, 40, 5, 40, 40, 40];
        let ctl = BacktrackController::new(BacktrackLimits::default());
        let out = ctl.recover(&mut st, 5, &quals, &mut OrderedSelector).unwrap();
        assert_eq!(out.position, 2);
        assert_eq!(out.next_base, Base::C);
        assert_eq!(out.frames_rewound, 3);
        assert_eq!(out.from, Some(SaRange { low: 2, high: 3 }));
        assert_eq!(st.depth(), 2);
        assert!(st.frames[1].tried.contains(Base::C));
    }

    #[test]
    fn recover_restarts_at_origin() {
        let mut st = state_with(3);
        let quals = [3, 40, 40, 40];
        let ctl = BacktrackController::new(BacktrackLimits::default());
        let out = ctl.recover(&mut st, 3, &quals, &mut OrderedSelector).unwrap();
        assert_eq!(out.position, 0);
        assert_eq!(out.next_base, Base::C);
        assert_eq!(out.from, None);
        assert_eq!(st.depth(), 0);
        assert!(st.origin_tried.contains(Base::C));
    }

    #[test]
    fn recover_moves_past_exhausted_position() {
        let mut st = state_with(3);
        st.frames[1].tried = {
            let mut s = BaseSet::empty();
            Base::ALL.iter().for_each(|&b| {
                s.insert(b);
            });
            s
        };
        // 位置 2 最差但已无可选碱基，退到位置 1
        let quals = [40, 20, 10, 40];
        let ctl = BacktrackController::new(BacktrackLimits::default());
        let out = ctl.recover(&mut st, 3, &quals, &mut OrderedSelector).unwrap();
        assert_eq!(out.position, 1);
        assert_eq!(out.next_base, Base::C);
    }

    #[test]
    fn recover_fails_when_window_exhausted() {
        let mut st = SearchState::new(Base::A, 1);
        for b in Base::ALL {
            st.origin_tried.insert(b);
        }
        let ctl = BacktrackController::new(BacktrackLimits::default());
        let res = ctl.recover(&mut st, 0, &[30, 30], &mut OrderedSelector);
        assert_eq!(res, Err(SearchFailure::NoCandidate));
    }

    #[test]
    fn recover_honours_attempt_budget() {
        let mut st = SearchState::new(Base::A, 1);
        for b in Base::ALL {
            st.origin_tried.insert(b);
        }
        let limits = BacktrackLimits { per_position: 1, ..BacktrackLimits::default() };
        let res = BacktrackController::new(limits).recover(&mut st, 0, &[30, 30], &mut OrderedSelector);
        assert_eq!(res, Err(SearchFailure::PositionBudget(1)));
    }

    #[test]
    fn recover_reports_depth_mismatch_as_internal() {
        let mut st = state_with(2);
        let ctl = BacktrackController::new(BacktrackLimits::default());
        let res = ctl.recover(&mut st, 4, &[40; 6], &mut OrderedSelector);
        assert!(matches!(res, Err(SearchFailure::Internal(_))));
    }
}
