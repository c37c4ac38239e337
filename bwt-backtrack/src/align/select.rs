//! 回溯时替换碱基的选择：正式运行在未尝试的碱基中随机选，测试可注入固定顺序。

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::util::dna::{Base, BaseSet};

pub trait BaseSelector {
    /// 选一个不在 `tried` 中的碱基；四个都试过后返回 `None`。
    fn pick(&mut self, tried: BaseSet) -> Option<Base>;
}

/// 总是按 A、C、G、T 顺序取第一个未尝试的碱基。
#[derive(Debug, Clone, Copy, Default)]
pub struct OrderedSelector;

impl BaseSelector for OrderedSelector {
    fn pick(&mut self, tried: BaseSet) -> Option<Base> {
        tried.untried().next()
    }
}

/// 随机起点，再按循环顺序取下一个未尝试的碱基。
#[derive(Debug, Clone)]
pub struct RandomSelector<R: Rng = StdRng> {
    rng: R,
}

impl RandomSelector<StdRng> {
    pub fn from_entropy() -> Self {
        Self { rng: StdRng::from_entropy() }
    }

    pub fn seeded(seed: u64) -> Self {
        Self { rng: StdRng::seed_from_u64(seed) }
    }
}

impl<R: Rng> RandomSelector<R> {
    pub fn with_rng(rng: R) -> Self {
        Self { rng }
    }
}

impl<R: Rng> BaseSelector for RandomSelector<R> {
    fn pick(&mut self, tried: BaseSet) -> Option<Base> {
        if tried.is_full() {
            return None;
        }
        let start = self.rng.gen_range(0..4);
        (0..4)
            .filter_map(|k| Base::from_index((start + k) % 4))
            .find(|&b| !tried.contains(b))
    }
}

/// [`Aligner`](super::Aligner) 为每条 read 构造选择器的方式。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Selection {
    #[default]
    Random,
    /// 随机，但每条 read 使用同一个种子
    Seeded(u64),
    Ordered,
}

impl Selection {
    pub fn selector(self) -> Box<dyn BaseSelector + Send> {
        match self {
            Selection::Random => Box::new(RandomSelector::from_entropy()),
            Selection::Seeded(seed) => Box::new(RandomSelector::seeded(seed)),
            Selection::Ordered => Box::new(OrderedSelector),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordered_enumerates_untried() {
        let mut s = OrderedSelector;
        let mut tried = BaseSet::single(Base::A);
        let mut seen = Vec::new();
        while let Some(b) = s.pick(tried) {
            tried.insert(b);
            seen.push(b);
        }
        assert_eq!(seen, vec![Base::C, Base::G, Base::T]);
    }

    #[test]
    fn random_never_repeats_and_terminates() {
        let mut s = RandomSelector::seeded(17);
        for _ in 0..50 {
            let mut tried = BaseSet::empty();
            for _ in 0..4 {
                let b = s.pick(tried).unwrap();
                assert!(tried.insert(b));
            }
            assert_eq!(s.pick(tried), None);
        }
    }

    #[test]
    fn seeded_is_reproducible() {
        let mut a = RandomSelector::seeded(5);
        let mut b = RandomSelector::seeded(5);
        for _ in 0..20 {
            assert_eq!(a.pick(BaseSet::empty()), b.pick(BaseSet::empty()));
        }
    }
}
