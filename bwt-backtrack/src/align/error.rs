use thiserror::Error;

/// 输入格式错误，只影响所属的那条 read。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReadError {
    #[error("read has {0} base(s), need at least 2")]
    TooShort(usize),

    #[error("quality length {qualities} does not match read length {read}")]
    LengthMismatch { read: usize, qualities: usize },

    #[error("invalid base '{}' at position {pos}", .byte.escape_ascii())]
    InvalidBase { pos: usize, byte: u8 },
}

/// 搜索未能比对上时的终止原因。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SearchFailure {
    #[error("gave up after {0} backtrack events")]
    BacktrackBudget(usize),

    #[error("gave up after {0} backtrack attempts from one failing position")]
    PositionBudget(usize),

    #[error("every backtrack candidate in the look-back window is exhausted")]
    NoCandidate,

    #[error("step limit of {0} extensions reached")]
    StepLimit(usize),

    #[error("internal inconsistency: {0}")]
    Internal(String),
}
