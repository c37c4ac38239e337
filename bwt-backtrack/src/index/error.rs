use std::path::PathBuf;

use thiserror::Error;

/// 构建、读取或保存 FM 索引时的错误；出现任何一种都不会留下可用的索引。
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("cannot access index artifact '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot (de)serialize index artifact '{}': {source}", path.display())]
    Codec {
        path: PathBuf,
        #[source]
        source: bincode::Error,
    },

    #[error("reference is empty")]
    EmptyReference,

    #[error("reference contains non-ACGT byte {byte:#04x} at offset {pos}")]
    InvalidReferenceBase { pos: usize, byte: u8 },

    #[error("inconsistent index: {0}")]
    Inconsistent(String),
}

pub type IndexResult<T> = Result<T, IndexError>;
