//! 索引的磁盘布局：一个目录，四个 bincode 文件，外加可选的构建信息。
//!
//! | 文件         | 内容                                       |
//! |--------------|--------------------------------------------|
//! | `counts.bin` | 首列块边界（5 个累计值）+ 两个间距          |
//! | `bwt.bin`    | BWT 符号编码，每行一个                      |
//! | `tally.bin`  | 检查点计数表，4 x (行数 / checkpoint + 1)   |
//! | `sa.bin`     | 稀疏后缀数组采样，行号 -> 文本位置          |
//! | `meta.bin`   | [`IndexMeta`]，可选                         |

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::error::{IndexError, IndexResult};
use super::fm::{FmIndex, IndexMeta};
use crate::util::dna::SIGMA;

pub const COUNTS_FILE: &str = "counts.bin";
pub const BWT_FILE: &str = "bwt.bin";
pub const TALLY_FILE: &str = "tally.bin";
pub const SA_FILE: &str = "sa.bin";
pub const META_FILE: &str = "meta.bin";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CountRecord {
    first_col: [u32; SIGMA],
    checkpoint: u8,
    sample_spacing: u8,
}

fn read_artifact<T: DeserializeOwned>(path: PathBuf) -> IndexResult<T> {
    let f = File::open(&path).map_err(|source| IndexError::Io { path: path.clone(), source })?;
    bincode::deserialize_from(BufReader::new(f)).map_err(|source| IndexError::Codec { path, source })
}

fn write_artifact<T: Serialize>(path: PathBuf, value: &T) -> IndexResult<()> {
    let f = File::create(&path).map_err(|source| IndexError::Io { path: path.clone(), source })?;
    let mut w = BufWriter::new(f);
    bincode::serialize_into(&mut w, value).map_err(|source| IndexError::Codec { path: path.clone(), source })?;
    w.flush().map_err(|source| IndexError::Io { path, source })
}

/// 读取 `dir` 下全部文件并校验一致性。
pub fn load(dir: &Path) -> IndexResult<FmIndex> {
    let counts: CountRecord = read_artifact(dir.join(COUNTS_FILE))?;
    let bwt: Vec<u8> = read_artifact(dir.join(BWT_FILE))?;
    let tally: Vec<Vec<u32>> = read_artifact(dir.join(TALLY_FILE))?;
    let sample: HashMap<u32, u32> = read_artifact(dir.join(SA_FILE))?;

    let mut idx = FmIndex::from_parts(counts.first_col, counts.checkpoint, counts.sample_spacing, bwt, tally, sample)?;

    let meta_path = dir.join(META_FILE);
    if meta_path.exists() {
        let meta: IndexMeta = read_artifact(meta_path)?;
        idx.set_meta(meta);
    }
    Ok(idx)
}

/// 将全部文件写入 `dir`（不存在则创建）。
pub fn save(idx: &FmIndex, dir: &Path) -> IndexResult<()> {
    std::fs::create_dir_all(dir).map_err(|source| IndexError::Io { path: dir.to_path_buf(), source })?;
    let counts = CountRecord {
        first_col: idx.first_col(),
        checkpoint: idx.checkpoint(),
        sample_spacing: idx.sample_spacing(),
    };
    write_artifact(dir.join(COUNTS_FILE), &counts)?;
    write_artifact(dir.join(BWT_FILE), &idx.bwt())?;
    write_artifact(dir.join(TALLY_FILE), &idx.tally())?;
    write_artifact(dir.join(SA_FILE), idx.suffix_sample())?;
    write_artifact(dir.join(META_FILE), idx.meta())?;
    Ok(())
}

impl FmIndex {
    pub fn load_from_dir(dir: impl AsRef<Path>) -> IndexResult<Self> {
        load(dir.as_ref())
    }

    pub fn save_to_dir(&self, dir: impl AsRef<Path>) -> IndexResult<()> {
        save(self, dir.as_ref())
    }
}
