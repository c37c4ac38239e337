//! # bwt-backtrack
//!
//! 基于 FM 索引的短读段比对器，允许少量碱基替换，并优先在测序质量低的位置回溯。
//!
//! - **索引**：参考序列 + `$` 的 BWT、检查点计数表（tally）、稀疏后缀数组采样
//! - **反向搜索**：从 read 的 3' 端逐个碱基收缩 BWT 行区间
//! - **质量回溯**：区间为空时，在回看窗口内选质量最低的位置换一个未试过的碱基
//! - **定位**：LF 映射走到采样行，得到参考坐标
//!
//! ## 快速示例
//!
//! ```rust
//! use std::sync::Arc;
//! use bwt_backtrack::align::{AlignConfig, AlignResult, Aligner, Selection};
//! use bwt_backtrack::index::FmIndex;
//!
//! let fm = FmIndex::build(b"ACGTACGTAGCTGATCGTAG", 4, 4).unwrap();
//! let config = AlignConfig { selection: Selection::Ordered, ..AlignConfig::default() };
//! let aligner = Aligner::new(Arc::new(fm), config);
//!
//! let res = aligner.align(b"GCTGATC", &[40; 7]).unwrap();
//! assert_eq!(res, AlignResult::Matched { matched: "GCTGATC".into(), positions: vec![9] });
//! ```
//!
//! ## 模块说明
//!
//! - [`io`]：FASTA / FASTQ 解析，Phred+33 质量解码
//! - [`index`]：索引构建、校验与读写（四个 bincode 文件）
//! - [`align`]：反向搜索、回溯控制、后缀定位与批量比对
//! - [`util`]：碱基类型与编码

pub mod io;
pub mod index;
pub mod util;
pub mod align;
