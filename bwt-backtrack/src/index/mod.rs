pub mod bwt;
pub mod error;
pub mod fm;
pub mod sa;
pub mod store;

pub use error::{IndexError, IndexResult};
pub use fm::{Bound, FmIndex, IndexMeta};
