//! Companion tools sharing the capture and imaging code

pub mod cat;
pub mod convert;
pub mod histogram;
pub mod imgblk;

pub use cat::{round_robin, CatOptions};
pub use convert::{convert_stream, ConvertOptions};
pub use histogram::histogram;
pub use imgblk::Direction;
