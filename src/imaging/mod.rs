pub mod color;
pub mod font;
pub mod imgblk;
pub mod overlay;

pub use color::{yuyv_to_rgb24, yuyv_to_rgb24_into};
pub use imgblk::BlockLayout;
pub use overlay::put_str;
