pub mod format;
pub mod replay;

pub use format::{format, FormatArgs};
pub use replay::{replay, ReplayArgs};
