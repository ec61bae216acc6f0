//! Shared wire models

mod frame;
mod record;
mod subscription;
mod target;

pub use frame::*;
pub use record::*;
pub use subscription::*;
pub use target::*;
