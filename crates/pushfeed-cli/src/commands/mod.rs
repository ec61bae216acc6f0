//! Command implementations for pushfeed

pub mod ask;
pub mod watch;

pub use ask::ask;
pub use watch::watch;
