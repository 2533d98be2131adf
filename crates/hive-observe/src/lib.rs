//! Process-wide log initialisation for worker binaries.

mod logger;
pub use logger::*;
