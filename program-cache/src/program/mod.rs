//! Linked program cache.

mod cache;
mod entry;

pub use cache::{CacheStats, ProgramCache};
pub use entry::{EntryOrigin, ProgramEntry, UniformLocations};
