//! Testing utilities
//!
//! An in-memory ElastiCache directory that behaves like the real control
//! plane where it matters to the orchestrators: mutations return before the
//! resource settles, and settling only happens as the resource is described.

mod directory;

pub use self::directory::InMemoryElastiCache;
