//! Memory hierarchy: the flat word store and the cache in front of it.

/// Direct-mapped write-back cache.
pub mod cache;
/// Sparse word store with range validation.
pub mod store;

pub use cache::{AddressParts, Cache, CacheGeometry, CacheLine, CacheStats};
pub use store::{WordStore, WORD_MASK};

/// Bytes per machine word.
pub const WORD_SIZE: u32 = 4;
/// Default words per cache line.
pub const DEFAULT_BLOCK_SIZE: u32 = 8;
/// Default cache capacity in bytes.
pub const DEFAULT_CACHE_SIZE: u32 = 2048;
/// Default word-store size in bytes (1 MiB).
pub const DEFAULT_MEMORY_SIZE: u32 = 1 << 20;
