//! Direct-mapped write-back cache in front of the [`WordStore`].
//!
//! A byte address is first reduced to a word address, then split into
//! `tag | index | offset` using power-of-two widths derived from the block
//! size and line count. Writing a block back rebuilds its base address from
//! `(tag, index)` with the same widths, so decode and rebuild must never
//! disagree.

use crate::api::ConfigError;
use crate::memory::WordStore;
use crate::Fault;

/// Bit layout of a validated cache configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct CacheGeometry {
    word_size: u32,
    block_size: u32,
    lines: u32,
    offset_bits: u32,
    index_bits: u32,
}

impl CacheGeometry {
    /// Derives the geometry for `cache_size` bytes of `block_size`-word lines.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotPowerOfTwo`] when the block size, cache size
    /// or resulting line count is not a power of two, and
    /// [`ConfigError::CacheSmallerThanBlock`] when not even one line fits.
    pub fn new(word_size: u32, block_size: u32, cache_size: u32) -> Result<Self, ConfigError> {
        if !block_size.is_power_of_two() {
            return Err(ConfigError::NotPowerOfTwo {
                field: "block_size",
                value: u64::from(block_size),
            });
        }
        if !cache_size.is_power_of_two() {
            return Err(ConfigError::NotPowerOfTwo {
                field: "cache_size",
                value: u64::from(cache_size),
            });
        }

        let block_bytes = u64::from(block_size) * u64::from(word_size);
        if u64::from(cache_size) < block_bytes {
            return Err(ConfigError::CacheSmallerThanBlock {
                cache_size,
                block_bytes,
            });
        }

        let lines = u64::from(cache_size) / block_bytes;
        if !lines.is_power_of_two() {
            return Err(ConfigError::NotPowerOfTwo {
                field: "cache_lines",
                value: lines,
            });
        }
        let lines = u32::try_from(lines).map_err(|_| ConfigError::NotPowerOfTwo {
            field: "cache_lines",
            value: lines,
        })?;

        Ok(Self {
            word_size,
            block_size,
            lines,
            offset_bits: block_size.trailing_zeros(),
            index_bits: lines.trailing_zeros(),
        })
    }

    /// Bytes per word.
    #[must_use]
    pub const fn word_size(&self) -> u32 {
        self.word_size
    }

    /// Words per line.
    #[must_use]
    pub const fn block_size(&self) -> u32 {
        self.block_size
    }

    /// Number of lines in the cache.
    #[must_use]
    pub const fn lines(&self) -> u32 {
        self.lines
    }

    /// Width of the word-offset field.
    #[must_use]
    pub const fn offset_bits(&self) -> u32 {
        self.offset_bits
    }

    /// Width of the line-index field.
    #[must_use]
    pub const fn index_bits(&self) -> u32 {
        self.index_bits
    }

    /// Size of one line in bytes.
    #[must_use]
    pub const fn block_bytes(&self) -> u64 {
        self.block_size as u64 * self.word_size as u64
    }

    /// Splits a byte address into `(tag, index, offset)`.
    ///
    /// Pure: the same address always yields the same parts.
    #[must_use]
    pub const fn decode_address(&self, address: u32) -> AddressParts {
        let word_address = address / self.word_size;
        let offset_mask = (1 << self.offset_bits) - 1;
        let index_mask = (1 << self.index_bits) - 1;

        AddressParts {
            tag: word_address >> (self.offset_bits + self.index_bits),
            index: (word_address >> self.offset_bits) & index_mask,
            offset: word_address & offset_mask,
        }
    }

    /// Rebuilds the byte address of the first word of block `(tag, index)`.
    #[must_use]
    pub const fn block_base_address(&self, tag: u32, index: u32) -> u64 {
        let word_base = ((tag as u64) << (self.offset_bits + self.index_bits))
            | ((index as u64) << self.offset_bits);
        word_base * self.word_size as u64
    }

    const fn index_mask(&self) -> u32 {
        (1 << self.index_bits) - 1
    }
}

/// Fields of a decoded byte address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AddressParts {
    /// High-order bits identifying which block occupies the line.
    pub tag: u32,
    /// Line selected by the address.
    pub index: u32,
    /// Word position inside the line.
    pub offset: u32,
}

/// One cache-resident block plus its metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct CacheLine {
    tag: u32,
    valid: bool,
    dirty: bool,
    data: Vec<u32>,
}

impl CacheLine {
    /// Creates an invalid, clean, zero-filled line.
    #[must_use]
    pub fn new(block_size: u32) -> Self {
        Self {
            tag: 0,
            valid: false,
            dirty: false,
            data: vec![0; block_size as usize],
        }
    }

    /// Tag of the block held by this line.
    #[must_use]
    pub const fn tag(&self) -> u32 {
        self.tag
    }

    /// Returns true once the line holds a block loaded from memory.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.valid
    }

    /// Returns true when the line holds writes not yet in memory.
    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Words held by the line.
    #[must_use]
    pub fn data(&self) -> &[u32] {
        &self.data
    }
}

/// Running access counters, reset whenever a fresh cache is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct CacheStats {
    /// Reads served from a resident line.
    pub read_hits: u64,
    /// Reads that had to replace a line.
    pub read_misses: u64,
    /// Writes applied to a resident line.
    pub write_hits: u64,
    /// Writes that had to replace a line first.
    pub write_misses: u64,
    /// Dirty blocks copied back to the word store.
    pub write_backs: u64,
    /// Completed flush operations.
    pub flushes: u64,
}

impl CacheStats {
    /// Total hits across reads and writes.
    #[must_use]
    pub const fn hits(&self) -> u64 {
        self.read_hits + self.write_hits
    }

    /// Total misses across reads and writes.
    #[must_use]
    pub const fn misses(&self) -> u64 {
        self.read_misses + self.write_misses
    }
}

/// Direct-mapped write-back cache.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Cache {
    geometry: CacheGeometry,
    lines: Vec<CacheLine>,
    flush_invalidates: bool,
    stats: CacheStats,
}

impl Cache {
    /// Creates a cold cache: every line invalid and clean.
    ///
    /// With `flush_invalidates` set, [`Cache::flush`] also invalidates and
    /// zeroes every line; otherwise flushed lines stay valid and clean.
    #[must_use]
    pub fn new(geometry: CacheGeometry, flush_invalidates: bool) -> Self {
        log::info!(
            "cache initialized with {} lines of {} words ({} bytes per word)",
            geometry.lines(),
            geometry.block_size(),
            geometry.word_size()
        );
        Self {
            geometry,
            lines: vec![CacheLine::new(geometry.block_size()); geometry.lines() as usize],
            flush_invalidates,
            stats: CacheStats::default(),
        }
    }

    /// Bit layout used for decoding and write-back.
    #[must_use]
    pub const fn geometry(&self) -> &CacheGeometry {
        &self.geometry
    }

    /// Splits a byte address into `(tag, index, offset)`.
    #[must_use]
    pub const fn decode_address(&self, address: u32) -> AddressParts {
        self.geometry.decode_address(address)
    }

    /// Returns true when `line` currently holds the block tagged `tag`.
    #[must_use]
    pub const fn hit_or_miss(line: &CacheLine, tag: u32) -> bool {
        line.valid && line.tag == tag
    }

    /// Line at `index`, if the index exists.
    #[must_use]
    pub fn line(&self, index: u32) -> Option<&CacheLine> {
        self.lines.get(index as usize)
    }

    /// All lines in index order.
    #[must_use]
    pub fn lines(&self) -> &[CacheLine] {
        &self.lines
    }

    /// Access counters since this cache was created.
    #[must_use]
    pub const fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Reads the word at `address`, replacing the line on a miss.
    ///
    /// # Errors
    ///
    /// Propagates [`Fault::AddressOutOfRange`] from write-back or block load.
    pub fn read(&mut self, address: u32, store: &mut WordStore) -> Result<u32, Fault> {
        let parts = self.decode_address(address);
        let slot = parts.index as usize;

        if Self::hit_or_miss(&self.lines[slot], parts.tag) {
            log::debug!("cache hit on read at address {address}");
            self.stats.read_hits += 1;
            return Ok(self.lines[slot].data[parts.offset as usize]);
        }

        log::debug!("cache miss on read at address {address}");
        self.stats.read_misses += 1;
        let line = self.replace_block(parts.tag, parts.index, store)?;
        Ok(line.data[parts.offset as usize])
    }

    /// Writes `value` at `address`; the addressed line always ends dirty.
    ///
    /// # Errors
    ///
    /// Propagates [`Fault::AddressOutOfRange`] from write-back or block load.
    pub fn write(&mut self, address: u32, value: u32, store: &mut WordStore) -> Result<(), Fault> {
        let parts = self.decode_address(address);
        let slot = parts.index as usize;

        if Self::hit_or_miss(&self.lines[slot], parts.tag) {
            log::debug!("cache hit on write at address {address}");
            self.stats.write_hits += 1;
        } else {
            log::debug!("cache miss on write at address {address}");
            self.stats.write_misses += 1;
            let _ = self.replace_block(parts.tag, parts.index, store)?;
        }

        let line = &mut self.lines[slot];
        line.data[parts.offset as usize] = value;
        line.dirty = true;
        Ok(())
    }

    /// Evicts the line at `index` and loads block `(tag, index)` into it.
    ///
    /// A valid dirty victim is written back to its own base address first.
    /// `index` is reduced to the index field width.
    ///
    /// # Errors
    ///
    /// Returns [`Fault::AddressOutOfRange`] when either block lies outside
    /// the word store.
    pub fn replace_block(
        &mut self,
        tag: u32,
        index: u32,
        store: &mut WordStore,
    ) -> Result<&CacheLine, Fault> {
        let index = index & self.geometry.index_mask();
        let slot = index as usize;

        let victim = &self.lines[slot];
        if victim.valid && victim.dirty {
            log::debug!("writing back dirty block tag={} index={index}", victim.tag);
            write_back(&self.geometry, victim, index, store)?;
            self.stats.write_backs += 1;
        }

        let base = block_address(self.geometry.block_base_address(tag, index));
        let word_size = i64::from(self.geometry.word_size());
        let mut fresh = CacheLine::new(self.geometry.block_size());
        fresh.tag = tag;
        for (word_index, word) in (0_i64..).zip(fresh.data.iter_mut()) {
            *word = store.load_word(base + word_index * word_size)?;
        }
        fresh.valid = true;

        self.lines[slot] = fresh;
        Ok(&self.lines[slot])
    }

    /// Writes every valid dirty line back and marks it clean.
    ///
    /// # Errors
    ///
    /// Returns [`Fault::AddressOutOfRange`] when a block lies outside the
    /// word store; lines flushed before the failure stay clean.
    pub fn flush(&mut self, store: &mut WordStore) -> Result<(), Fault> {
        log::info!("flushing cache to memory");
        for (index, line) in (0_u32..).zip(self.lines.iter_mut()) {
            if line.valid && line.dirty {
                write_back(&self.geometry, line, index, store)?;
                self.stats.write_backs += 1;
                line.dirty = false;
            }
            if self.flush_invalidates {
                line.valid = false;
                line.data.fill(0);
            }
        }
        self.stats.flushes += 1;
        Ok(())
    }
}

fn write_back(
    geometry: &CacheGeometry,
    line: &CacheLine,
    index: u32,
    store: &mut WordStore,
) -> Result<(), Fault> {
    let base = block_address(geometry.block_base_address(line.tag, index));
    let word_size = i64::from(geometry.word_size());
    for (word_index, word) in (0_i64..).zip(line.data.iter()) {
        store.store_word(base + word_index * word_size, i64::from(*word))?;
    }
    Ok(())
}

// Out-of-range bases saturate so the store reports them as faults.
fn block_address(base: u64) -> i64 {
    i64::try_from(base).unwrap_or(i64::MAX / 2)
}

#[cfg(test)]
mod tests {
    use super::{Cache, CacheGeometry, CacheLine};
    use crate::api::ConfigError;
    use crate::memory::WordStore;

    const MEMORY_SIZE: u32 = 1 << 20;

    fn geometry() -> CacheGeometry {
        CacheGeometry::new(4, 8, 2048).expect("default geometry is valid")
    }

    #[test]
    fn default_geometry_has_64_lines() {
        let geometry = geometry();
        assert_eq!(geometry.lines(), 64);
        assert_eq!(geometry.offset_bits(), 3);
        assert_eq!(geometry.index_bits(), 6);
        assert_eq!(geometry.block_bytes(), 32);
    }

    #[test]
    fn geometry_rejects_non_power_of_two_sizes() {
        assert_eq!(
            CacheGeometry::new(4, 6, 2048),
            Err(ConfigError::NotPowerOfTwo {
                field: "block_size",
                value: 6
            })
        );
        assert_eq!(
            CacheGeometry::new(4, 8, 3000),
            Err(ConfigError::NotPowerOfTwo {
                field: "cache_size",
                value: 3000
            })
        );
        assert_eq!(
            CacheGeometry::new(4, 16, 32),
            Err(ConfigError::CacheSmallerThanBlock {
                cache_size: 32,
                block_bytes: 64
            })
        );
    }

    #[test]
    fn decode_splits_word_address_fields() {
        let geometry = geometry();
        // word address 0b110_000010_101: tag 6, index 2, offset 5
        let word_address = (6 << 9) | (2 << 3) | 5;
        let parts = geometry.decode_address(word_address * 4);
        assert_eq!((parts.tag, parts.index, parts.offset), (6, 2, 5));
    }

    #[test]
    fn base_address_inverts_decode() {
        let geometry = geometry();
        let base = geometry.block_base_address(6, 2);
        let parts = geometry.decode_address(u32::try_from(base).expect("fits"));
        assert_eq!((parts.tag, parts.index, parts.offset), (6, 2, 0));
    }

    #[test]
    fn fresh_cache_lines_are_invalid_and_clean() {
        let cache = Cache::new(geometry(), false);
        assert_eq!(cache.lines().len(), 64);
        assert!(cache
            .lines()
            .iter()
            .all(|line| !line.is_valid() && !line.is_dirty()));
        assert_eq!(cache.line(0), Some(&CacheLine::new(8)));
        assert!(cache.line(64).is_none());
    }

    #[test]
    fn read_miss_loads_whole_block_from_store() {
        let mut store = WordStore::new(MEMORY_SIZE);
        for word in 0..8 {
            store
                .store_word(i64::from(word) * 4, i64::from(100 + word))
                .expect("in range");
        }
        let mut cache = Cache::new(geometry(), false);

        assert_eq!(cache.read(12, &mut store), Ok(103));
        let line = cache.line(0).expect("line 0");
        assert!(line.is_valid());
        assert!(!line.is_dirty());
        assert_eq!(line.data(), &[100, 101, 102, 103, 104, 105, 106, 107]);
        assert_eq!(cache.stats().read_misses, 1);

        assert_eq!(cache.read(28, &mut store), Ok(107));
        assert_eq!(cache.stats().read_hits, 1);
    }

    #[test]
    fn write_is_not_visible_in_store_until_flush() {
        let mut store = WordStore::new(MEMORY_SIZE);
        let mut cache = Cache::new(geometry(), false);

        cache.write(40, 77, &mut store).expect("in range");
        assert_eq!(store.load_word(40), Ok(0));

        cache.flush(&mut store).expect("in range");
        assert_eq!(store.load_word(40), Ok(77));
        let line = cache.line(1).expect("line 1");
        assert!(line.is_valid());
        assert!(!line.is_dirty());
        assert_eq!(cache.stats().write_backs, 1);
        assert_eq!(cache.stats().flushes, 1);
    }

    #[test]
    fn invalidating_flush_leaves_cold_lines() {
        let mut store = WordStore::new(MEMORY_SIZE);
        let mut cache = Cache::new(geometry(), true);

        cache.write(40, 77, &mut store).expect("in range");
        let _ = cache.read(4096, &mut store).expect("in range");
        cache.flush(&mut store).expect("in range");

        assert_eq!(store.load_word(40), Ok(77));
        assert!(cache
            .lines()
            .iter()
            .all(|line| !line.is_valid() && !line.is_dirty()));
        assert!(cache.lines().iter().all(|line| line.data() == [0; 8]));

        assert_eq!(cache.read(40, &mut store), Ok(77));
        assert_eq!(cache.stats().read_misses, 2);
    }

    #[test]
    fn clean_victim_is_not_written_back() {
        let mut store = WordStore::new(MEMORY_SIZE);
        let mut cache = Cache::new(geometry(), false);

        let _ = cache.read(0, &mut store).expect("in range");
        let _ = cache.read(2048, &mut store).expect("in range");

        assert_eq!(cache.stats().write_backs, 0);
        assert!(store.is_empty());
    }

    #[test]
    fn block_beyond_store_faults() {
        let mut store = WordStore::new(64);
        let mut cache = Cache::new(geometry(), false);
        assert!(cache.replace_block(1, 0, &mut store).is_err());
    }
}
