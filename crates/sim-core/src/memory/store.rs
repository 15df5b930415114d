//! Flat byte-addressed word store.
//!
//! Every address in `[0, memory_size)` holds one 32-bit word and reads as zero
//! until written. Bits below the word size select the containing word, so
//! byte address 6 names the word at 4, the same word a cache line holds. Only written words are kept, so a 1 MiB address space costs
//! nothing until a program touches it.

use std::collections::BTreeMap;

use crate::memory::WORD_SIZE;
use crate::Fault;

/// Mask applied to every value before it is stored.
pub const WORD_MASK: i64 = 0xFFFF_FFFF;

/// Sparse word store keyed by byte address.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct WordStore {
    memory_size: u32,
    words: BTreeMap<u32, u32>,
}

impl WordStore {
    /// Creates an all-zero store covering `[0, memory_size)`.
    #[must_use]
    pub const fn new(memory_size: u32) -> Self {
        Self {
            memory_size,
            words: BTreeMap::new(),
        }
    }

    /// Size of the addressable range in bytes.
    #[must_use]
    pub const fn memory_size(&self) -> u32 {
        self.memory_size
    }

    /// Validates an effective address and narrows it to a store address.
    ///
    /// # Errors
    ///
    /// Returns [`Fault::AddressOutOfRange`] for negative addresses and for
    /// addresses at or beyond `memory_size`.
    pub fn check_address(&self, address: i64) -> Result<u32, Fault> {
        u32::try_from(address)
            .ok()
            .filter(|addr| *addr < self.memory_size)
            .ok_or(Fault::AddressOutOfRange {
                address,
                memory_size: self.memory_size,
            })
    }

    /// Reads the word at `address`; unwritten addresses read as zero.
    ///
    /// # Errors
    ///
    /// Returns [`Fault::AddressOutOfRange`] when `address` is outside the store.
    pub fn load_word(&self, address: i64) -> Result<u32, Fault> {
        let addr = word_base(self.check_address(address)?);
        let value = self.words.get(&addr).copied().unwrap_or(0);
        log::trace!("load word [{addr}] -> {value:#010x}");
        Ok(value)
    }

    /// Stores the low 32 bits of `value` at `address`.
    ///
    /// Higher bits are discarded silently; truncation is not a fault.
    ///
    /// # Errors
    ///
    /// Returns [`Fault::AddressOutOfRange`] when `address` is outside the store.
    pub fn store_word(&mut self, address: i64, value: i64) -> Result<(), Fault> {
        let addr = word_base(self.check_address(address)?);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let masked = (value & WORD_MASK) as u32;
        let _ = self.words.insert(addr, masked);
        log::trace!("store word [{addr}] <- {masked:#010x}");
        Ok(())
    }

    /// Iterates written words in ascending address order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.words.iter().map(|(addr, word)| (*addr, *word))
    }

    /// Number of addresses that have been written.
    #[must_use]
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// Returns true when no address has been written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

const fn word_base(address: u32) -> u32 {
    address & !(WORD_SIZE - 1)
}
