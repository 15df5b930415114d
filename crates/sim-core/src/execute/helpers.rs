//! Address arithmetic shared by the instruction handlers.

use crate::memory::WORD_SIZE;

/// Effective address of a `LW`/`SW`: base register value plus byte offset.
///
/// Computed in 64 bits so negative and oversized sums reach the store's
/// range check instead of wrapping.
#[must_use]
pub fn effective_address(base: i32, offset: i32) -> i64 {
    i64::from(base) + i64::from(offset)
}

/// Address of the instruction after the one at `pc`.
#[must_use]
pub fn next_pc(pc: u32) -> u32 {
    pc.wrapping_add(WORD_SIZE)
}

/// Target of a taken branch at `pc`, or `None` when it would be negative
/// or beyond the 32-bit address space.
#[must_use]
pub fn branch_target(pc: u32, offset: i32) -> Option<u32> {
    let target = i64::from(pc) + i64::from(WORD_SIZE) + i64::from(offset);
    u32::try_from(target).ok()
}

/// Branch byte offset expressed in instructions, as written in source.
#[must_use]
pub fn branch_words(offset: i32) -> i64 {
    i64::from(offset) / i64::from(WORD_SIZE)
}

/// Byte address of instruction `index`.
#[must_use]
pub fn instruction_address(index: u32) -> Option<u32> {
    index.checked_mul(WORD_SIZE)
}

/// Reinterprets a register value as the stored 32-bit word.
#[must_use]
pub const fn word_bits(value: i32) -> u32 {
    u32::from_ne_bytes(value.to_ne_bytes())
}

/// Reinterprets a stored 32-bit word as a register value.
#[must_use]
pub const fn register_bits(word: u32) -> i32 {
    i32::from_ne_bytes(word.to_ne_bytes())
}
