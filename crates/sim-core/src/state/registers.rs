/// Number of general-purpose registers (`R0..R31`).
pub const REGISTER_COUNT: usize = 32;

/// General-purpose register index, validated to `0..REGISTER_COUNT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Register(u8);

/// Register written by `JAL` with the return address.
pub const LINK_REGISTER: Register = Register(7);

impl Register {
    /// The hard-wired zero register.
    pub const ZERO: Self = Self(0);

    /// Returns the register for `index`, if it exists.
    #[must_use]
    pub const fn new(index: u8) -> Option<Self> {
        if (index as usize) < REGISTER_COUNT {
            Some(Self(index))
        } else {
            None
        }
    }

    /// Returns the array index for this register.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Returns true for `R0`.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl core::fmt::Display for Register {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "R{}", self.0)
    }
}

/// Signed 32-bit register file with `R0` hard-wired to zero.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct RegisterFile {
    regs: [i32; REGISTER_COUNT],
}

impl RegisterFile {
    /// Creates a register file with every register zeroed.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            regs: [0; REGISTER_COUNT],
        }
    }

    /// Reads a register; `R0` always reads zero.
    #[must_use]
    pub const fn get(&self, reg: Register) -> i32 {
        if reg.is_zero() {
            0
        } else {
            self.regs[reg.index()]
        }
    }

    /// Writes a register; writes to `R0` are discarded.
    pub fn set(&mut self, reg: Register, value: i32) {
        if !reg.is_zero() {
            self.regs[reg.index()] = value;
        }
    }

    /// Forces `R0` back to zero.
    pub fn clear_zero(&mut self) {
        self.regs[0] = 0;
    }

    /// All register values in index order.
    #[must_use]
    pub const fn as_array(&self) -> &[i32; REGISTER_COUNT] {
        &self.regs
    }

    /// Mutable view of every register, `R0` included.
    ///
    /// Stray writes to `R0` survive only until the next instruction retires.
    pub fn as_mut_array(&mut self) -> &mut [i32; REGISTER_COUNT] {
        &mut self.regs
    }
}
