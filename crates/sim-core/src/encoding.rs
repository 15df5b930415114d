/// Closed set of supported opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[allow(missing_docs)]
pub enum Opcode {
    Add,
    Addi,
    Sub,
    Subi,
    Slt,
    Bne,
    J,
    Jal,
    Lw,
    Sw,
    Cache,
    Halt,
    Nop,
}

/// Single source-of-truth opcode table: mnemonic, opcode, required operand count.
///
/// Mnemonics are matched case-sensitively. Any name not present here is an
/// unknown opcode by definition.
pub const OPCODE_TABLE: &[(&str, Opcode, usize)] = &[
    ("ADD", Opcode::Add, 3),
    ("ADDI", Opcode::Addi, 3),
    ("SUB", Opcode::Sub, 3),
    ("SUBI", Opcode::Subi, 3),
    ("SLT", Opcode::Slt, 3),
    ("BNE", Opcode::Bne, 3),
    ("J", Opcode::J, 1),
    ("JAL", Opcode::Jal, 1),
    ("LW", Opcode::Lw, 2),
    ("SW", Opcode::Sw, 2),
    ("CACHE", Opcode::Cache, 1),
    ("HALT", Opcode::Halt, 1),
    ("NOP", Opcode::Nop, 0),
];

impl Opcode {
    /// Looks up an opcode by its exact upper-case mnemonic.
    #[must_use]
    pub fn from_mnemonic(mnemonic: &str) -> Option<Self> {
        OPCODE_TABLE
            .iter()
            .find_map(|(name, opcode, _)| (*name == mnemonic).then_some(*opcode))
    }

    /// Canonical mnemonic for this opcode.
    #[must_use]
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Self::Add => "ADD",
            Self::Addi => "ADDI",
            Self::Sub => "SUB",
            Self::Subi => "SUBI",
            Self::Slt => "SLT",
            Self::Bne => "BNE",
            Self::J => "J",
            Self::Jal => "JAL",
            Self::Lw => "LW",
            Self::Sw => "SW",
            Self::Cache => "CACHE",
            Self::Halt => "HALT",
            Self::Nop => "NOP",
        }
    }

    /// Operands listed for this opcode in [`OPCODE_TABLE`].
    ///
    /// `HALT` lists one operand but ignores it when executed.
    #[must_use]
    pub const fn arg_count(self) -> usize {
        match self {
            Self::Add | Self::Addi | Self::Sub | Self::Subi | Self::Slt | Self::Bne => 3,
            Self::Lw | Self::Sw => 2,
            Self::J | Self::Jal | Self::Cache | Self::Halt => 1,
            Self::Nop => 0,
        }
    }

    /// Operands that must be present for the instruction to decode.
    #[must_use]
    pub const fn required_operands(self) -> usize {
        match self {
            Self::Halt => 0,
            other => other.arg_count(),
        }
    }
}
