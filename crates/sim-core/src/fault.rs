use thiserror::Error;

/// Fault classes used for reporting and policy decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum FaultClass {
    /// An instruction operand or opcode could not be accepted.
    Operand,
    /// A load or store targeted an address outside the word store.
    Memory,
    /// The configured step limit ran out before the program halted.
    Budget,
}

/// Payload-free fault identifiers with stable one-byte codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
pub enum FaultCode {
    /// Effective address outside `[0, memory_size)`.
    AddressOutOfRange = 0x01,
    /// Register index outside `R0..R31`, or `R0` used as an arithmetic destination.
    InvalidRegister = 0x02,
    /// Offset misaligned, outside the signed 16-bit range, or branching before address 0.
    InvalidOffset = 0x03,
    /// Immediate not numeric or outside the signed 32-bit range.
    InvalidImmediate = 0x04,
    /// Jump target not numeric or outside the loaded program.
    InvalidJumpTarget = 0x05,
    /// `CACHE` operation code outside `{0, 1, 2}`.
    InvalidCacheCode = 0x06,
    /// Opcode not present in the opcode table.
    UnknownOpcode = 0x07,
    /// Fewer operands than the opcode requires.
    MissingOperand = 0x08,
    /// Step limit reached while the machine was still running.
    StepLimitExceeded = 0x09,
}

impl FaultCode {
    /// Converts a fault code to its stable byte value.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Converts a stable byte value back into a fault code.
    #[must_use]
    pub const fn from_u8(code: u8) -> Option<Self> {
        match code {
            0x01 => Some(Self::AddressOutOfRange),
            0x02 => Some(Self::InvalidRegister),
            0x03 => Some(Self::InvalidOffset),
            0x04 => Some(Self::InvalidImmediate),
            0x05 => Some(Self::InvalidJumpTarget),
            0x06 => Some(Self::InvalidCacheCode),
            0x07 => Some(Self::UnknownOpcode),
            0x08 => Some(Self::MissingOperand),
            0x09 => Some(Self::StepLimitExceeded),
            _ => None,
        }
    }

    /// Returns the reporting class for this fault code.
    #[must_use]
    pub const fn class(self) -> FaultClass {
        match self {
            Self::AddressOutOfRange => FaultClass::Memory,
            Self::StepLimitExceeded => FaultClass::Budget,
            Self::InvalidRegister
            | Self::InvalidOffset
            | Self::InvalidImmediate
            | Self::InvalidJumpTarget
            | Self::InvalidCacheCode
            | Self::UnknownOpcode
            | Self::MissingOperand => FaultClass::Operand,
        }
    }
}

/// A fault raised while decoding or executing one instruction.
///
/// Every fault halts the machine; none is retried.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Fault {
    /// Effective address outside the word store.
    #[error("address {address} out of range (valid range: 0 to {memory_size})")]
    AddressOutOfRange {
        /// The rejected byte address.
        address: i64,
        /// Size of the word store in bytes.
        memory_size: u32,
    },
    /// Register operand that cannot be used here.
    #[error("invalid register operand `{0}`")]
    InvalidRegister(String),
    /// Branch or memory offset that cannot be used.
    #[error("invalid offset `{0}`")]
    InvalidOffset(String),
    /// Immediate operand that is not a signed 32-bit decimal.
    #[error("invalid immediate value `{0}`")]
    InvalidImmediate(String),
    /// Jump target outside the program.
    #[error("jump target `{target}` out of instruction range (program has {program_len} instructions)")]
    InvalidJumpTarget {
        /// The target operand as written.
        target: String,
        /// Number of loaded instructions.
        program_len: usize,
    },
    /// `CACHE` operation code that is not 0, 1 or 2.
    #[error("invalid CACHE operation code `{0}`")]
    InvalidCacheCode(String),
    /// Opcode missing from the opcode table.
    #[error("unknown opcode `{0}`")]
    UnknownOpcode(String),
    /// Instruction with too few operands.
    #[error("{opcode} expects {expected} operand(s), found {found}")]
    MissingOperand {
        /// Opcode mnemonic.
        opcode: String,
        /// Operands the opcode requires.
        expected: usize,
        /// Operands present in the instruction.
        found: usize,
    },
    /// Step limit reached before the program halted.
    #[error("step limit of {0} instructions exceeded")]
    StepLimitExceeded(u64),
}

impl Fault {
    /// Returns the payload-free code for this fault.
    #[must_use]
    pub const fn code(&self) -> FaultCode {
        match self {
            Self::AddressOutOfRange { .. } => FaultCode::AddressOutOfRange,
            Self::InvalidRegister(_) => FaultCode::InvalidRegister,
            Self::InvalidOffset(_) => FaultCode::InvalidOffset,
            Self::InvalidImmediate(_) => FaultCode::InvalidImmediate,
            Self::InvalidJumpTarget { .. } => FaultCode::InvalidJumpTarget,
            Self::InvalidCacheCode(_) => FaultCode::InvalidCacheCode,
            Self::UnknownOpcode(_) => FaultCode::UnknownOpcode,
            Self::MissingOperand { .. } => FaultCode::MissingOperand,
            Self::StepLimitExceeded(_) => FaultCode::StepLimitExceeded,
        }
    }

    /// Returns the reporting class for this fault.
    #[must_use]
    pub const fn class(&self) -> FaultClass {
        self.code().class()
    }
}

#[cfg(test)]
mod tests {
    use super::{Fault, FaultClass, FaultCode};

    #[test]
    fn stable_code_roundtrip_is_bijective_for_defined_values() {
        for code in 0x01u8..=0x09 {
            let fault = FaultCode::from_u8(code).expect("defined taxonomy code");
            assert_eq!(fault.as_u8(), code);
        }
    }

    #[test]
    fn unknown_code_is_rejected() {
        assert!(FaultCode::from_u8(0x00).is_none());
        assert!(FaultCode::from_u8(0x0A).is_none());
        assert!(FaultCode::from_u8(0xFF).is_none());
    }

    #[test]
    fn class_mapping_matches_fault_taxonomy() {
        assert_eq!(FaultCode::AddressOutOfRange.class(), FaultClass::Memory);
        assert_eq!(FaultCode::StepLimitExceeded.class(), FaultClass::Budget);
        assert_eq!(FaultCode::InvalidJumpTarget.class(), FaultClass::Operand);
        assert_eq!(FaultCode::UnknownOpcode.class(), FaultClass::Operand);
    }

    #[test]
    fn detailed_faults_report_their_code() {
        let fault = Fault::InvalidJumpTarget {
            target: "5".to_string(),
            program_len: 5,
        };
        assert_eq!(fault.code(), FaultCode::InvalidJumpTarget);
        assert_eq!(
            fault.to_string(),
            "jump target `5` out of instruction range (program has 5 instructions)"
        );

        let fault = Fault::AddressOutOfRange {
            address: -4,
            memory_size: 1024,
        };
        assert_eq!(fault.class(), FaultClass::Memory);
    }
}
