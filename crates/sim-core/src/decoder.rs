//! Token-list decoder.
//!
//! The loader hands the core one token list per instruction. Each list is
//! decoded exactly once, at load time, into a fixed-shape [`Instruction`] or
//! a [`Fault`] that stays latched in its program slot until that slot is
//! dispatched.

use crate::encoding::Opcode;
use crate::memory::WORD_SIZE;
use crate::state::Register;
use crate::Fault;

/// Operands of `ADD`, `SUB` and `SLT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct RegisterOperands {
    /// Destination, never `R0`.
    pub rd: Register,
    /// First source.
    pub rs: Register,
    /// Second source.
    pub rt: Register,
}

/// Operands of `ADDI` and `SUBI`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct ImmediateOperands {
    /// Destination, never `R0`.
    pub rd: Register,
    /// Source.
    pub rs: Register,
    /// Signed 32-bit immediate.
    pub imm: i32,
}

/// Operands of `BNE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct BranchOperands {
    /// First compared register.
    pub rs: Register,
    /// Second compared register.
    pub rt: Register,
    /// Byte offset relative to the following instruction.
    pub offset: i32,
}

/// Operands of `LW` and `SW`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct MemoryOperands {
    /// Loaded or stored register.
    pub rt: Register,
    /// Base address register.
    pub base: Register,
    /// Word-aligned signed 16-bit byte offset.
    pub offset: i32,
}

/// Operation selected by a `CACHE` instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
pub enum CacheOp {
    /// Flush, then discard the cache.
    Disable = 0,
    /// Attach a cold cache unless one is attached.
    Enable = 1,
    /// Write dirty lines back; no-op without a cache.
    Flush = 2,
}

impl CacheOp {
    /// Converts a numeric operation code.
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Disable),
            1 => Some(Self::Enable),
            2 => Some(Self::Flush),
            _ => None,
        }
    }

    /// Numeric operation code.
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }
}

/// Fully validated instruction ready for dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[allow(missing_docs)]
pub enum Instruction {
    Add(RegisterOperands),
    Addi(ImmediateOperands),
    Sub(RegisterOperands),
    Subi(ImmediateOperands),
    Slt(RegisterOperands),
    Bne(BranchOperands),
    /// Jump to instruction index `target`.
    J { target: u32 },
    /// Save the return address in the link register, then jump.
    Jal { target: u32 },
    Lw(MemoryOperands),
    Sw(MemoryOperands),
    Cache(CacheOp),
    Halt,
    Nop,
}

impl Instruction {
    /// Opcode this instruction was decoded from.
    #[must_use]
    pub const fn opcode(&self) -> Opcode {
        match self {
            Self::Add(_) => Opcode::Add,
            Self::Addi(_) => Opcode::Addi,
            Self::Sub(_) => Opcode::Sub,
            Self::Subi(_) => Opcode::Subi,
            Self::Slt(_) => Opcode::Slt,
            Self::Bne(_) => Opcode::Bne,
            Self::J { .. } => Opcode::J,
            Self::Jal { .. } => Opcode::Jal,
            Self::Lw(_) => Opcode::Lw,
            Self::Sw(_) => Opcode::Sw,
            Self::Cache(_) => Opcode::Cache,
            Self::Halt => Opcode::Halt,
            Self::Nop => Opcode::Nop,
        }
    }
}

/// Result of decoding one program slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum DecodedOrFault {
    /// Successfully decoded instruction.
    Instruction(Instruction),
    /// Decoding failed; raised when the slot is dispatched.
    Fault(Fault),
}

impl DecodedOrFault {
    /// Returns the decoded instruction if present.
    #[must_use]
    pub const fn instruction(&self) -> Option<&Instruction> {
        match self {
            Self::Instruction(instruction) => Some(instruction),
            Self::Fault(_) => None,
        }
    }

    /// Returns the latched fault if decoding failed.
    #[must_use]
    pub const fn fault(&self) -> Option<&Fault> {
        match self {
            Self::Instruction(_) => None,
            Self::Fault(fault) => Some(fault),
        }
    }
}

impl From<Result<Instruction, Fault>> for DecodedOrFault {
    fn from(value: Result<Instruction, Fault>) -> Self {
        match value {
            Ok(instruction) => Self::Instruction(instruction),
            Err(fault) => Self::Fault(fault),
        }
    }
}

impl From<DecodedOrFault> for Result<Instruction, Fault> {
    fn from(value: DecodedOrFault) -> Self {
        match value {
            DecodedOrFault::Instruction(instruction) => Ok(instruction),
            DecodedOrFault::Fault(fault) => Err(fault),
        }
    }
}

/// One loaded program slot: the source tokens and their decode.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct ProgramSlot {
    /// Tokens exactly as supplied by the loader.
    pub tokens: Vec<String>,
    /// Decode of `tokens`.
    pub decoded: DecodedOrFault,
}

impl ProgramSlot {
    /// Decodes `tokens` for a program of `program_len` instructions.
    #[must_use]
    pub fn new<S: AsRef<str>>(tokens: &[S], program_len: usize) -> Self {
        Self {
            tokens: tokens.iter().map(|t| t.as_ref().to_string()).collect(),
            decoded: Decoder::decode(tokens, program_len).into(),
        }
    }

    /// Source tokens joined with single spaces.
    #[must_use]
    pub fn source_text(&self) -> String {
        self.tokens.join(" ")
    }
}

/// Token-list decoder for the opcode table.
pub struct Decoder;

impl Decoder {
    /// Decodes one token list `[opcode, operand...]`.
    ///
    /// `program_len` bounds jump targets. Operands beyond those an opcode
    /// uses are ignored; the loader warns about them.
    ///
    /// # Errors
    ///
    /// Returns the [`Fault`] the instruction would raise when dispatched.
    pub fn decode<S: AsRef<str>>(tokens: &[S], program_len: usize) -> Result<Instruction, Fault> {
        let Some((mnemonic, operands)) = tokens.split_first() else {
            return Err(Fault::UnknownOpcode(String::new()));
        };
        let mnemonic = mnemonic.as_ref();
        let opcode = Opcode::from_mnemonic(mnemonic)
            .ok_or_else(|| Fault::UnknownOpcode(mnemonic.to_string()))?;

        let required = opcode.required_operands();
        if operands.len() < required {
            return Err(Fault::MissingOperand {
                opcode: mnemonic.to_string(),
                expected: required,
                found: operands.len(),
            });
        }
        let arg = |i: usize| operands[i].as_ref();

        let instruction = match opcode {
            Opcode::Add => Instruction::Add(register_operands(arg(0), arg(1), arg(2))?),
            Opcode::Sub => Instruction::Sub(register_operands(arg(0), arg(1), arg(2))?),
            Opcode::Slt => Instruction::Slt(register_operands(arg(0), arg(1), arg(2))?),
            Opcode::Addi => Instruction::Addi(immediate_operands(arg(0), arg(1), arg(2))?),
            Opcode::Subi => Instruction::Subi(immediate_operands(arg(0), arg(1), arg(2))?),
            Opcode::Bne => Instruction::Bne(BranchOperands {
                rs: parse_register(arg(0))?,
                rt: parse_register(arg(1))?,
                offset: parse_branch_offset(arg(2))?,
            }),
            Opcode::J => Instruction::J {
                target: parse_jump_target(arg(0), program_len)?,
            },
            Opcode::Jal => Instruction::Jal {
                target: parse_jump_target(arg(0), program_len)?,
            },
            Opcode::Lw => Instruction::Lw(memory_operands(arg(0), arg(1))?),
            Opcode::Sw => Instruction::Sw(memory_operands(arg(0), arg(1))?),
            Opcode::Cache => Instruction::Cache(parse_cache_op(arg(0))?),
            Opcode::Halt => Instruction::Halt,
            Opcode::Nop => Instruction::Nop,
        };
        Ok(instruction)
    }
}

fn register_operands(rd: &str, rs: &str, rt: &str) -> Result<RegisterOperands, Fault> {
    Ok(RegisterOperands {
        rd: parse_destination(rd)?,
        rs: parse_register(rs)?,
        rt: parse_register(rt)?,
    })
}

fn immediate_operands(rd: &str, rs: &str, imm: &str) -> Result<ImmediateOperands, Fault> {
    Ok(ImmediateOperands {
        rd: parse_destination(rd)?,
        rs: parse_register(rs)?,
        imm: parse_immediate(imm)?,
    })
}

fn memory_operands(rt: &str, address: &str) -> Result<MemoryOperands, Fault> {
    let rt = parse_register(rt)?;
    let (offset, base) = address
        .trim()
        .strip_suffix(')')
        .and_then(|inner| inner.split_once('('))
        .ok_or_else(|| Fault::InvalidOffset(address.to_string()))?;

    let offset = offset
        .trim()
        .parse::<i64>()
        .map_err(|_| Fault::InvalidOffset(address.to_string()))?;
    let offset = word_offset(offset).ok_or_else(|| Fault::InvalidOffset(address.to_string()))?;

    Ok(MemoryOperands {
        rt,
        base: parse_register(base)?,
        offset,
    })
}

/// Parses `R<n>` or `r<n>` with `n` in `0..32`.
fn parse_register(token: &str) -> Result<Register, Fault> {
    let trimmed = token.trim();
    trimmed
        .strip_prefix(['R', 'r'])
        .filter(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|digits| digits.parse::<u8>().ok())
        .and_then(Register::new)
        .ok_or_else(|| Fault::InvalidRegister(token.to_string()))
}

fn parse_destination(token: &str) -> Result<Register, Fault> {
    let reg = parse_register(token)?;
    if reg.is_zero() {
        return Err(Fault::InvalidRegister(token.to_string()));
    }
    Ok(reg)
}

fn parse_immediate(token: &str) -> Result<i32, Fault> {
    token
        .trim()
        .parse::<i64>()
        .ok()
        .and_then(|value| i32::try_from(value).ok())
        .ok_or_else(|| Fault::InvalidImmediate(token.to_string()))
}

fn parse_branch_offset(token: &str) -> Result<i32, Fault> {
    token
        .trim()
        .parse::<i64>()
        .ok()
        .and_then(|words| words.checked_mul(i64::from(WORD_SIZE)))
        .and_then(word_offset)
        .ok_or_else(|| Fault::InvalidOffset(token.to_string()))
}

/// Accepts word-aligned byte offsets inside the signed 16-bit range.
fn word_offset(bytes: i64) -> Option<i32> {
    if bytes % i64::from(WORD_SIZE) != 0 {
        return None;
    }
    i16::try_from(bytes).ok().map(i32::from)
}

fn parse_jump_target(token: &str, program_len: usize) -> Result<u32, Fault> {
    let invalid = || Fault::InvalidJumpTarget {
        target: token.to_string(),
        program_len,
    };
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    token
        .parse::<usize>()
        .ok()
        .filter(|target| *target < program_len)
        .and_then(|target| u32::try_from(target).ok())
        .ok_or_else(invalid)
}

fn parse_cache_op(token: &str) -> Result<CacheOp, Fault> {
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Fault::InvalidCacheCode(token.to_string()));
    }
    token
        .parse::<u8>()
        .ok()
        .and_then(CacheOp::from_code)
        .ok_or_else(|| Fault::InvalidCacheCode(token.to_string()))
}

#[cfg(test)]
mod tests {
    use super::{
        BranchOperands, CacheOp, DecodedOrFault, Decoder, ImmediateOperands, Instruction,
        MemoryOperands, ProgramSlot, RegisterOperands,
    };
    use crate::state::Register;
    use crate::Fault;

    fn reg(index: u8) -> Register {
        Register::new(index).expect("valid register")
    }

    fn decode(tokens: &[&str]) -> Result<Instruction, Fault> {
        Decoder::decode(tokens, 4)
    }

    #[test]
    fn decode_register_form() {
        assert_eq!(
            decode(&["ADD", "R1", "r2", "R31"]),
            Ok(Instruction::Add(RegisterOperands {
                rd: reg(1),
                rs: reg(2),
                rt: reg(31)
            }))
        );
    }

    #[test]
    fn decode_immediate_accepts_sign_and_whitespace() {
        assert_eq!(
            decode(&["SUBI", "R3", "R0", " -12 "]),
            Ok(Instruction::Subi(ImmediateOperands {
                rd: reg(3),
                rs: Register::ZERO,
                imm: -12
            }))
        );
        assert_eq!(
            decode(&["ADDI", "R3", "R0", "+7"]),
            Ok(Instruction::Addi(ImmediateOperands {
                rd: reg(3),
                rs: Register::ZERO,
                imm: 7
            }))
        );
    }

    #[test]
    fn immediate_outside_32_bits_faults() {
        assert_eq!(
            decode(&["ADDI", "R1", "R2", "2147483648"]),
            Err(Fault::InvalidImmediate("2147483648".to_string()))
        );
        assert!(decode(&["ADDI", "R1", "R2", "-2147483648"]).is_ok());
        assert_eq!(
            decode(&["ADDI", "R1", "R2", "ten"]),
            Err(Fault::InvalidImmediate("ten".to_string()))
        );
    }

    #[test]
    fn r0_destination_faults() {
        assert_eq!(
            decode(&["ADD", "R0", "R1", "R2"]),
            Err(Fault::InvalidRegister("R0".to_string()))
        );
        assert_eq!(
            decode(&["ADDI", "R0", "R1", "1"]),
            Err(Fault::InvalidRegister("R0".to_string()))
        );
        assert_eq!(
            decode(&["SLT", "R0", "R1", "R2"]),
            Err(Fault::InvalidRegister("R0".to_string()))
        );
    }

    #[test]
    fn malformed_registers_fault() {
        for bad in ["R32", "X1", "R", "R-1", "5"] {
            assert_eq!(
                decode(&["SUB", "R1", bad, "R2"]),
                Err(Fault::InvalidRegister(bad.to_string())),
                "{bad}"
            );
        }
    }

    #[test]
    fn branch_offset_is_scaled_to_bytes() {
        assert_eq!(
            decode(&["BNE", "R1", "R0", "-3"]),
            Ok(Instruction::Bne(BranchOperands {
                rs: reg(1),
                rt: Register::ZERO,
                offset: -12
            }))
        );
        assert!(decode(&["BNE", "R1", "R2", "8191"]).is_ok());
        assert_eq!(
            decode(&["BNE", "R1", "R2", "8192"]),
            Err(Fault::InvalidOffset("8192".to_string()))
        );
        assert!(decode(&["BNE", "R1", "R2", "-8192"]).is_ok());
    }

    #[test]
    fn memory_operand_parses_offset_and_base() {
        assert_eq!(
            decode(&["LW", "R4", "-8(R0)"]),
            Ok(Instruction::Lw(MemoryOperands {
                rt: reg(4),
                base: Register::ZERO,
                offset: -8
            }))
        );
        assert_eq!(
            decode(&["SW", "R0", "32764(R2)"]),
            Ok(Instruction::Sw(MemoryOperands {
                rt: Register::ZERO,
                base: reg(2),
                offset: 32764
            }))
        );
    }

    #[test]
    fn memory_operand_rejects_bad_offsets() {
        for bad in ["6(R1)", "32768(R1)", "4R1", "(R1)", "4(R1"] {
            assert_eq!(
                decode(&["LW", "R1", bad]),
                Err(Fault::InvalidOffset(bad.to_string())),
                "{bad}"
            );
        }
        assert_eq!(
            decode(&["LW", "R1", "4(Q1)"]),
            Err(Fault::InvalidRegister("Q1".to_string()))
        );
    }

    #[test]
    fn jump_target_must_lie_inside_program() {
        assert_eq!(decode(&["J", "3"]), Ok(Instruction::J { target: 3 }));
        assert_eq!(decode(&["JAL", "0"]), Ok(Instruction::Jal { target: 0 }));
        for bad in ["4", "-1", "+1", "x"] {
            assert_eq!(
                decode(&["J", bad]),
                Err(Fault::InvalidJumpTarget {
                    target: bad.to_string(),
                    program_len: 4
                })
            );
        }
    }

    #[test]
    fn cache_codes() {
        assert_eq!(decode(&["CACHE", "0"]), Ok(Instruction::Cache(CacheOp::Disable)));
        assert_eq!(decode(&["CACHE", "1"]), Ok(Instruction::Cache(CacheOp::Enable)));
        assert_eq!(decode(&["CACHE", "2"]), Ok(Instruction::Cache(CacheOp::Flush)));
        for bad in ["3", "-1", "one", "256"] {
            assert_eq!(
                decode(&["CACHE", bad]),
                Err(Fault::InvalidCacheCode(bad.to_string()))
            );
        }
    }

    #[test]
    fn halt_operand_is_optional_and_extras_are_ignored() {
        assert_eq!(decode(&["HALT"]), Ok(Instruction::Halt));
        assert_eq!(decode(&["HALT", ";"]), Ok(Instruction::Halt));
        assert_eq!(decode(&["NOP", "R1"]), Ok(Instruction::Nop));
    }

    #[test]
    fn unknown_and_short_instructions_fault() {
        assert_eq!(decode(&["MUL", "R1"]), Err(Fault::UnknownOpcode("MUL".to_string())));
        assert_eq!(decode(&[]), Err(Fault::UnknownOpcode(String::new())));
        assert_eq!(
            decode(&["ADD", "R1", "R2"]),
            Err(Fault::MissingOperand {
                opcode: "ADD".to_string(),
                expected: 3,
                found: 2
            })
        );
    }

    #[test]
    fn program_slot_keeps_tokens_and_decode() {
        let slot = ProgramSlot::new(&["J", "9"], 2);
        assert_eq!(slot.source_text(), "J 9");
        assert!(matches!(slot.decoded, DecodedOrFault::Fault(_)));
        assert!(slot.decoded.instruction().is_none());

        let slot = ProgramSlot::new(&["NOP"], 2);
        assert_eq!(slot.decoded.instruction(), Some(&Instruction::Nop));
    }
}
