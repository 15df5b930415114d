//! Canonical text rendering for decoded programs.
//!
//! Rendering never fails: slots whose decode faulted are listed with their
//! original tokens and flagged as illegal.

use core::fmt;

use crate::decoder::{DecodedOrFault, Instruction, ProgramSlot};
use crate::execute::branch_words;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A single listed program slot.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DisassemblyRow {
    /// Instruction index in the program.
    pub index: usize,
    /// Byte address of the instruction.
    pub address: u64,
    /// The instruction mnemonic (e.g. "ADD", "LW", "HALT").
    pub mnemonic: String,
    /// The formatted operands (e.g. "R1, R2, R3" or "8(R2)").
    pub operands: String,
    /// Decode fault message for illegal slots.
    pub fault: Option<String>,
}

impl DisassemblyRow {
    /// Returns true if the slot faults when dispatched.
    #[must_use]
    pub const fn is_illegal(&self) -> bool {
        self.fault.is_some()
    }
}

/// Lists every program slot with its byte address.
#[must_use]
pub fn disassemble(program: &[ProgramSlot], word_size: u32) -> Vec<DisassemblyRow> {
    (0_u64..)
        .zip(program)
        .enumerate()
        .map(|(index, (slot_number, slot))| {
            let address = slot_number * u64::from(word_size);
            match &slot.decoded {
                DecodedOrFault::Instruction(instruction) => DisassemblyRow {
                    index,
                    address,
                    mnemonic: instruction.opcode().mnemonic().to_string(),
                    operands: operands(instruction),
                    fault: None,
                },
                DecodedOrFault::Fault(fault) => DisassemblyRow {
                    index,
                    address,
                    mnemonic: slot.tokens.first().cloned().unwrap_or_default(),
                    operands: slot.tokens.get(1..).unwrap_or_default().join(", "),
                    fault: Some(fault.to_string()),
                },
            }
        })
        .collect()
}

fn operands(instruction: &Instruction) -> String {
    match instruction {
        Instruction::Add(ops) | Instruction::Sub(ops) | Instruction::Slt(ops) => {
            format!("{}, {}, {}", ops.rd, ops.rs, ops.rt)
        }
        Instruction::Addi(ops) | Instruction::Subi(ops) => {
            format!("{}, {}, {}", ops.rd, ops.rs, ops.imm)
        }
        Instruction::Bne(ops) => format!("{}, {}, {}", ops.rs, ops.rt, branch_words(ops.offset)),
        Instruction::J { target } | Instruction::Jal { target } => target.to_string(),
        Instruction::Lw(ops) | Instruction::Sw(ops) => {
            format!("{}, {}({})", ops.rt, ops.offset, ops.base)
        }
        Instruction::Cache(op) => op.code().to_string(),
        Instruction::Halt | Instruction::Nop => String::new(),
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mnemonic = self.opcode().mnemonic();
        let operands = operands(self);
        if operands.is_empty() {
            f.write_str(mnemonic)
        } else {
            write!(f, "{mnemonic} {operands}")
        }
    }
}
