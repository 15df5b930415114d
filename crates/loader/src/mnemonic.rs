//! Advisory checks of instruction token lists against the core opcode table.
//!
//! Nothing reported here stops a run: a bad line only faults if execution
//! reaches it.

use core::fmt;

use sim_core::{Opcode, OPCODE_TABLE};

/// What is wrong with one instruction line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WarningKind {
    /// The first token is not in the opcode table.
    UnknownOpcode(String),
    /// The operand count does not match the opcode table.
    ArgumentCount {
        /// Mnemonic as written.
        opcode: String,
        /// Operand count listed in the table.
        expected: usize,
        /// Operands present on the line.
        found: usize,
    },
}

/// A validation warning for one instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    /// Instruction index in the program.
    pub index: usize,
    /// Problem found.
    pub kind: WarningKind,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            WarningKind::UnknownOpcode(name) => {
                write!(f, "instruction {}: unknown instruction: {name}", self.index)
            }
            WarningKind::ArgumentCount {
                opcode,
                expected,
                found,
            } => write!(
                f,
                "instruction {}: incorrect number of arguments for {opcode}, expected {expected}, got {found}",
                self.index
            ),
        }
    }
}

fn lookup(mnemonic: &str) -> Option<(Opcode, usize)> {
    OPCODE_TABLE
        .iter()
        .find_map(|&(name, opcode, args)| (name == mnemonic).then_some((opcode, args)))
}

/// Checks every instruction's opcode and operand count.
///
/// An operand count is accepted anywhere between what the opcode needs to
/// decode and what the table lists, so a bare `HALT` passes.
#[must_use]
pub fn validate_program<S: AsRef<str>>(program: &[Vec<S>]) -> Vec<Warning> {
    program
        .iter()
        .enumerate()
        .filter_map(|(index, tokens)| {
            let name = tokens.first().map_or("", AsRef::as_ref);
            let kind = match lookup(name) {
                None => WarningKind::UnknownOpcode(name.to_string()),
                Some((opcode, expected)) => {
                    let found = tokens.len() - 1;
                    if (opcode.required_operands()..=expected).contains(&found) {
                        return None;
                    }
                    WarningKind::ArgumentCount {
                        opcode: name.to_string(),
                        expected,
                        found,
                    }
                }
            };
            Some(Warning { index, kind })
        })
        .collect()
}
