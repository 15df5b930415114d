//! Execution core for a MIPS-style instruction-set simulator.
//!
//! A [`CoreState`] owns a 32-entry register file, a program counter, a
//! program decoded once at load time, a sparse [`WordStore`] and an optional
//! direct-mapped write-back [`Cache`]. [`step_one`] executes one instruction;
//! [`run`] steps until `HALT`, a fault, or the end of the program.
//!
//! ```
//! use sim_core::{run, CoreConfig, CoreState, NoTrace, StepOutcome};
//!
//! let mut core = CoreState::new(CoreConfig::default()).expect("default config is valid");
//! core.load_program(&[vec!["ADDI", "R1", "R0", "5"], vec!["HALT"]]);
//! let outcome = run(&mut core, &mut NoTrace);
//!
//! assert_eq!(outcome.final_step, StepOutcome::Halted);
//! assert_eq!(core.register_values()[1], 5);
//! ```

/// Word store, cache and memory sizing constants.
pub mod memory;
pub use memory::{
    AddressParts, Cache, CacheGeometry, CacheLine, CacheStats, WordStore, DEFAULT_BLOCK_SIZE,
    DEFAULT_CACHE_SIZE, DEFAULT_MEMORY_SIZE, WORD_MASK, WORD_SIZE,
};

/// Public host-facing API: configuration, core state and trace hooks.
pub mod api;
pub use api::{
    AccessKind, ConfigError, CoreConfig, CoreState, NoTrace, RunOutcome, StepOutcome, TraceEvent,
    TraceSink,
};

/// Register file and run-state primitives.
pub mod state;
pub use state::{Register, RegisterFile, RunState, LINK_REGISTER, REGISTER_COUNT};

/// Opcode table.
pub mod encoding;
pub use encoding::{Opcode, OPCODE_TABLE};

/// Token-list decoder producing fixed-shape instructions.
pub mod decoder;
pub use decoder::{
    BranchOperands, CacheOp, DecodedOrFault, Decoder, ImmediateOperands, Instruction,
    MemoryOperands, ProgramSlot, RegisterOperands,
};

/// Canonical instruction text and program listings.
pub mod disasm;
pub use disasm::{disassemble, DisassemblyRow};

/// Fault taxonomy raised by instructions.
pub mod fault;
pub use fault::{Fault, FaultClass, FaultCode};

/// Instruction execution and the fetch/execute loop.
pub mod execute;
pub use execute::{execute_instruction, run, step_one, ExecuteOutcome};

#[cfg(test)]
use proptest as _;
#[cfg(test)]
use rstest as _;
