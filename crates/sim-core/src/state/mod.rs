//! Register file and run-state primitives.

/// Register identifiers and the register file.
pub mod registers;
/// Host-observable execution state.
pub mod run_state;

pub use registers::{Register, RegisterFile, LINK_REGISTER, REGISTER_COUNT};
pub use run_state::RunState;
