//! Input loaders, run reports and tracing for the `mips-sim` front end.

use clap as _;
use env_logger as _;

/// Load-time error types.
pub mod errors;
/// Advisory opcode and operand-count validation.
pub mod mnemonic;
/// Instruction and data file parsing.
pub mod parser;
/// Run summaries in text and JSON form.
pub mod report;
/// Core construction from input files.
pub mod runner;
/// File reading and comment/blank-line filtering.
pub mod source;
/// Console trace sink.
pub mod trace;

pub use errors::{DataLineError, LoadError};
pub use mnemonic::{validate_program, Warning, WarningKind};
pub use parser::{parse_data, parse_data_line, parse_program, tokenize, Program};
pub use report::{CacheReport, FaultReport, MemoryWord, RunReport, RunStatus};
pub use runner::{prepare, Prepared, RunRequest};
pub use source::{read_file, significant_lines, SourceLine};
pub use trace::TextTrace;
