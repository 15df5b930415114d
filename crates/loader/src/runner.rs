//! Builds a ready-to-run core from input files.

use std::path::PathBuf;

use sim_core::{CoreConfig, CoreState};

use crate::errors::LoadError;
use crate::mnemonic::{validate_program, Warning};
use crate::parser::{parse_data, parse_program};
use crate::source::read_file;

/// Inputs and machine settings for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    /// Instruction file.
    pub instructions: PathBuf,
    /// Optional data file seeding the word store.
    pub memory: Option<PathBuf>,
    /// Machine configuration.
    pub config: CoreConfig,
    /// Attach a cold cache before the first instruction.
    pub start_with_cache: bool,
}

impl RunRequest {
    /// A request for `instructions` with default settings.
    #[must_use]
    pub fn new(instructions: impl Into<PathBuf>) -> Self {
        Self {
            instructions: instructions.into(),
            memory: None,
            config: CoreConfig::default(),
            start_with_cache: false,
        }
    }
}

/// A loaded core plus the advisory warnings produced while loading it.
#[derive(Debug)]
pub struct Prepared {
    /// Core positioned at PC 0.
    pub core: CoreState,
    /// Validation warnings, also logged.
    pub warnings: Vec<Warning>,
}

/// Reads, parses and loads everything `request` names.
///
/// # Errors
///
/// Returns a [`LoadError`] for unreadable files, malformed or out-of-range
/// data, or an invalid configuration.
pub fn prepare(request: &RunRequest) -> Result<Prepared, LoadError> {
    let mut core = CoreState::new(request.config)?;

    let program = parse_program(&read_file(&request.instructions)?);
    let warnings = validate_program(&program.instructions);
    for warning in &warnings {
        match program.line_of(warning.index) {
            Some(line) => log::warn!("{}:{line}: {warning}", request.instructions.display()),
            None => log::warn!("{warning}"),
        }
    }
    core.load_program(&program.instructions);

    if let Some(path) = &request.memory {
        let entries = parse_data(path, &read_file(path)?)?;
        for (address, value, line) in entries {
            core.store_mut()
                .store_word(address, value)
                .map_err(|fault| LoadError::DataOutOfRange {
                    path: path.clone(),
                    line,
                    fault,
                })?;
        }
    }

    if request.start_with_cache {
        core.enable_cache();
    }

    Ok(Prepared { core, warnings })
}
