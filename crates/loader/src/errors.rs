//! Errors raised while loading input files and building a core.
//!
//! Everything here is reported before execution starts; faults raised by the
//! running program are [`sim_core::Fault`]s and end up in the run report.

use std::io;
use std::path::PathBuf;

use sim_core::{ConfigError, Fault};
use thiserror::Error;

/// Why a data-file line was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataLineError {
    /// No comma separates address and value.
    #[error("expected `address,value`")]
    MissingComma,
    /// Address is not a binary number.
    #[error("address `{0}` is not a binary number")]
    BadAddress(String),
    /// Value is not a decimal integer.
    #[error("value `{0}` is not a decimal integer")]
    BadValue(String),
}

/// Errors that stop a run before the first instruction executes.
#[derive(Debug, Error)]
pub enum LoadError {
    /// An input file could not be read.
    #[error("{}: {source}", path.display())]
    Io {
        /// File that failed to read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// A data-file line could not be parsed.
    #[error("{}:{line}: {reason}", path.display())]
    MalformedData {
        /// Data file being parsed.
        path: PathBuf,
        /// 1-indexed line number.
        line: usize,
        /// What was wrong with the line.
        reason: DataLineError,
    },
    /// A data-file address lies outside the word store.
    #[error("{}:{line}: {fault}", path.display())]
    DataOutOfRange {
        /// Data file being loaded.
        path: PathBuf,
        /// 1-indexed line number.
        line: usize,
        /// Range fault raised by the store.
        fault: Fault,
    },
    /// The requested machine configuration is invalid.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use sim_core::ConfigError;

    use super::{DataLineError, LoadError};

    #[test]
    fn malformed_data_reports_file_and_line() {
        let err = LoadError::MalformedData {
            path: PathBuf::from("data.txt"),
            line: 3,
            reason: DataLineError::BadAddress("12".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "data.txt:3: address `12` is not a binary number"
        );
    }

    #[test]
    fn config_errors_convert() {
        let err: LoadError = ConfigError::UnsupportedWordSize(2).into();
        assert_eq!(
            err.to_string(),
            "invalid configuration: word size must be 4 bytes, got 2"
        );
    }
}
