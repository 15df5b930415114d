//! Instruction-file and data-file parsing.

use std::path::Path;

use crate::errors::{DataLineError, LoadError};
use crate::source::{significant_lines, SourceLine};

/// Token lists of a parsed instruction file, with source line numbers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Program {
    /// One token list per instruction, opcode first.
    pub instructions: Vec<Vec<String>>,
    /// Original 1-indexed line number of each instruction.
    pub lines: Vec<usize>,
}

impl Program {
    /// Number of instructions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Returns true for a program without instructions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Source line of instruction `index`, if it exists.
    #[must_use]
    pub fn line_of(&self, index: usize) -> Option<usize> {
        self.lines.get(index).copied()
    }
}

/// Splits one instruction line into tokens; commas separate like spaces.
#[must_use]
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parses the contents of an instruction file.
///
/// No syntax is rejected here; the core decides what each line means.
#[must_use]
pub fn parse_program(content: &str) -> Program {
    let mut program = Program::default();
    for SourceLine {
        text,
        original_line,
    } in significant_lines(content)
    {
        program.instructions.push(tokenize(&text));
        program.lines.push(original_line);
    }
    program
}

/// Parses one `address,value` data line.
///
/// The address is written in binary digits, optionally prefixed with `0b`;
/// the value is a signed decimal integer.
///
/// # Errors
///
/// Returns the [`DataLineError`] describing the malformed part.
pub fn parse_data_line(text: &str) -> Result<(i64, i64), DataLineError> {
    let (address, value) = text.split_once(',').ok_or(DataLineError::MissingComma)?;
    let address = address.trim();
    let value = value.trim();

    let digits = address.strip_prefix("0b").unwrap_or(address);
    let address = i64::from_str_radix(digits, 2)
        .ok()
        .filter(|_| digits.bytes().all(|b| b == b'0' || b == b'1'))
        .ok_or_else(|| DataLineError::BadAddress(address.to_string()))?;
    let value = value
        .parse::<i64>()
        .map_err(|_| DataLineError::BadValue(value.to_string()))?;
    Ok((address, value))
}

/// Parses the contents of a data file into `(address, value, line)` triples.
///
/// # Errors
///
/// Returns [`LoadError::MalformedData`] for the first malformed line.
pub fn parse_data(path: &Path, content: &str) -> Result<Vec<(i64, i64, usize)>, LoadError> {
    significant_lines(content)
        .into_iter()
        .map(|line| {
            let (address, value) =
                parse_data_line(&line.text).map_err(|reason| LoadError::MalformedData {
                    path: path.to_path_buf(),
                    line: line.original_line,
                    reason,
                })?;
            Ok((address, value, line.original_line))
        })
        .collect()
}
