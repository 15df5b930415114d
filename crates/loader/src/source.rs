//! Line-oriented reading of instruction and data files.
//!
//! Both formats share the same outer syntax: blank lines and lines starting
//! with `#` are skipped, every other line is kept with its original line
//! number for error reporting.

use std::fs;
use std::path::Path;

use crate::errors::LoadError;

/// A significant line with its original location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLine {
    /// The trimmed line text.
    pub text: String,
    /// 1-indexed line number in the original file.
    pub original_line: usize,
}

/// Reads a whole input file.
///
/// # Errors
///
/// Returns [`LoadError::Io`] when the file cannot be read.
pub fn read_file(path: &Path) -> Result<String, LoadError> {
    log::info!("loading file: {}", path.display());
    fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Returns the non-blank, non-comment lines of `content`, trimmed.
#[must_use]
pub fn significant_lines(content: &str) -> Vec<SourceLine> {
    content
        .lines()
        .enumerate()
        .filter_map(|(idx, line)| {
            let text = line.trim();
            (!text.is_empty() && !text.starts_with('#')).then(|| SourceLine {
                text: text.to_string(),
                original_line: idx + 1,
            })
        })
        .collect()
}
