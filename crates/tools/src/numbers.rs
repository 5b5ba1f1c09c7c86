//! Inner actions of the number tools: plain units of work over text files
//! holding one integer.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use vretool_engine::Offloadable;

pub const NUMBER_FILE: &str = "number file";
pub const PLAIN_TEXT: &str = "plain text";

pub fn read_number(path: &Path) -> Result<i64> {
    let content = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    content
        .trim()
        .parse::<i64>()
        .with_context(|| format!("{} does not hold an integer", path.display()))
}

pub fn write_number(path: &Path, value: i64) -> Result<()> {
    fs::write(path, value.to_string()).with_context(|| format!("Failed to write {}", path.display()))
}

/// Writes the number in `input` plus `increment` to `output`.
#[derive(Debug, Clone)]
pub struct IncrementFile {
    pub input: PathBuf,
    pub output: PathBuf,
    pub increment: i64,
}

impl Offloadable for IncrementFile {
    fn task_name(&self) -> &str {
        "inputPlusOne"
    }

    fn execute(&self) -> Result<()> {
        let value = read_number(&self.input)?;
        write_number(&self.output, value + self.increment)
    }
}

/// Writes the sum of the numbers in `first` and `second` to `output`.
#[derive(Debug, Clone)]
pub struct SumFiles {
    pub first: PathBuf,
    pub second: PathBuf,
    pub output: PathBuf,
}

impl Offloadable for SumFiles {
    fn task_name(&self) -> &str {
        "sumTwoFiles"
    }

    fn execute(&self) -> Result<()> {
        let total = read_number(&self.first)? + read_number(&self.second)?;
        write_number(&self.output, total)
    }
}
