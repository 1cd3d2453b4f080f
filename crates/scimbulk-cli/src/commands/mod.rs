//! CLI command implementations for scimbulk.

pub mod check;
pub mod resolve;

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Read a request body from disk.
pub(crate) fn read_request(file: &Path) -> Result<Vec<u8>> {
    fs::read(file).with_context(|| format!("Failed to read bulk request {}", file.display()))
}
