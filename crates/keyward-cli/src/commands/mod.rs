//! CLI command implementations.

pub mod keys;
pub mod token;

use anyhow::Context;
use std::fs;
use std::path::Path;

/// Read `value` from disk if it names an existing file, otherwise use it as is.
pub(crate) fn inline_or_file(value: &str) -> anyhow::Result<String> {
    let path = Path::new(value);
    if path.is_file() {
        tracing::debug!(path = %path.display(), "reading argument from file");
        return fs::read_to_string(path)
            .map(|s| s.trim().to_string())
            .with_context(|| format!("Failed to read {}", path.display()));
    }
    Ok(value.trim().to_string())
}

/// Resolve a PEM key from a file path or an inline PEM block.
pub(crate) fn resolve_pem(value: &str, what: &str) -> anyhow::Result<String> {
    let pem = inline_or_file(value)?;
    if !pem.starts_with("-----BEGIN ") {
        anyhow::bail!("{what} is neither a readable file nor a PEM block");
    }
    Ok(pem)
}
