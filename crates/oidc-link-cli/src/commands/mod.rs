pub mod config;
pub mod extract;
pub mod resolve;

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use oidc_link::Document;

/// Reads a JSON file into a document.
pub fn read_document(path: &Path) -> Result<Document> {
    let text =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&text)
        .with_context(|| format!("{} is not valid JSON", path.display()))?;
    Ok(Document::from(value))
}
