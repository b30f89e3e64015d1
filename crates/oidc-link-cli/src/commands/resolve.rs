use std::path::Path;

use anyhow::{Result, bail};
use oidc_link::{AttributePath, OidcSettings};

use crate::cli::OutputFormat;
use crate::commands::read_document;
use crate::output::{print_field, print_json, print_warning};

pub fn resolve(
    settings: &OidcSettings,
    document_path: &Path,
    raw_path: &str,
    format: OutputFormat,
) -> Result<()> {
    let path = AttributePath::parse(raw_path);
    if path.is_empty() {
        bail!("Attribute path is empty");
    }

    let document = read_document(document_path)?;
    let resolved = oidc_link::resolve(&document, &path, settings);

    match format {
        OutputFormat::Json => match resolved {
            Some(value) => print_json(&value.to_json()),
            None => print_json(&serde_json::Value::Null),
        },
        OutputFormat::Table => {
            print_field("Path", &path.to_string());
            match resolved {
                Some(value) if !value.is_blank() => print_field("Value", &value.to_string()),
                Some(value) => print_field("Value (blank)", &value.to_string()),
                None => print_field("Value", "(absent)"),
            }
        }
    }

    if resolved.is_none_or(|value| value.is_blank()) {
        print_warning(&format!("'{raw_path}' does not resolve to a value"));
    }
    Ok(())
}
