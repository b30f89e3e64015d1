use std::path::Path;

use anyhow::Result;
use oidc_link::{
    Attribute, AttributeExtractor, OidcSettings, UserInfoClient, UserInfoSource, settings_handle,
};
use serde_json::{Map, Value, json};

use crate::cli::OutputFormat;
use crate::commands::read_document;
use crate::output::{print_json, print_table, print_warning};

pub async fn extract(
    settings: OidcSettings,
    claims_path: &Path,
    token: &str,
    subject: &str,
    format: OutputFormat,
) -> Result<()> {
    let claims = read_document(claims_path)?;
    let handle = settings_handle(settings);
    let extractor = AttributeExtractor::new(handle.clone());
    let client = UserInfoClient::new(handle);

    let attributes = extractor
        .extract(&claims, || client.fetch_user_info(token, subject))
        .await?;

    match format {
        OutputFormat::Json => {
            let mut out = Map::new();
            for (attribute, resolved) in attributes.iter() {
                out.insert(
                    attribute.to_string(),
                    json!({
                        "value": resolved.value.to_json(),
                        "source": resolved.source,
                    }),
                );
            }
            print_json(&Value::Object(out));
        }
        OutputFormat::Table => {
            let rows = attributes
                .iter()
                .map(|(attribute, resolved)| {
                    [
                        attribute.to_string(),
                        format!("{:?}", resolved.source),
                        resolved.value.to_string(),
                    ]
                })
                .collect();
            print_table(["Attribute", "Source", "Value"], rows);
        }
    }

    if !attributes.contains(Attribute::Email) {
        print_warning("No email resolved; a login with these documents would fail");
    }
    Ok(())
}
