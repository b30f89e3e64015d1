use std::path::Path;

use oidc_link::{Attribute, OidcSettings};

use crate::cli::OutputFormat;
use crate::output::{print_field, print_json, print_success, print_table};

pub fn check(settings: &OidcSettings, source: Option<&Path>, format: OutputFormat) {
    match format {
        OutputFormat::Json => match serde_json::to_value(settings) {
            Ok(value) => print_json(&value),
            Err(e) => print_field("Settings", &format!("(not serializable: {e})")),
        },
        OutputFormat::Table => {
            print_field("Enabled", &settings.enabled.to_string());
            print_field("Email verified", &settings.email_verified.to_string());
            print_field(
                "Userinfo URL",
                settings.user_json_url.as_deref().unwrap_or("(not set)"),
            );
            let rows = Attribute::ALL
                .into_iter()
                .map(|attribute| {
                    let path = settings.path_for(attribute);
                    [
                        attribute.to_string(),
                        attribute.path_setting().to_string(),
                        if path.is_empty() {
                            "(not configured)".to_string()
                        } else {
                            path.to_string()
                        },
                    ]
                })
                .collect();
            print_table(["Attribute", "Setting", "Path"], rows);

            let origin = source
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "defaults and environment".to_string());
            print_success(&format!("Settings from {origin} are valid"));
        }
    }
}
