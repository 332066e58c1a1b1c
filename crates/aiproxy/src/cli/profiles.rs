//! Profile management commands: list, get default, set default.

use std::fmt::Write;
use std::path::Path;

use crate::config::{self, ConfigDocument, Field};

/// Render every profile with its launch fields
pub fn render_profiles(doc: &ConfigDocument) -> Option<String> {
    if doc.profiles.is_empty() {
        return None;
    }

    let mut out = String::from("Available profiles:\n");
    for (name, profile) in &doc.profiles {
        let marker = if doc.default_profile.as_deref() == Some(name.as_str()) {
            " (default)"
        } else {
            ""
        };
        let description = profile
            .description
            .as_ref()
            .map(|d| d.to_string())
            .unwrap_or_else(|| "No description available".to_string());
        // Writing to a String cannot fail
        let _ = writeln!(out, "  {}{}", name, marker);
        let _ = writeln!(out, "    {}", description);
        let _ = writeln!(
            out,
            "    litellm-config: {}",
            or_na(profile.litellm_config.as_ref())
        );
        let _ = writeln!(out, "    host: {}", or_na(profile.host.as_ref()));
        let _ = writeln!(out, "    port: {}", or_na(profile.port.as_ref()));
        out.push('\n');
    }
    Some(out)
}

fn or_na<T: std::fmt::Display>(value: Option<&Field<T>>) -> String {
    value
        .map(|v| v.to_string())
        .unwrap_or_else(|| "N/A".to_string())
}

pub fn list_profiles(doc: &ConfigDocument) {
    match render_profiles(doc) {
        Some(listing) => print!("{}", listing),
        None => eprintln!("No profiles found in configuration"),
    }
}

pub fn get_default(doc: &ConfigDocument) -> Option<&str> {
    match doc.default_profile.as_deref() {
        Some(name) => {
            println!("Default profile: {}", name);
            Some(name)
        }
        None => {
            eprintln!("No default profile set");
            None
        }
    }
}

pub fn set_default(config_path: &Path, name: &str) -> crate::Result<()> {
    config::set_default_profile(config_path, name)?;
    println!("Default profile set to: {}", name);
    Ok(())
}
