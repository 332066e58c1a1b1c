//! Crate-level error type and user-facing hints.

use thiserror::Error;

use crate::config::ConfigError;
use crate::launcher::LaunchError;
use crate::paths::{self, PathError};
use crate::profile::ProfileError;
use crate::service::ServiceError;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Profile(#[from] ProfileError),
    #[error(transparent)]
    Path(#[from] PathError),
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error(transparent)]
    Launch(#[from] LaunchError),
    #[error("Could not run editor '{editor}': {source}")]
    Editor {
        editor: String,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

fn list_names(names: &[String]) -> Vec<String> {
    if names.is_empty() {
        return vec!["No profiles defined in configuration".to_string()];
    }
    std::iter::once("Available profiles:".to_string())
        .chain(names.iter().map(|n| format!("  {}", n)))
        .collect()
}

impl Error {
    /// Follow-up lines telling the user what to do next
    pub fn hints(&self) -> Vec<String> {
        match self {
            Error::Config(ConfigError::NotFound { .. }) => vec![
                "Create it from example.yaml or run: aiproxy --config-dir".to_string(),
            ],
            Error::Config(ConfigError::UnknownProfile { available, .. }) => list_names(available),
            Error::Config(_) => Vec::new(),
            Error::Profile(ProfileError::NoProfileSelected { .. }) => vec![
                "Use --profile <name> or set default_profile in config".to_string(),
                "Use --list-profiles to see available profiles".to_string(),
            ],
            Error::Profile(ProfileError::ProfileNotFound { available, .. }) => {
                let mut hints = list_names(available);
                hints.push("Use --list-profiles to see available profiles".to_string());
                hints
            }
            Error::Profile(ProfileError::MissingField { profile, .. }) => vec![format!(
                "Add the missing field(s) to profile '{}' in your config",
                profile
            )],
            Error::Profile(ProfileError::InvalidField { profile, .. }) => vec![
                format!("Fix the listed value(s) in profile '{}'", profile),
                "litellm-config and host are strings, port is a number from 1 to 65535"
                    .to_string(),
            ],
            Error::Profile(ProfileError::Malformed { profile, .. }) => vec![format!(
                "Profile '{}' must map litellm-config, host, and port",
                profile
            )],
            Error::Path(PathError::ConfigFileNotFound { filename, .. }) => {
                vec![match paths::app_data_dir() {
                    Ok(dir) => format!(
                        "Place {} next to your config file or in {}",
                        filename,
                        dir.display()
                    ),
                    Err(_) => format!("Place {} next to your config file", filename),
                }]
            }
            Error::Path(PathError::NoHomeDirectory) | Error::Service(ServiceError::Path(_)) => {
                vec!["Set HOME to your home directory".to_string()]
            }
            Error::Path(PathError::Expand { .. }) => vec![format!(
                "Check the variables used in --config, {} or {}",
                crate::config::CONFIG_ENV,
                crate::config::LEGACY_CONFIG_ENV
            )],
            Error::Service(ServiceError::ExecutableNotFound { .. }) => vec![
                "Install aiproxy so it is on PATH, e.g. cargo install --path crates/aiproxy"
                    .to_string(),
            ],
            Error::Service(ServiceError::ManifestMissing { .. }) => {
                vec!["Run --install-service first".to_string()]
            }
            Error::Service(ServiceError::ServiceManager { .. }) => paths::app_log_dir()
                .map(|dir| vec![format!("Check the service logs in {}", dir.display())])
                .unwrap_or_default(),
            Error::Service(ServiceError::Io { .. }) => Vec::new(),
            Error::Launch(LaunchError::Spawn { .. }) => vec![format!(
                "Install the LiteLLM proxy (pip install 'litellm[proxy]') or set {}",
                crate::launcher::SERVER_BIN_ENV
            )],
            Error::Launch(_) => Vec::new(),
            Error::Editor { .. } => vec!["Set VISUAL or EDITOR to your editor".to_string()],
        }
    }
}
