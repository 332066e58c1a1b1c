//! Profile selection and validation.

use serde_yaml::Value;
use thiserror::Error;

use crate::config::{ConfigDocument, Field};

/// Launch fields every profile must define, in report order
pub const REQUIRED_FIELDS: [&str; 3] = ["litellm-config", "host", "port"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProfileError {
    #[error("No profile specified and no default profile set")]
    NoProfileSelected { available: Vec<String> },
    #[error("Profile '{name}' not found")]
    ProfileNotFound { name: String, available: Vec<String> },
    #[error("Profile '{profile}' missing required field(s): {}", .fields.join(", "))]
    MissingField {
        profile: String,
        fields: Vec<&'static str>,
    },
    #[error("Profile '{profile}' has invalid value(s): {}", .fields.join(", "))]
    InvalidField {
        profile: String,
        /// `field: value` as written in the config
        fields: Vec<String>,
    },
    #[error("Profile '{profile}' is not a mapping: {reason}")]
    Malformed { profile: String, reason: String },
}

pub type Result<T> = std::result::Result<T, ProfileError>;

/// Values supplied on the command line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileRequest {
    /// Explicit `--profile`, wins over `default_profile`
    pub name: Option<String>,
    /// `--host`, wins over the profile's host
    pub host: Option<String>,
    /// `--port`, wins over the profile's port
    pub port: Option<u16>,
}

/// A validated profile whose LiteLLM config path is not yet resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedProfile {
    pub name: String,
    pub host: String,
    pub port: u16,
    /// Filename exactly as written in the profile
    pub litellm_config: String,
}

/// Outcome of checking one required field
enum Check<T> {
    Present(T),
    Missing,
    Invalid(String),
}

impl<T> Check<T> {
    fn record(
        self,
        field: &'static str,
        missing: &mut Vec<&'static str>,
        invalid: &mut Vec<String>,
    ) -> Option<T> {
        match self {
            Check::Present(value) => Some(value),
            Check::Missing => {
                missing.push(field);
                None
            }
            Check::Invalid(raw) => {
                invalid.push(format!("{}: {}", field, raw));
                None
            }
        }
    }
}

/// Text fields: blank counts as missing
fn check_text(field: Option<&Field<String>>) -> Check<String> {
    match field {
        None => Check::Missing,
        Some(Field::Valid(text)) if text.trim().is_empty() => Check::Missing,
        Some(Field::Valid(text)) => Check::Present(text.clone()),
        Some(invalid) => Check::Invalid(invalid.to_string()),
    }
}

/// Ports: integers in range, quoted or not
fn check_port(field: Option<&Field<u16>>) -> Check<u16> {
    match field {
        None => Check::Missing,
        Some(Field::Valid(port)) => Check::Present(*port),
        Some(Field::Invalid(Value::String(text))) if text.trim().is_empty() => Check::Missing,
        Some(Field::Invalid(Value::String(text))) => match text.trim().parse() {
            Ok(port) => Check::Present(port),
            Err(_) => Check::Invalid(text.clone()),
        },
        Some(invalid) => Check::Invalid(invalid.to_string()),
    }
}

/// Select, validate, and apply overrides to a profile
pub fn resolve(doc: &ConfigDocument, request: &ProfileRequest) -> Result<ResolvedProfile> {
    let name = request
        .name
        .as_ref()
        .or(doc.default_profile.as_ref())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| ProfileError::NoProfileSelected {
            available: doc.profile_names(),
        })?;

    let profile = doc
        .profiles
        .get(name)
        .ok_or_else(|| ProfileError::ProfileNotFound {
            name: name.clone(),
            available: doc.profile_names(),
        })?;

    if let Some(reason) = &profile.malformed {
        return Err(ProfileError::Malformed {
            profile: name.clone(),
            reason: reason.clone(),
        });
    }

    let [litellm_field, host_field, port_field] = REQUIRED_FIELDS;
    let mut missing = Vec::new();
    let mut invalid = Vec::new();
    let litellm_config = check_text(profile.litellm_config.as_ref()).record(
        litellm_field,
        &mut missing,
        &mut invalid,
    );
    let host = check_text(profile.host.as_ref()).record(host_field, &mut missing, &mut invalid);
    let port = check_port(profile.port.as_ref()).record(port_field, &mut missing, &mut invalid);

    match (litellm_config, host, port) {
        (Some(litellm_config), Some(host), Some(port)) => Ok(ResolvedProfile {
            name: name.clone(),
            host: request.host.clone().unwrap_or(host),
            port: request.port.unwrap_or(port),
            litellm_config,
        }),
        _ if !missing.is_empty() => Err(ProfileError::MissingField {
            profile: name.clone(),
            fields: missing,
        }),
        _ => Err(ProfileError::InvalidField {
            profile: name.clone(),
            fields: invalid,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"
default_profile: prod
profiles:
  prod:
    litellm-config: r.yaml
    host: 0.0.0.0
    port: 4000
  staging:
    litellm-config: s.yaml
    host: 10.0.0.1
    port: 4100
  broken:
    description: nothing useful
  half:
    litellm-config: h.yaml
    host: ""
"#;

    fn doc() -> ConfigDocument {
        ConfigDocument::parse(DOC).unwrap()
    }

    #[test]
    fn test_default_profile_used_without_request() {
        let resolved = resolve(&doc(), &ProfileRequest::default()).unwrap();
        assert_eq!(
            resolved,
            ResolvedProfile {
                name: "prod".to_string(),
                host: "0.0.0.0".to_string(),
                port: 4000,
                litellm_config: "r.yaml".to_string(),
            }
        );
    }

    #[test]
    fn test_explicit_profile_wins_over_default() {
        let request = ProfileRequest {
            name: Some("staging".to_string()),
            ..Default::default()
        };
        let resolved = resolve(&doc(), &request).unwrap();
        assert_eq!(resolved.name, "staging");
        assert_eq!(resolved.port, 4100);
    }

    #[test]
    fn test_no_profile_selected() {
        let mut doc = doc();
        doc.default_profile = None;
        let err = resolve(&doc, &ProfileRequest::default()).unwrap_err();
        assert!(matches!(err, ProfileError::NoProfileSelected { .. }));
    }

    #[test]
    fn test_profile_not_found_lists_all_names() {
        let request = ProfileRequest {
            name: Some("missing".to_string()),
            ..Default::default()
        };
        let err = resolve(&doc(), &request).unwrap_err();
        assert_eq!(
            err,
            ProfileError::ProfileNotFound {
                name: "missing".to_string(),
                available: vec![
                    "prod".to_string(),
                    "staging".to_string(),
                    "broken".to_string(),
                    "half".to_string(),
                ],
            }
        );
    }

    #[test]
    fn test_missing_fields_all_reported() {
        let request = ProfileRequest {
            name: Some("broken".to_string()),
            ..Default::default()
        };
        let err = resolve(&doc(), &request).unwrap_err();
        assert_eq!(
            err,
            ProfileError::MissingField {
                profile: "broken".to_string(),
                fields: vec!["litellm-config", "host", "port"],
            }
        );
        assert!(err.to_string().contains("litellm-config, host, port"));
    }

    #[test]
    fn test_empty_string_counts_as_missing() {
        let request = ProfileRequest {
            name: Some("half".to_string()),
            ..Default::default()
        };
        let err = resolve(&doc(), &request).unwrap_err();
        assert_eq!(
            err,
            ProfileError::MissingField {
                profile: "half".to_string(),
                fields: vec!["host", "port"],
            }
        );
    }

    #[test]
    fn test_cli_overrides_take_precedence() {
        let request = ProfileRequest {
            name: None,
            host: Some("127.0.0.1".to_string()),
            port: Some(9000),
        };
        let resolved = resolve(&doc(), &request).unwrap();
        assert_eq!(resolved.host, "127.0.0.1");
        assert_eq!(resolved.port, 9000);
        assert_eq!(resolved.litellm_config, "r.yaml");
    }

    #[test]
    fn test_port_override_only() {
        let request = ProfileRequest {
            port: Some(9000),
            ..Default::default()
        };
        let resolved = resolve(&doc(), &request).unwrap();
        assert_eq!(resolved.host, "0.0.0.0");
        assert_eq!(resolved.port, 9000);
    }

    const MIXED: &str = r#"
default_profile: prod
profiles:
  prod:
    litellm-config: r.yaml
    host: 0.0.0.0
    port: 4000
  scratch:
    litellm-config: s.yaml
    host: 127.0.0.1
    port: auto
  quoted:
    litellm-config: q.yaml
    host: 127.0.0.1
    port: "4100"
  listy:
    litellm-config: [a, b]
    host: 127.0.0.1
  numbered: 7
"#;

    fn select(doc: &ConfigDocument, name: &str) -> Result<ResolvedProfile> {
        let request = ProfileRequest {
            name: Some(name.to_string()),
            ..Default::default()
        };
        resolve(doc, &request)
    }

    #[test]
    fn test_bad_sibling_profile_does_not_block_default() {
        let doc = ConfigDocument::parse(MIXED).unwrap();
        let resolved = resolve(&doc, &ProfileRequest::default()).unwrap();
        assert_eq!(resolved.name, "prod");
        assert_eq!(resolved.port, 4000);
    }

    #[test]
    fn test_invalid_field_reported_for_selected_profile() {
        let doc = ConfigDocument::parse(MIXED).unwrap();
        let err = select(&doc, "scratch").unwrap_err();
        assert_eq!(
            err,
            ProfileError::InvalidField {
                profile: "scratch".to_string(),
                fields: vec!["port: auto".to_string()],
            }
        );
        assert!(err.to_string().contains("port: auto"));
    }

    #[test]
    fn test_quoted_port_is_accepted() {
        let doc = ConfigDocument::parse(MIXED).unwrap();
        assert_eq!(select(&doc, "quoted").unwrap().port, 4100);
    }

    #[test]
    fn test_missing_reported_before_invalid() {
        let doc = ConfigDocument::parse(MIXED).unwrap();
        assert_eq!(
            select(&doc, "listy").unwrap_err(),
            ProfileError::MissingField {
                profile: "listy".to_string(),
                fields: vec!["port"],
            }
        );
    }

    #[test]
    fn test_non_mapping_profile_is_malformed() {
        let doc = ConfigDocument::parse(MIXED).unwrap();
        assert!(matches!(
            select(&doc, "numbered"),
            Err(ProfileError::Malformed { ref profile, .. }) if profile == "numbered"
        ));
    }

    #[test]
    fn test_overrides_do_not_mask_missing_fields() {
        let request = ProfileRequest {
            name: Some("broken".to_string()),
            host: Some("127.0.0.1".to_string()),
            port: Some(9000),
        };
        assert!(matches!(
            resolve(&doc(), &request),
            Err(ProfileError::MissingField { .. })
        ));
    }
}
