//! Best-effort tracing export for the proxy server.
//!
//! Tracing is observability only: every problem downgrades the sink to
//! [`TracerSink::Unavailable`] with a warning and the launch continues.

use crate::config::TracerConfig;

pub const DEFAULT_PROJECT_NAME: &str = "aiproxy";

/// Tracing capability resolved once at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TracerSink {
    Disabled,
    Enabled {
        endpoint: String,
        project_name: String,
    },
    Unavailable {
        reason: String,
    },
}

impl TracerSink {
    pub fn from_config(config: &TracerConfig) -> Self {
        if !config.enabled {
            return TracerSink::Disabled;
        }

        let sink = match config.endpoint.as_deref().map(str::trim) {
            None | Some("") => TracerSink::Unavailable {
                reason: "tracer enabled but no endpoint specified".to_string(),
            },
            Some(endpoint)
                if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) =>
            {
                TracerSink::Unavailable {
                    reason: format!("unsupported tracer endpoint '{}'", endpoint),
                }
            }
            Some(endpoint) => TracerSink::Enabled {
                endpoint: endpoint.to_string(),
                project_name: config
                    .project_name
                    .clone()
                    .filter(|p| !p.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_PROJECT_NAME.to_string()),
            },
        };

        match &sink {
            TracerSink::Enabled { project_name, .. } => {
                log::info!("Tracing enabled for project: {}", project_name)
            }
            TracerSink::Unavailable { reason } => {
                log::warn!("Tracing disabled: {}", reason)
            }
            TracerSink::Disabled => {}
        }
        sink
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, TracerSink::Enabled { .. })
    }

    /// Environment that points the proxy's OpenTelemetry exporter at the sink
    pub fn env(&self) -> Vec<(String, String)> {
        match self {
            TracerSink::Enabled {
                endpoint,
                project_name,
            } => vec![
                (
                    "PHOENIX_COLLECTOR_ENDPOINT".to_string(),
                    endpoint.clone(),
                ),
                ("PHOENIX_PROJECT_NAME".to_string(), project_name.clone()),
                (
                    "OTEL_EXPORTER_OTLP_ENDPOINT".to_string(),
                    endpoint.clone(),
                ),
            ],
            TracerSink::Disabled | TracerSink::Unavailable { .. } => Vec::new(),
        }
    }
}
