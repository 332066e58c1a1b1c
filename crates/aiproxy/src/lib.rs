//! aiproxy - profile-driven launcher for the LiteLLM proxy server
//!
//! A YAML config file defines named profiles:
//!
//! ```yaml
//! default_profile: prod
//! profiles:
//!   prod:
//!     litellm-config: litellm.yaml
//!     host: 0.0.0.0
//!     port: 4000
//! ```
//!
//! `aiproxy` resolves a profile to a [`launcher::LaunchSpec`], passes the
//! configured environment to the proxy server, and starts it. The launcher
//! can also install itself as a per-user launchd service.

pub mod cli;
pub mod config;
pub mod error;
pub mod launcher;
pub mod logging;
pub mod paths;
pub mod profile;
pub mod service;
pub mod tracer;

pub use config::{ConfigDocument, ConfigError, Field, ProfileConfig, TracerConfig};
pub use error::{Error, Result};
pub use launcher::{LaunchError, LaunchPlan, LaunchSpec};
pub use paths::PathError;
pub use profile::{ProfileError, ProfileRequest, ResolvedProfile};
pub use service::{ServiceController, ServiceError, ServiceState};
pub use tracer::TracerSink;
