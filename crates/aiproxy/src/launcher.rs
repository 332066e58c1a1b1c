//! Launch plan composition and the proxy server process.
//!
//! Configuration flows strictly downward:
//! config document → profile → LiteLLM config path → tracer → child process.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use indexmap::IndexMap;
use thiserror::Error;
use tokio::process::Command;
use tokio::sync::watch;

use crate::config::ConfigDocument;
use crate::paths::{self, PathError};
use crate::profile::{self, ProfileRequest, ResolvedProfile};
use crate::tracer::TracerSink;

/// Overrides the proxy server executable
pub const SERVER_BIN_ENV: &str = "AIPROXY_SERVER_BIN";
pub const DEFAULT_SERVER_BIN: &str = "litellm";

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("Failed to start proxy server '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Proxy server exited with {}", exit_label(*.code))]
    Exited { code: Option<i32> },
    #[error("Failed to set Ctrl+C handler: {0}")]
    Signal(#[from] ctrlc::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LaunchError>;

fn exit_label(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "a signal".to_string(),
    }
}

/// Fully validated parameters handed to the proxy server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    profile_name: String,
    host: String,
    port: u16,
    secondary_config_path: PathBuf,
}

impl LaunchSpec {
    /// Only succeeds while the LiteLLM config exists on disk
    pub fn new(profile: ResolvedProfile, secondary_config_path: PathBuf) -> paths::Result<Self> {
        if !secondary_config_path.is_file() {
            return Err(PathError::ConfigFileNotFound {
                filename: profile.litellm_config,
                candidates: vec![secondary_config_path],
            });
        }
        Ok(Self {
            profile_name: profile.name,
            host: profile.host,
            port: profile.port,
            secondary_config_path,
        })
    }

    pub fn profile_name(&self) -> &str {
        &self.profile_name
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn secondary_config_path(&self) -> &Path {
        &self.secondary_config_path
    }

    /// Arguments for the LiteLLM proxy CLI
    pub fn server_args(&self) -> Vec<String> {
        vec![
            "--config".to_string(),
            self.secondary_config_path.to_string_lossy().to_string(),
            "--host".to_string(),
            self.host.clone(),
            "--port".to_string(),
            self.port.to_string(),
        ]
    }
}

impl fmt::Display for LaunchSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} (profile {}, config {})",
            self.host,
            self.port,
            self.profile_name,
            self.secondary_config_path.display()
        )
    }
}

/// Everything needed to start the proxy server
#[derive(Debug, Clone)]
pub struct LaunchPlan {
    pub spec: LaunchSpec,
    /// Main aiproxy config file the plan came from
    pub config_path: PathBuf,
    /// Environment for the child process only
    pub env: IndexMap<String, String>,
    pub tracer: TracerSink,
}

impl LaunchPlan {
    pub fn log_summary(&self) {
        for (key, value) in &self.env {
            log::info!("Set {} from config: {}", key, mask(value));
        }
        log::info!(
            "Starting AI proxy on {}:{}",
            self.spec.host(),
            self.spec.port()
        );
        log::info!("Using profile: {}", self.spec.profile_name());
        log::info!("Using config: {}", self.config_path.display());
        log::info!(
            "Using LiteLLM config: {}",
            self.spec.secondary_config_path().display()
        );
    }
}

/// Show a short prefix of a secret value
fn mask(value: &str) -> String {
    if value.chars().count() <= 4 {
        return "****".to_string();
    }
    let visible: String = value.chars().take(4).collect();
    format!("{}****", visible)
}

/// Build a launch plan using the per-user data directory as fallback
pub fn plan(
    doc: &ConfigDocument,
    config_path: &Path,
    request: &ProfileRequest,
) -> crate::Result<LaunchPlan> {
    plan_in(doc, config_path, &paths::app_data_dir()?, request)
}

/// Build a launch plan with an explicit data directory
pub fn plan_in(
    doc: &ConfigDocument,
    config_path: &Path,
    data_dir: &Path,
    request: &ProfileRequest,
) -> crate::Result<LaunchPlan> {
    let profile = profile::resolve(doc, request)?;
    let config_dir = paths::config_dir_of(config_path);
    let secondary =
        paths::resolve_secondary_config(&profile.litellm_config, &config_dir, data_dir)?;
    let spec = LaunchSpec::new(profile, secondary)?;

    let tracer = TracerSink::from_config(&doc.tracer);
    let mut env = doc.env_vars();
    for (key, value) in tracer.env() {
        env.entry(key).or_insert(value);
    }

    Ok(LaunchPlan {
        spec,
        config_path: config_path.to_path_buf(),
        env,
        tracer,
    })
}

/// Proxy server program from `AIPROXY_SERVER_BIN`, else `litellm`
pub fn server_program() -> String {
    std::env::var(SERVER_BIN_ENV)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_SERVER_BIN.to_string())
}

/// Run the proxy server until it exits or shutdown is signalled
pub async fn run(
    plan: &LaunchPlan,
    program: &str,
    mut shutdown: watch::Receiver<()>,
) -> Result<()> {
    let args = plan.spec.server_args();
    log::debug!("Spawning: {} {}", program, args.join(" "));

    let mut child = Command::new(program)
        .args(&args)
        .envs(&plan.env)
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| LaunchError::Spawn {
            program: program.to_string(),
            source,
        })?;

    if let Some(pid) = child.id() {
        log::debug!("Proxy server started with pid {}", pid);
    }

    let exited = tokio::select! {
        status = child.wait() => Some(status?),
        Ok(()) = shutdown.changed() => None,
    };

    let Some(status) = exited else {
        log::info!("Stopping proxy server...");
        child.kill().await?;
        log::info!("aiproxy exiting");
        return Ok(());
    };

    if status.success() {
        Ok(())
    } else {
        Err(LaunchError::Exited {
            code: status.code(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    const DOC: &str = r#"
default_profile: prod
env:
  OPENAI_API_KEY: sk-secret
  PHOENIX_PROJECT_NAME: from-env
tracer:
  enabled: true
  project_name: traced
  endpoint: http://localhost:6006/v1/traces
profiles:
  prod:
    litellm-config: r.yaml
    host: 0.0.0.0
    port: 4000
  packaged:
    litellm-config: packaged.yaml
    host: 127.0.0.1
    port: 4001
"#;

    struct Fixture {
        dir: tempfile::TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            std::fs::create_dir_all(dir.path().join("cfg")).unwrap();
            std::fs::create_dir_all(dir.path().join("data")).unwrap();
            std::fs::write(dir.path().join("cfg/config.yaml"), DOC).unwrap();
            std::fs::write(dir.path().join("cfg/r.yaml"), "model_list: []\n").unwrap();
            Self { dir }
        }

        fn config_path(&self) -> PathBuf {
            self.dir.path().join("cfg/config.yaml")
        }

        fn data_dir(&self) -> PathBuf {
            self.dir.path().join("data")
        }

        fn plan(&self, request: &ProfileRequest) -> crate::Result<LaunchPlan> {
            let doc = ConfigDocument::load(&self.config_path()).unwrap();
            plan_in(&doc, &self.config_path(), &self.data_dir(), request)
        }
    }

    #[test]
    fn test_default_profile_plan() {
        let fixture = Fixture::new();
        let plan = fixture.plan(&ProfileRequest::default()).unwrap();

        assert_eq!(plan.spec.profile_name(), "prod");
        assert_eq!(plan.spec.host(), "0.0.0.0");
        assert_eq!(plan.spec.port(), 4000);
        assert_eq!(
            plan.spec.secondary_config_path(),
            paths::config_dir_of(&fixture.config_path()).join("r.yaml")
        );
    }

    #[test]
    fn test_port_override() {
        let fixture = Fixture::new();
        let request = ProfileRequest {
            port: Some(9000),
            ..Default::default()
        };
        let plan = fixture.plan(&request).unwrap();
        assert_eq!(plan.spec.port(), 9000);
        assert!(plan.spec.server_args().ends_with(&["--port".to_string(), "9000".to_string()]));
    }

    #[test]
    fn test_env_is_explicit_and_tracer_does_not_override() {
        let fixture = Fixture::new();
        let plan = fixture.plan(&ProfileRequest::default()).unwrap();

        assert_eq!(plan.env["OPENAI_API_KEY"], "sk-secret");
        assert_eq!(plan.env["PHOENIX_PROJECT_NAME"], "from-env");
        assert_eq!(
            plan.env["PHOENIX_COLLECTOR_ENDPOINT"],
            "http://localhost:6006/v1/traces"
        );
        assert!(plan.tracer.is_enabled());
        // Nothing leaks into the launcher's own environment
        assert!(std::env::var("PHOENIX_COLLECTOR_ENDPOINT").is_err());
    }

    #[test]
    fn test_data_dir_fallback() {
        let fixture = Fixture::new();
        std::fs::write(fixture.data_dir().join("packaged.yaml"), "").unwrap();
        let request = ProfileRequest {
            name: Some("packaged".to_string()),
            ..Default::default()
        };
        let plan = fixture.plan(&request).unwrap();
        assert_eq!(
            plan.spec.secondary_config_path(),
            fixture.data_dir().join("packaged.yaml")
        );
    }

    #[test]
    fn test_missing_secondary_config() {
        let fixture = Fixture::new();
        let request = ProfileRequest {
            name: Some("packaged".to_string()),
            ..Default::default()
        };
        let err = fixture.plan(&request).unwrap_err();
        assert!(matches!(
            err,
            Error::Path(PathError::ConfigFileNotFound { ref candidates, .. }) if candidates.len() == 2
        ));
    }

    #[test]
    fn test_launch_spec_requires_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let profile = ResolvedProfile {
            name: "p".to_string(),
            host: "h".to_string(),
            port: 1,
            litellm_config: "gone.yaml".to_string(),
        };
        assert!(LaunchSpec::new(profile, dir.path().join("gone.yaml")).is_err());
    }

    #[test]
    fn test_mask() {
        assert_eq!(mask("sk-secret-value"), "sk-s****");
        assert_eq!(mask("abc"), "****");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_propagates_exit_status() {
        let fixture = Fixture::new();
        let plan = fixture.plan(&ProfileRequest::default()).unwrap();
        let (_tx, rx) = watch::channel(());

        assert!(run(&plan, "true", rx.clone()).await.is_ok());
        assert!(matches!(
            run(&plan, "false", rx).await,
            Err(LaunchError::Exited { code: Some(1) })
        ));
    }

    #[tokio::test]
    async fn test_run_missing_program() {
        let fixture = Fixture::new();
        let plan = fixture.plan(&ProfileRequest::default()).unwrap();
        let (_tx, rx) = watch::channel(());

        let err = run(&plan, "aiproxy-no-such-server", rx).await.unwrap_err();
        assert!(matches!(err, LaunchError::Spawn { .. }));
    }
}
