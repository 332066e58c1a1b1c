//! Per-user launchd service lifecycle.
//!
//! The launcher can run as a LaunchAgent installed to
//! `~/Library/LaunchAgents/dev.aiproxy.launcher.plist`. Each lifecycle
//! operation is a [`Transition`] whose steps declare their own failure
//! policy: a `Warn` step logs and continues, a `Fatal` step aborts, and a
//! `Recover` step hands over to [`Transition::Recover`].

pub mod launchctl;

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub use launchctl::{CommandOutput, Launchctl, ServiceManager};

use crate::paths::{self, PathError};

/// Stable launchd label
pub const SERVICE_LABEL: &str = "dev.aiproxy.launcher";

/// Binary the service runs, looked up on `PATH`
pub const EXECUTABLE_NAME: &str = "aiproxy";

/// Bundled LaunchAgent template
pub const MANIFEST_TEMPLATE: &str = include_str!("../../share/dev.aiproxy.launcher.plist");

const EXECUTABLE_PLACEHOLDER: &str = "{{AIPROXY_PATH}}";
const STDOUT_PLACEHOLDER: &str = "{{STDOUT_PATH}}";
const STDERR_PLACEHOLDER: &str = "{{STDERR_PATH}}";

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Could not find '{name}' executable on PATH")]
    ExecutableNotFound { name: String },

    #[error("{command} failed ({}): {stderr}", exit_label(*.code))]
    ServiceManager {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Service manifest not found at {}", .path.display())]
    ManifestMissing { path: PathBuf },

    #[error("IO error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Path(#[from] PathError),
}

pub type Result<T> = std::result::Result<T, ServiceError>;

fn exit_label(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "no exit code".to_string(),
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> ServiceError + '_ {
    move |source| ServiceError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Observable state of the LaunchAgent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    /// No manifest on disk
    Absent,
    /// Manifest present but not registered with launchd
    InstalledDisabled,
    /// Registered but not running
    InstalledEnabledStopped,
    Running,
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ServiceState::Absent => "not installed",
            ServiceState::InstalledDisabled => "installed, not loaded",
            ServiceState::InstalledEnabledStopped => "loaded, stopped",
            ServiceState::Running => "running",
        };
        f.write_str(s)
    }
}

/// Single lifecycle step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Create log dirs and write the rendered manifest
    WriteManifest,
    /// `launchctl bootstrap gui/<uid> <plist>`
    Bootstrap,
    /// `launchctl enable gui/<uid>/<label>`
    Enable,
    /// `launchctl kickstart -k gui/<uid>/<label>`
    Kickstart,
    /// `launchctl bootout gui/<uid>/<label>`
    Bootout,
    /// Delete the manifest file if present
    RemoveManifest,
}

/// What a failed step does to the rest of its transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnFailure {
    Warn,
    Fatal,
    /// Abandon the transition and run [`Transition::Recover`]
    Recover,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Install,
    Uninstall,
    Restart,
    /// Re-register an existing manifest, then start it
    Recover,
}

impl Transition {
    /// Ordered steps and their failure policies
    pub fn steps(self) -> &'static [(Step, OnFailure)] {
        match self {
            Transition::Install => &[
                (Step::WriteManifest, OnFailure::Fatal),
                (Step::Bootstrap, OnFailure::Warn),
                (Step::Enable, OnFailure::Warn),
                (Step::Kickstart, OnFailure::Fatal),
            ],
            Transition::Uninstall => &[
                (Step::Bootout, OnFailure::Warn),
                (Step::RemoveManifest, OnFailure::Fatal),
            ],
            Transition::Restart => &[(Step::Kickstart, OnFailure::Recover)],
            Transition::Recover => &[
                (Step::Bootstrap, OnFailure::Fatal),
                (Step::Enable, OnFailure::Warn),
                (Step::Kickstart, OnFailure::Fatal),
            ],
        }
    }

    /// State reached when every fatal step succeeds
    pub fn target(self) -> ServiceState {
        match self {
            Transition::Uninstall => ServiceState::Absent,
            Transition::Install | Transition::Restart | Transition::Recover => {
                ServiceState::Running
            }
        }
    }
}

/// Everything launchd needs to run the launcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescriptor {
    pub label: String,
    pub executable_path: PathBuf,
    pub stdout_log_path: PathBuf,
    pub stderr_log_path: PathBuf,
    pub manifest_path: PathBuf,
}

impl ServiceDescriptor {
    /// Substitute the template placeholders verbatim
    pub fn render_manifest(&self, template: &str) -> String {
        template
            .replace(
                EXECUTABLE_PLACEHOLDER,
                &self.executable_path.to_string_lossy(),
            )
            .replace(STDOUT_PLACEHOLDER, &self.stdout_log_path.to_string_lossy())
            .replace(STDERR_PLACEHOLDER, &self.stderr_log_path.to_string_lossy())
    }
}

/// Outcome of a completed transition
#[derive(Debug)]
pub struct TransitionReport {
    /// Transition that actually completed (`Recover` after a failed restart)
    pub transition: Transition,
    pub state: ServiceState,
    /// Failures downgraded by a `Warn` policy
    pub warnings: Vec<ServiceError>,
    /// Informational messages for the user
    pub notes: Vec<String>,
}

impl TransitionReport {
    fn new(transition: Transition) -> Self {
        Self {
            transition,
            state: transition.target(),
            warnings: Vec::new(),
            notes: Vec::new(),
        }
    }

    /// One-line outcome for the user
    pub fn summary(&self) -> &'static str {
        match self.transition {
            Transition::Install => "LaunchAgent installed, enabled, and started.",
            Transition::Uninstall => "LaunchAgent uninstalled.",
            Transition::Restart => "LaunchAgent restarted.",
            Transition::Recover => "LaunchAgent bootstrapped and restarted.",
        }
    }
}

#[cfg(unix)]
fn current_uid() -> u32 {
    nix::unistd::getuid().as_raw()
}

#[cfg(not(unix))]
fn current_uid() -> u32 {
    0
}

/// Get the per-user LaunchAgents directory
pub fn launch_agents_dir() -> paths::Result<PathBuf> {
    Ok(paths::home_dir()?.join("Library/LaunchAgents"))
}

/// Drives the LaunchAgent through its lifecycle
pub struct ServiceController<M = Launchctl> {
    manager: M,
    label: String,
    uid: u32,
    manifest_path: PathBuf,
    log_dir: PathBuf,
    search_path: Option<OsString>,
}

impl ServiceController<Launchctl> {
    /// Controller for the current user; fails without a home directory
    pub fn new() -> Result<Self> {
        Ok(Self::with_manager(
            Launchctl,
            launch_agents_dir()?,
            paths::app_log_dir()?,
        ))
    }
}

impl<M: ServiceManager> ServiceController<M> {
    pub fn with_manager(manager: M, manifest_dir: PathBuf, log_dir: PathBuf) -> Self {
        Self {
            manager,
            label: SERVICE_LABEL.to_string(),
            uid: current_uid(),
            manifest_path: manifest_dir.join(format!("{}.plist", SERVICE_LABEL)),
            log_dir,
            search_path: None,
        }
    }

    /// Search this `PATH`-style list instead of the process `PATH`
    pub fn with_search_path(mut self, search_path: impl Into<OsString>) -> Self {
        self.search_path = Some(search_path.into());
        self
    }

    pub fn manifest_path(&self) -> &Path {
        &self.manifest_path
    }

    fn domain(&self) -> String {
        format!("gui/{}", self.uid)
    }

    fn service_target(&self) -> String {
        format!("gui/{}/{}", self.uid, self.label)
    }

    fn locate_executable(&self) -> Result<PathBuf> {
        let search_path = self
            .search_path
            .clone()
            .or_else(|| std::env::var_os("PATH"))
            .unwrap_or_default();
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let found = which::which_in(EXECUTABLE_NAME, Some(search_path), &cwd).map_err(|e| {
            log::debug!("Executable lookup failed: {}", e);
            ServiceError::ExecutableNotFound {
                name: EXECUTABLE_NAME.to_string(),
            }
        })?;
        Ok(std::path::absolute(&found).unwrap_or(found))
    }

    /// Describe the service for the executable currently on `PATH`
    pub fn descriptor(&self) -> Result<ServiceDescriptor> {
        let executable_path = self.locate_executable()?;
        Ok(ServiceDescriptor {
            label: self.label.clone(),
            executable_path,
            stdout_log_path: self.log_dir.join("aiproxy.launchd.out.log"),
            stderr_log_path: self.log_dir.join("aiproxy.launchd.err.log"),
            manifest_path: self.manifest_path.clone(),
        })
    }

    /// `Absent` → `Running`
    pub fn install(&self) -> Result<TransitionReport> {
        let descriptor = self.descriptor()?;
        log::info!("Found {} at {}", EXECUTABLE_NAME, descriptor.executable_path.display());
        self.apply(Transition::Install, Some(&descriptor))
    }

    /// Any state → `Absent`
    pub fn uninstall(&self) -> Result<TransitionReport> {
        self.apply(Transition::Uninstall, None)
    }

    /// Force a restart, re-registering the existing manifest if needed
    pub fn restart(&self) -> Result<TransitionReport> {
        self.apply(Transition::Restart, None)
    }

    pub fn status(&self) -> Result<ServiceState> {
        if !self.manifest_path.exists() {
            return Ok(ServiceState::Absent);
        }
        let output = self.invoke(&["print".to_string(), self.service_target()])?;
        if !output.success() {
            return Ok(ServiceState::InstalledDisabled);
        }
        if output.stdout.contains("state = running") {
            Ok(ServiceState::Running)
        } else {
            Ok(ServiceState::InstalledEnabledStopped)
        }
    }

    fn apply(
        &self,
        transition: Transition,
        descriptor: Option<&ServiceDescriptor>,
    ) -> Result<TransitionReport> {
        let mut report = TransitionReport::new(transition);

        for &(step, policy) in transition.steps() {
            let err = match self.run_step(step, descriptor, &mut report) {
                Ok(()) => continue,
                Err(e) => e,
            };
            match policy {
                OnFailure::Warn => {
                    log::warn!("{:?} failed: {}", step, err);
                    report.warnings.push(err);
                }
                OnFailure::Fatal => {
                    log::error!("{:?} failed: {}", step, err);
                    return Err(err);
                }
                OnFailure::Recover => {
                    log::info!("{:?} failed ({}), re-registering service", step, err);
                    if !self.manifest_path.exists() {
                        return Err(ServiceError::ManifestMissing {
                            path: self.manifest_path.clone(),
                        });
                    }
                    return self.apply(Transition::Recover, descriptor);
                }
            }
        }

        Ok(report)
    }

    fn run_step(
        &self,
        step: Step,
        descriptor: Option<&ServiceDescriptor>,
        report: &mut TransitionReport,
    ) -> Result<()> {
        match step {
            Step::WriteManifest => {
                let descriptor = descriptor.ok_or_else(|| ServiceError::ExecutableNotFound {
                    name: EXECUTABLE_NAME.to_string(),
                })?;
                self.write_manifest(descriptor)?;
                report
                    .notes
                    .push(format!("Created LaunchAgent plist at {}", descriptor.manifest_path.display()));
                Ok(())
            }
            Step::Bootstrap => self.launchctl(&[
                "bootstrap".to_string(),
                self.domain(),
                self.manifest_path.to_string_lossy().to_string(),
            ]),
            Step::Enable => self.launchctl(&["enable".to_string(), self.service_target()]),
            Step::Kickstart => self.launchctl(&[
                "kickstart".to_string(),
                "-k".to_string(),
                self.service_target(),
            ]),
            Step::Bootout => self.launchctl(&["bootout".to_string(), self.service_target()]),
            Step::RemoveManifest => {
                if !self.manifest_path.exists() {
                    report
                        .notes
                        .push("LaunchAgent plist not found; nothing to remove.".to_string());
                    return Ok(());
                }
                std::fs::remove_file(&self.manifest_path).map_err(io_error(&self.manifest_path))?;
                report
                    .notes
                    .push(format!("Removed LaunchAgent plist at {}", self.manifest_path.display()));
                Ok(())
            }
        }
    }

    fn write_manifest(&self, descriptor: &ServiceDescriptor) -> Result<()> {
        for log_path in [&descriptor.stdout_log_path, &descriptor.stderr_log_path] {
            if let Some(dir) = log_path.parent() {
                std::fs::create_dir_all(dir).map_err(io_error(dir))?;
            }
        }
        if let Some(dir) = descriptor.manifest_path.parent() {
            std::fs::create_dir_all(dir).map_err(io_error(dir))?;
        }
        let content = descriptor.render_manifest(MANIFEST_TEMPLATE);
        std::fs::write(&descriptor.manifest_path, content)
            .map_err(io_error(&descriptor.manifest_path))
    }

    /// Run a subcommand, capturing its output
    fn invoke(&self, args: &[String]) -> Result<CommandOutput> {
        self.manager.run(args).map_err(|e| ServiceError::ServiceManager {
            command: self.command_line(args),
            code: None,
            stderr: e.to_string(),
        })
    }

    /// Run a subcommand; a non-zero exit is an error carrying its output
    fn launchctl(&self, args: &[String]) -> Result<()> {
        let output = self.invoke(args)?;
        if output.success() {
            return Ok(());
        }
        Err(ServiceError::ServiceManager {
            command: self.command_line(args),
            code: output.code,
            stderr: output.error_text(),
        })
    }

    fn command_line(&self, args: &[String]) -> String {
        format!("{} {}", self.manager.program(), args.join(" "))
    }
}
