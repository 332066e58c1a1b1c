//! Invocation of the OS service manager.

use std::process::Command;

/// Captured result of one service-manager call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when terminated by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Most useful error text: stderr, else stdout
    pub fn error_text(&self) -> String {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim().to_string()
        } else {
            stderr.to_string()
        }
    }
}

/// Runs service-manager subcommands synchronously
pub trait ServiceManager {
    /// Program name used in diagnostics
    fn program(&self) -> &str;

    fn run(&self, args: &[String]) -> std::io::Result<CommandOutput>;
}

/// macOS `launchctl`
#[derive(Debug, Clone, Copy, Default)]
pub struct Launchctl;

impl ServiceManager for Launchctl {
    fn program(&self) -> &str {
        "launchctl"
    }

    fn run(&self, args: &[String]) -> std::io::Result<CommandOutput> {
        log::debug!("Running: launchctl {}", args.join(" "));
        let output = Command::new("launchctl").args(args).output()?;
        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}
