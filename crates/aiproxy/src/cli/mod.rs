//! Command-line interface for aiproxy

pub mod profiles;

use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};

use argh::FromArgs;

use crate::config;
use crate::paths;
use crate::profile::ProfileRequest;

/// AI proxy server launcher
#[derive(FromArgs, Debug, Default, PartialEq)]
pub struct Args {
    /// path to config file (default: AIPROXY_CONFIG or the user config dir)
    #[argh(option)]
    pub config: Option<String>,

    /// show version and exit
    #[argh(switch, short = 'V')]
    pub version: bool,

    /// print the absolute path of the config directory
    #[argh(switch)]
    pub config_dir: bool,

    /// profile to use (overrides the default profile)
    #[argh(option)]
    pub profile: Option<String>,

    /// list all available profiles
    #[argh(switch)]
    pub list_profiles: bool,

    /// show the current default profile
    #[argh(switch)]
    pub get_default: bool,

    /// set the default profile
    #[argh(option)]
    pub set_default: Option<String>,

    /// override host from profile
    #[argh(option)]
    pub host: Option<String>,

    /// override port from profile
    #[argh(option)]
    pub port: Option<u16>,

    /// open the config file in $VISUAL or $EDITOR
    #[argh(switch)]
    pub edit: bool,

    /// install and start the launchd service
    #[argh(switch)]
    pub install_service: bool,

    /// stop and remove the launchd service
    #[argh(switch)]
    pub uninstall_service: bool,

    /// restart the launchd service
    #[argh(switch)]
    pub restart_service: bool,

    /// show the launchd service state
    #[argh(switch)]
    pub service_status: bool,

    /// enable debug logging
    #[argh(switch, short = 'v')]
    pub verbose: bool,
}

impl Args {
    /// Config file path and whether it was given explicitly
    pub fn config_path(&self) -> paths::Result<(PathBuf, bool)> {
        match &self.config {
            Some(path) => Ok((paths::expand_path(path)?, true)),
            None => Ok((config::locate_default_path()?, false)),
        }
    }

    pub fn profile_request(&self) -> ProfileRequest {
        ProfileRequest {
            name: self.profile.clone(),
            host: self.host.clone(),
            port: self.port,
        }
    }

    /// Whether any service lifecycle flag was given
    pub fn wants_service(&self) -> bool {
        self.install_service || self.uninstall_service || self.restart_service || self.service_status
    }
}

/// Editor command from `VISUAL`, then `EDITOR`, else `vi`
pub fn editor_command() -> String {
    ["VISUAL", "EDITOR"]
        .into_iter()
        .filter_map(|key| std::env::var(key).ok())
        .find(|value| !value.trim().is_empty())
        .unwrap_or_else(|| "vi".to_string())
}

/// Open `path` in `editor`, which may carry its own arguments (e.g. `code -w`)
pub fn open_in_editor(editor: &str, path: &Path) -> std::io::Result<ExitStatus> {
    let mut parts = editor.split_whitespace();
    let program = parts.next().unwrap_or("vi");
    Command::new(program).args(parts).arg(path).status()
}
