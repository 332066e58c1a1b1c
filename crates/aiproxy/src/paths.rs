//! Platform directories and secondary config path resolution.
//!
//! A profile's `litellm-config` may be absolute or relative. Relative names are
//! searched in order:
//! 1. the directory containing the main config file (colocated layouts)
//! 2. the per-user aiproxy data directory (packaged installs)

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Directory name used under every platform base directory
pub const APP_NAME: &str = "aiproxy";

#[derive(Debug, Error)]
pub enum PathError {
    #[error("LiteLLM config file '{filename}' not found (tried: {})", join_paths(.candidates))]
    ConfigFileNotFound {
        filename: String,
        candidates: Vec<PathBuf>,
    },
    #[error("Could not determine the home directory")]
    NoHomeDirectory,
    #[error("Could not expand path '{path}': {reason}")]
    Expand { path: String, reason: String },
}

pub type Result<T> = std::result::Result<T, PathError>;

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn home_dir() -> Result<PathBuf> {
    dirs::home_dir().ok_or(PathError::NoHomeDirectory)
}

/// Per-user configuration directory (e.g. `~/.config/aiproxy`)
pub fn app_config_dir() -> Result<PathBuf> {
    let base = dirs::config_dir().ok_or(PathError::NoHomeDirectory)?;
    Ok(base.join(APP_NAME))
}

/// Per-user data directory, searched for relative LiteLLM configs
pub fn app_data_dir() -> Result<PathBuf> {
    let base = dirs::data_dir().ok_or(PathError::NoHomeDirectory)?;
    Ok(base.join(APP_NAME))
}

/// Per-user log directory for the launcher and the background service
pub fn app_log_dir() -> Result<PathBuf> {
    if cfg!(target_os = "macos") {
        return Ok(home_dir()?.join("Library/Logs").join(APP_NAME));
    }
    let base = dirs::state_dir()
        .or_else(dirs::data_dir)
        .ok_or(PathError::NoHomeDirectory)?;
    Ok(base.join(APP_NAME).join("logs"))
}

/// Expand `~` and `$VAR`/`${VAR}` references in a user-supplied path.
///
/// Unset variables and a missing home directory are errors rather than
/// literal path components.
pub fn expand_path(path: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full(path).map_err(|e| PathError::Expand {
        path: path.to_string(),
        reason: e.to_string(),
    })?;
    if expanded == "~" || expanded.starts_with("~/") {
        return Err(PathError::Expand {
            path: path.to_string(),
            reason: PathError::NoHomeDirectory.to_string(),
        });
    }
    Ok(PathBuf::from(expanded.as_ref()))
}

/// Absolute directory containing `config_path`.
///
/// Symlinks are resolved when the directory exists so that relative lookups
/// follow the real file location.
pub fn config_dir_of(config_path: &Path) -> PathBuf {
    let absolute =
        std::path::absolute(config_path).unwrap_or_else(|_| config_path.to_path_buf());
    let parent = absolute
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("/"));
    parent.canonicalize().unwrap_or(parent)
}

/// Candidate locations for `filename`, in lookup order
pub fn candidates(filename: &str, config_dir: &Path, data_dir: &Path) -> Vec<PathBuf> {
    let path = Path::new(filename);
    if path.is_absolute() {
        return vec![path.to_path_buf()];
    }
    vec![config_dir.join(path), data_dir.join(path)]
}

/// Resolve a profile's LiteLLM config filename to an existing absolute path
pub fn resolve_secondary_config(
    filename: &str,
    config_dir: &Path,
    data_dir: &Path,
) -> Result<PathBuf> {
    let tried = candidates(filename, config_dir, data_dir);
    for candidate in &tried {
        log::debug!("Checking LiteLLM config candidate {}", candidate.display());
        if candidate.is_file() {
            return Ok(candidate.clone());
        }
    }
    Err(PathError::ConfigFileNotFound {
        filename: filename.to_string(),
        candidates: tried,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, "model_list: []\n").unwrap();
    }

    #[test]
    fn test_absolute_path_used_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("elsewhere/router.yaml");
        touch(&file);
        // Same name exists beside the config, but the absolute path wins.
        touch(&dir.path().join("cfg/router.yaml"));

        let resolved = resolve_secondary_config(
            file.to_str().unwrap(),
            &dir.path().join("cfg"),
            &dir.path().join("data"),
        )
        .unwrap();
        assert_eq!(resolved, file);
    }

    #[test]
    fn test_absolute_path_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.yaml");

        let err = resolve_secondary_config(
            missing.to_str().unwrap(),
            dir.path(),
            dir.path(),
        )
        .unwrap_err();
        let candidates = match err {
            PathError::ConfigFileNotFound { candidates, .. } => candidates,
            other => panic!("unexpected error: {other}"),
        };
        assert_eq!(candidates, vec![missing]);
    }

    #[test]
    fn test_config_dir_preferred_over_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config_dir = dir.path().join("cfg");
        let data_dir = dir.path().join("data");
        touch(&config_dir.join("r.yaml"));
        touch(&data_dir.join("r.yaml"));

        let resolved = resolve_secondary_config("r.yaml", &config_dir, &data_dir).unwrap();
        assert_eq!(resolved, config_dir.join("r.yaml"));
    }

    #[test]
    fn test_falls_back_to_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config_dir = dir.path().join("cfg");
        let data_dir = dir.path().join("data");
        touch(&data_dir.join("r.yaml"));

        let resolved = resolve_secondary_config("r.yaml", &config_dir, &data_dir).unwrap();
        assert_eq!(resolved, data_dir.join("r.yaml"));
    }

    #[test]
    fn test_not_found_lists_every_candidate() {
        let dir = tempfile::tempdir().unwrap();
        let config_dir = dir.path().join("cfg");
        let data_dir = dir.path().join("data");

        let err = resolve_secondary_config("r.yaml", &config_dir, &data_dir).unwrap_err();
        let message = err.to_string();
        let PathError::ConfigFileNotFound {
            filename,
            candidates,
        } = err
        else {
            panic!("unexpected error: {message}");
        };
        assert_eq!(filename, "r.yaml");
        assert_eq!(
            candidates,
            vec![config_dir.join("r.yaml"), data_dir.join("r.yaml")]
        );
        assert!(message.contains("cfg"));
        assert!(message.contains("data"));
    }

    #[test]
    fn test_directory_is_not_a_config_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("r.yaml")).unwrap();

        assert!(resolve_secondary_config("r.yaml", dir.path(), dir.path()).is_err());
    }

    #[test]
    fn test_config_dir_of_relative_path_is_absolute() {
        let dir = config_dir_of(Path::new("some/where/config.yaml"));
        assert!(dir.is_absolute());
        assert!(dir.ends_with("some/where"));
    }

    #[test]
    fn test_expand_path_tilde() {
        let home = dirs::home_dir().unwrap();
        assert_eq!(expand_path("~/x/config.yaml").unwrap(), home.join("x/config.yaml"));
        assert_eq!(expand_path("~").unwrap(), home);
        assert_eq!(
            expand_path("/etc/aiproxy.yaml").unwrap(),
            PathBuf::from("/etc/aiproxy.yaml")
        );
        assert_eq!(expand_path("rel.yaml").unwrap(), PathBuf::from("rel.yaml"));
    }

    #[test]
    fn test_expand_path_env_vars() {
        let home = std::env::var("HOME").unwrap();
        assert_eq!(
            expand_path("$HOME/cfg.yaml").unwrap(),
            Path::new(&home).join("cfg.yaml")
        );
        assert_eq!(
            expand_path("${HOME}/cfg.yaml").unwrap(),
            Path::new(&home).join("cfg.yaml")
        );
    }

    #[test]
    fn test_expand_path_unset_var_is_an_error() {
        let err = expand_path("$AIPROXY_UNSET_FOR_TESTS/config.yaml").unwrap_err();
        assert!(matches!(err, PathError::Expand { ref path, .. } if path.starts_with("$AIPROXY")));
        assert!(err.to_string().contains("AIPROXY_UNSET_FOR_TESTS"));
    }

    #[test]
    fn test_app_dirs_are_namespaced() {
        assert!(app_config_dir().unwrap().ends_with(APP_NAME));
        assert!(app_data_dir().unwrap().ends_with(APP_NAME));
        assert!(app_log_dir().unwrap().to_string_lossy().contains(APP_NAME));
    }
}
