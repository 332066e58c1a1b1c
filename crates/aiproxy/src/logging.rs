//! Logger setup.
//!
//! Records go to stderr and are appended to `aiproxy.log` in the per-user
//! log directory. When the log file cannot be opened the launcher keeps
//! running with stderr only.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::paths;

pub const LOG_FILE_NAME: &str = "aiproxy.log";

/// Writes every record to two sinks
pub struct Tee<A, B> {
    primary: A,
    secondary: B,
}

impl<A: Write, B: Write> Tee<A, B> {
    pub fn new(primary: A, secondary: B) -> Self {
        Self { primary, secondary }
    }
}

impl<A: Write, B: Write> Write for Tee<A, B> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.primary.write_all(buf)?;
        // A failing log file must not silence the console
        let _ = self.secondary.write_all(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.primary.flush()?;
        let _ = self.secondary.flush();
        Ok(())
    }
}

/// Open `<dir>/aiproxy.log` for appending, creating the directory if needed
pub fn open_log_file(dir: &Path) -> io::Result<(File, PathBuf)> {
    fs::create_dir_all(dir)?;
    let path = dir.join(LOG_FILE_NAME);
    let file = OpenOptions::new().create(true).append(true).open(&path)?;
    Ok((file, path))
}

/// Install the global logger; `verbose` lowers the default filter to debug
pub fn init(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level));

    let log_file = paths::app_log_dir()
        .map_err(|e| e.to_string())
        .and_then(|dir| {
            open_log_file(&dir)
                .map_err(|e| format!("{}: {}", dir.join(LOG_FILE_NAME).display(), e))
        });

    match log_file {
        Ok((file, path)) => {
            builder.target(env_logger::Target::Pipe(Box::new(Tee::new(io::stderr(), file))));
            builder.init();
            log::debug!("Logging to {}", path.display());
        }
        Err(reason) => {
            builder.target(env_logger::Target::Stderr);
            builder.init();
            log::warn!("File logging disabled: {}", reason);
        }
    }
}
