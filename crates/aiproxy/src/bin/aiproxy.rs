//! aiproxy CLI
//!
//! Usage:
//!   aiproxy                              # Start the default profile
//!   aiproxy --profile prod --port 9000   # Start a profile with overrides
//!   aiproxy --list-profiles              # List profiles
//!   aiproxy --set-default dev            # Change the default profile
//!   aiproxy --config-dir                 # Print the config directory
//!   aiproxy --install-service            # Run as a launchd service

use std::process::ExitCode;

use aiproxy::cli::{self, profiles, Args};
use aiproxy::config::{self, ConfigDocument};
use aiproxy::launcher::{self, LaunchError};
use aiproxy::service::{ServiceController, TransitionReport, SERVICE_LABEL};
use aiproxy::{paths, Error};
use tokio::sync::watch;

fn print_report(report: &TransitionReport) {
    for note in &report.notes {
        println!("{}", note);
    }
    if !report.warnings.is_empty() {
        println!(
            "Completed with {} warning{}",
            report.warnings.len(),
            if report.warnings.len() == 1 { "" } else { "s" }
        );
    }
    println!("{}", report.summary());
}

fn run_service_command(args: &Args) -> aiproxy::Result<()> {
    let controller = ServiceController::new()?;

    if args.install_service {
        print_report(&controller.install()?);
    } else if args.uninstall_service {
        print_report(&controller.uninstall()?);
    } else if args.restart_service {
        print_report(&controller.restart()?);
    } else if args.service_status {
        println!("{}: {}", SERVICE_LABEL, controller.status()?);
    }
    Ok(())
}

async fn run(args: Args) -> aiproxy::Result<()> {
    if args.version {
        println!("aiproxy {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    if args.config_dir {
        let (config_path, _) = args.config_path()?;
        println!("{}", paths::config_dir_of(&config_path).display());
        return Ok(());
    }

    if args.wants_service() {
        return run_service_command(&args);
    }

    let (config_path, explicit) = args.config_path()?;

    // First-run bootstrap only applies to the default location
    if !explicit {
        let created = config::ensure_exists(&config_path);
        for path in created.config.iter().chain(created.example.iter()) {
            println!("Created {}", path.display());
        }
    }

    if args.edit {
        let editor = cli::editor_command();
        return match cli::open_in_editor(&editor, &config_path) {
            Ok(status) if status.success() => Ok(()),
            Ok(status) => Err(Error::Editor {
                editor,
                source: std::io::Error::other(format!("exited with {}", status)),
            }),
            Err(source) => Err(Error::Editor { editor, source }),
        };
    }

    let doc = ConfigDocument::load(&config_path)?;

    if args.list_profiles {
        profiles::list_profiles(&doc);
        return Ok(());
    }

    if args.get_default {
        profiles::get_default(&doc);
        return Ok(());
    }

    if let Some(name) = &args.set_default {
        return profiles::set_default(&config_path, name);
    }

    let plan = launcher::plan(&doc, &config_path, &args.profile_request())?;
    plan.log_summary();

    let (shutdown_tx, shutdown_rx) = watch::channel(());
    ctrlc::set_handler(move || {
        log::info!("Received Ctrl+C, initiating shutdown...");
        let _ = shutdown_tx.send(());
    })
    .map_err(LaunchError::from)?;

    launcher::run(&plan, &launcher::server_program(), shutdown_rx).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args: Args = argh::from_env();

    aiproxy::logging::init(args.verbose);

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            for hint in e.hints() {
                eprintln!("{}", hint);
            }
            ExitCode::FAILURE
        }
    }
}
