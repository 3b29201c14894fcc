mod cli;
mod config;
mod driver;
mod error;
mod logging;
mod models;
mod pty;
mod utils;

use std::io::{self, IsTerminal};
use std::process::ExitCode;

use crossterm::style::Stylize;
use tracing::{error, info};

use crate::cli::{CliAction, CliConfig};
use crate::config::{DeployConfig, CONFIG_FILE_NAME, ENV_PASSWORD};
use crate::driver::{DeployReport, TerminalDriver};
use crate::error::{DeployError, Result};
use crate::models::SyncMode;
use crate::pty::{OutputStream, RemoteChild, Session};
use crate::utils::format_duration;

/// Exit status when the completion marker was seen
const EXIT_COMPLETE: u8 = 0;
/// Exit status when the session ended without the completion marker
const EXIT_INCOMPLETE: u8 = 1;
/// Exit status for configuration, spawn and session errors
const EXIT_FAILED: u8 = 2;

fn main() -> ExitCode {
    let cli = match cli::parse_args() {
        Ok(CliAction::Run(cli)) => cli,
        Ok(CliAction::Help) => {
            cli::print_usage();
            return ExitCode::SUCCESS;
        }
        Ok(CliAction::Version) => {
            println!("remote-deploy {}", cli::VERSION);
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            cli::print_usage();
            eprintln!();
            eprintln!("{} {}", "error:".red().bold(), e);
            return ExitCode::from(EXIT_FAILED);
        }
    };

    logging::init_logging(logging::level_for_verbosity(cli.verbose), cli.log_json);

    ExitCode::from(exit_status(&run(&cli)))
}

fn exit_status(outcome: &Result<Option<DeployReport>>) -> u8 {
    match outcome {
        Ok(None) => EXIT_COMPLETE,
        Ok(Some(report)) => summarize(report),
        Err(e) => {
            error!(error = %e, "deployment failed");
            eprintln!("{} {}", "✗ Deployment failed:".red().bold(), e);
            EXIT_FAILED
        }
    }
}

/// Returns `None` when there was nothing to deploy (`--print-config`)
fn run(cli: &CliConfig) -> Result<Option<DeployReport>> {
    let config = load_config(cli, |key| std::env::var(key).ok())?;

    if cli.print_config {
        println!("{}", config.to_redacted_json()?);
        return Ok(None);
    }

    let password = resolve_password(&config)?;
    eprintln!(
        "{} {} ({} sync, {} commands)",
        "→ Deploying to".cyan().bold(),
        config.destination(),
        config.sync_mode.label(),
        config.command_script().len()
    );
    deploy(&config, password).map(Some)
}

/// Config file, then environment, then command-line overrides
fn load_config<F: Fn(&str) -> Option<String>>(cli: &CliConfig, env: F) -> Result<DeployConfig> {
    let mut config = DeployConfig::resolve(cli.config_path.as_deref())?;
    config.apply_env_from(env);

    if let Some(host) = &cli.host {
        config.host = host.clone();
    }
    if let Some(user) = &cli.user {
        config.user = user.clone();
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if cli.timed {
        config.sync_mode = SyncMode::Timed;
    }

    config.validate()?;
    Ok(config)
}

fn resolve_password(config: &DeployConfig) -> Result<String> {
    if let Some(password) = &config.password {
        return Ok(password.clone());
    }
    if io::stdin().is_terminal() {
        return cli::prompt_password(&config.destination())
            .map_err(|e| DeployError::Config(format!("no password entered: {e}")));
    }
    Err(DeployError::Config(format!(
        "no password configured; set {} or \"password\" in {}",
        ENV_PASSWORD, CONFIG_FILE_NAME
    )))
}

fn deploy(config: &DeployConfig, password: String) -> Result<DeployReport> {
    let Session {
        mut child,
        master_pty,
        reader,
        pty_writer,
    } = pty::spawn_session(config)?;

    let stream = match OutputStream::spawn(reader) {
        Ok(stream) => stream,
        Err(e) => {
            let _ = child.terminate();
            let _ = child.wait_exit();
            return Err(DeployError::Spawn(format!("pty reader thread: {e}")));
        }
    };

    info!(
        destination = %config.destination(),
        sync_mode = config.sync_mode.label(),
        "session established"
    );
    let report = TerminalDriver::new(config, password, stream, pty_writer, io::stdout().lock())
        .run(&mut child);
    drop(master_pty);
    report
}

fn summarize(report: &DeployReport) -> u8 {
    let elapsed = format_duration(report.elapsed);
    let exit_code = report
        .exit_code
        .map_or_else(|| "unknown".to_string(), |code| code.to_string());

    if report.completed {
        eprintln!(
            "{} in {} (ssh exit status {})",
            "✓ Deployment complete".green().bold(),
            elapsed,
            exit_code
        );
        return EXIT_COMPLETE;
    }

    let reason = if report.credential_sent {
        format!("{} of the commands were sent", report.commands_sent)
    } else {
        "the password prompt never appeared".to_string()
    };
    eprintln!(
        "{} session ended after {} without the completion marker; {} (ssh exit status {})",
        "⚠ Deployment incomplete:".yellow().bold(),
        elapsed,
        reason,
        exit_code
    );
    EXIT_INCOMPLETE
}
