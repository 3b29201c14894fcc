//! CLI argument parsing.

use std::io;
use std::path::PathBuf;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Configuration from CLI arguments
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CliConfig {
    pub config_path: Option<PathBuf>,
    pub host: Option<String>,
    pub user: Option<String>,
    pub port: Option<u16>,
    pub timed: bool,
    pub print_config: bool,
    pub verbose: u8,
    pub log_json: bool,
}

/// What the command line asks for
#[derive(Debug, PartialEq, Eq)]
pub enum CliAction {
    Run(CliConfig),
    Help,
    Version,
}

/// Print usage information
pub fn print_usage() {
    eprintln!("remote-deploy - rebuild and restart the web app over ssh");
    eprintln!();
    eprintln!("Usage: remote-deploy [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -c, --config <PATH>   Config file (default: ./deploy.json, then");
    eprintln!("                        ~/.config/remote-deploy/deploy.json)");
    eprintln!("      --host <HOST>     Override the remote host");
    eprintln!("      --user <USER>     Override the remote user");
    eprintln!("  -p, --port <PORT>     Override the ssh port");
    eprintln!("      --timed           Use fixed delays instead of waiting for the prompt");
    eprintln!("      --print-config    Print the effective config and exit");
    eprintln!("  -v, --verbose         More logging on stderr (repeat for more)");
    eprintln!("      --log-json        Log as JSON lines");
    eprintln!("  -h, --help            Show this help message");
    eprintln!("  -V, --version         Show version");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  DEPLOY_HOST, DEPLOY_USER, DEPLOY_PASSWORD override the config file.");
    eprintln!("  RUST_LOG overrides the log filter.");
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  remote-deploy                          # Deploy with ./deploy.json");
    eprintln!("  remote-deploy --host 10.0.0.5 -v       # Different host, info logs");
    eprintln!("  remote-deploy --timed                  # Fixed 2s / 500ms pacing");
}

/// Parse the process arguments
pub fn parse_args() -> io::Result<CliAction> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    parse_args_from(&args)
}

/// Parse arguments, excluding the program name
pub fn parse_args_from(args: &[String]) -> io::Result<CliAction> {
    let mut config = CliConfig::default();

    let mut i = 0;
    while i < args.len() {
        let arg = args[i].as_str();
        match arg {
            "-h" | "--help" => return Ok(CliAction::Help),
            "-V" | "--version" => return Ok(CliAction::Version),
            "--timed" => config.timed = true,
            "--print-config" => config.print_config = true,
            "--log-json" => config.log_json = true,
            "-v" | "--verbose" => config.verbose = config.verbose.saturating_add(1),
            "-c" | "--config" => {
                i += 1;
                config.config_path = Some(PathBuf::from(value_for(args, i, arg)?));
            }
            "--host" => {
                i += 1;
                config.host = Some(value_for(args, i, arg)?.to_string());
            }
            "--user" => {
                i += 1;
                config.user = Some(value_for(args, i, arg)?.to_string());
            }
            "-p" | "--port" => {
                i += 1;
                let value = value_for(args, i, arg)?;
                let port = value.parse::<u16>().ok().filter(|p| *p != 0).ok_or_else(|| {
                    io::Error::new(
                        io::ErrorKind::InvalidInput,
                        format!("Invalid port value: {}", value),
                    )
                })?;
                config.port = Some(port);
            }
            // -vv, -vvv
            _ if arg.len() > 2 && arg.starts_with('-') && arg[1..].chars().all(|c| c == 'v') => {
                let count = u8::try_from(arg.len() - 1).unwrap_or(u8::MAX);
                config.verbose = config.verbose.saturating_add(count);
            }
            _ => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("Unknown argument: {}", arg),
                ));
            }
        }
        i += 1;
    }

    Ok(CliAction::Run(config))
}

fn value_for<'a>(args: &'a [String], i: usize, flag: &str) -> io::Result<&'a str> {
    args.get(i).map(String::as_str).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("Missing value for {}", flag),
        )
    })
}
