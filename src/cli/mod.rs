//! CLI argument parsing and user prompts for remote-deploy.

mod args;
mod prompts;

pub use args::{parse_args, print_usage, CliAction, CliConfig, VERSION};
pub use prompts::prompt_password;
