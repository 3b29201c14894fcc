//! Deployment configuration.
//!
//! Values come from, in increasing priority: built-in defaults, a JSON
//! config file, `DEPLOY_*` environment variables and command-line flags.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{DeployError, Result};
use crate::models::{CommandScript, SyncMode};

/// Name of the config file looked up in the working directory and in
/// `~/.config/remote-deploy/`
pub const CONFIG_FILE_NAME: &str = "deploy.json";

pub const ENV_HOST: &str = "DEPLOY_HOST";
pub const ENV_USER: &str = "DEPLOY_USER";
pub const ENV_PASSWORD: &str = "DEPLOY_PASSWORD";

/// Everything the driver needs to know about the target and the script
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeployConfig {
    pub host: String,
    pub user: String,
    pub port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Extra arguments placed before the destination
    pub ssh_options: Vec<String>,
    /// Substring that identifies the password prompt
    pub password_prompt: String,
    /// Suffixes of a ready shell prompt line
    pub shell_prompts: Vec<String>,
    /// Line printed by the last command on success
    pub completion_marker: String,
    /// Explicit command list; takes precedence over `script`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commands: Option<Vec<String>>,
    /// Script text, one command per line
    pub script: String,
    pub sync_mode: SyncMode,
    pub settle_delay_ms: u64,
    pub command_delay_ms: u64,
    pub auth_timeout_secs: u64,
    pub prompt_timeout_secs: u64,
    pub pty_rows: u16,
    pub pty_cols: u16,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            host: "217.60.254.141".to_string(),
            user: "root".to_string(),
            port: 22,
            password: None,
            ssh_options: vec!["-o".to_string(), "StrictHostKeyChecking=no".to_string()],
            password_prompt: "assword:".to_string(),
            shell_prompts: vec!["$ ".to_string(), "# ".to_string()],
            completion_marker: "DEPLOYMENT COMPLETE!".to_string(),
            commands: None,
            script: crate::models::script::EMBEDDED_SCRIPT.to_string(),
            sync_mode: SyncMode::Prompt,
            settle_delay_ms: 2000,
            command_delay_ms: 500,
            auth_timeout_secs: 30,
            prompt_timeout_secs: 1800,
            pty_rows: 24,
            pty_cols: 80,
        }
    }
}

impl DeployConfig {
    /// Load a config file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            DeployError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&content).map_err(|source| DeployError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load from the explicit path if given, else the first file found by
    /// `find_config_file`, else defaults.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            info!(path = %path.display(), "loading config");
            return Self::load(path);
        }
        match find_config_file(Path::new(""), dirs::home_dir().as_deref()) {
            Some(path) => {
                info!(path = %path.display(), "loading config");
                Self::load(&path)
            }
            None => {
                debug!("no config file found, using built-in defaults");
                Ok(Self::default())
            }
        }
    }

    /// Apply `DEPLOY_HOST`, `DEPLOY_USER` and `DEPLOY_PASSWORD` as returned
    /// by `lookup`. Empty values are ignored.
    pub fn apply_env_from<F: Fn(&str) -> Option<String>>(&mut self, lookup: F) {
        if let Some(host) = lookup(ENV_HOST).filter(|v| !v.is_empty()) {
            self.host = host;
        }
        if let Some(user) = lookup(ENV_USER).filter(|v| !v.is_empty()) {
            self.user = user;
        }
        if let Some(password) = lookup(ENV_PASSWORD).filter(|v| !v.is_empty()) {
            self.password = Some(password);
        }
    }

    /// `user@host` as passed to ssh
    pub fn destination(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }

    pub fn command_script(&self) -> CommandScript {
        match &self.commands {
            Some(commands) => CommandScript::from_lines(commands.iter().cloned()),
            None => CommandScript::parse(&self.script),
        }
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn command_delay(&self) -> Duration {
        Duration::from_millis(self.command_delay_ms)
    }

    pub fn auth_timeout(&self) -> Duration {
        Duration::from_secs(self.auth_timeout_secs)
    }

    pub fn prompt_timeout(&self) -> Duration {
        Duration::from_secs(self.prompt_timeout_secs)
    }

    /// Check the config is usable. The password is checked separately since
    /// it may still be prompted for.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(DeployError::Config("host is empty".into()));
        }
        if self.user.trim().is_empty() {
            return Err(DeployError::Config("user is empty".into()));
        }
        if self.password_prompt.is_empty() {
            return Err(DeployError::Config("passwordPrompt is empty".into()));
        }
        if self.command_script().is_empty() {
            return Err(DeployError::Config("command script is empty".into()));
        }
        if self.sync_mode == SyncMode::Prompt
            && self.shell_prompts.iter().all(|p| p.is_empty())
        {
            return Err(DeployError::Config(
                "prompt sync mode needs at least one non-empty shellPrompts entry".into(),
            ));
        }
        Ok(())
    }

    /// Pretty JSON with the password replaced, for `--print-config`
    pub fn to_redacted_json(&self) -> Result<String> {
        let mut redacted = self.clone();
        if redacted.password.is_some() {
            redacted.password = Some("********".to_string());
        }
        serde_json::to_string_pretty(&redacted)
            .map_err(|e| DeployError::Config(format!("cannot serialize config: {e}")))
    }
}

/// Find deploy.json in order of priority:
/// 1. `<local_dir>/deploy.json` (project-local)
/// 2. `<home>/.config/remote-deploy/deploy.json` (per-user)
pub fn find_config_file(local_dir: &Path, home: Option<&Path>) -> Option<PathBuf> {
    let local_path = local_dir.join(CONFIG_FILE_NAME);
    if local_path.exists() {
        return Some(local_path);
    }

    let global_path = home?
        .join(".config")
        .join("remote-deploy")
        .join(CONFIG_FILE_NAME);
    global_path.exists().then_some(global_path)
}
