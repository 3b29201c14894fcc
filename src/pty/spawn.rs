//! ssh process spawning with PTY setup.

use std::io::{self, Read, Write};

use portable_pty::{native_pty_system, ChildKiller, CommandBuilder, PtySize};
use tracing::{debug, info};

use crate::config::DeployConfig;
use crate::error::{DeployError, Result};

/// An established ssh session
pub struct Session {
    pub child: Box<dyn portable_pty::Child + Send + Sync>,
    /// Held so the master side stays open for the life of the session
    pub master_pty: Box<dyn portable_pty::MasterPty + Send>,
    pub reader: Box<dyn Read + Send>,
    pub pty_writer: Box<dyn Write + Send>,
}

/// Process the driver reaps once output has ended
pub trait RemoteChild {
    /// Block until the process exits and return its exit code
    fn wait_exit(&mut self) -> io::Result<u32>;

    /// Kill the process after a failed run so that reaping cannot hang
    fn terminate(&mut self) -> io::Result<()>;
}

impl RemoteChild for Box<dyn portable_pty::Child + Send + Sync> {
    fn wait_exit(&mut self) -> io::Result<u32> {
        self.wait().map(|status| status.exit_code())
    }

    fn terminate(&mut self) -> io::Result<()> {
        self.kill()
    }
}

/// Arguments passed to `ssh`: configured options, port, then `user@host`
pub fn ssh_args(config: &DeployConfig) -> Vec<String> {
    let mut args = config.ssh_options.clone();
    if config.port != 22 {
        args.push("-p".to_string());
        args.push(config.port.to_string());
    }
    args.push(config.destination());
    args
}

/// PTY dimensions: the local terminal when there is one, else the config
pub fn pty_size(config: &DeployConfig) -> PtySize {
    let (cols, rows) = crossterm::terminal::size()
        .ok()
        .filter(|(cols, rows)| *cols > 0 && *rows > 0)
        .unwrap_or((config.pty_cols, config.pty_rows));
    PtySize {
        rows,
        cols,
        pixel_width: 0,
        pixel_height: 0,
    }
}

/// Open a PTY and start `ssh` on its slave side
pub fn spawn_session(config: &DeployConfig) -> Result<Session> {
    let size = pty_size(config);
    let pty_system = native_pty_system();
    let pair = pty_system
        .openpty(size)
        .map_err(|e| DeployError::Spawn(format!("openpty: {e}")))?;

    let mut cmd = CommandBuilder::new("ssh");
    cmd.args(ssh_args(config));
    if let Ok(cwd) = std::env::current_dir() {
        cmd.cwd(&cwd);
    }
    cmd.env("TERM", "xterm-256color");

    let child = pair
        .slave
        .spawn_command(cmd)
        .map_err(|e| DeployError::Spawn(e.to_string()))?;
    info!(
        destination = %config.destination(),
        pid = child.process_id(),
        rows = size.rows,
        cols = size.cols,
        "ssh started"
    );

    // Drop slave after spawning so EOF reaches us when ssh exits
    drop(pair.slave);

    // Clone reader before take_writer
    let reader = pair
        .master
        .try_clone_reader()
        .map_err(|e| DeployError::Spawn(format!("pty reader: {e}")))?;
    let pty_writer = pair
        .master
        .take_writer()
        .map_err(|e| DeployError::Spawn(format!("pty writer: {e}")))?;
    debug!("pty reader and writer ready");

    Ok(Session {
        child,
        master_pty: pair.master,
        reader,
        pty_writer,
    })
}
