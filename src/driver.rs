//! The terminal driver: walks an ssh session from the password prompt
//! through the command script to end-of-stream.
//!
//! Phases run strictly in order:
//! `Spawned -> Authenticating -> Settling -> SendingCommands -> Relaying -> Terminated`.
//! In `SyncMode::Timed` readiness is assumed after fixed sleeps; in
//! `SyncMode::Prompt` the driver reads until the remote shell prompt is
//! drawn before writing each line.

use std::io::Write;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, trace, warn};

use crate::config::DeployConfig;
use crate::error::{DeployError, Result};
use crate::models::{CommandScript, LineEnding, Phase, SyncMode};
use crate::pty::{write_line, LineScanner, MatchBuffer, OutputStream, RemoteChild, StreamEvent, Utf8Decoder};

/// Outcome of a finished session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployReport {
    pub credential_sent: bool,
    pub commands_sent: usize,
    /// The completion marker appeared on a line of its own
    pub completed: bool,
    pub exit_code: Option<u32>,
    pub elapsed: Duration,
}

pub struct TerminalDriver<'a, W: Write, O: Write> {
    config: &'a DeployConfig,
    credential: String,
    script: CommandScript,
    stream: OutputStream,
    writer: W,
    sink: O,
    phase: Phase,
    buffer: MatchBuffer,
    decoder: Utf8Decoder,
    scanner: LineScanner,
    credential_sent: bool,
    commands_sent: usize,
}

impl<'a, W: Write, O: Write> TerminalDriver<'a, W, O> {
    pub fn new(config: &'a DeployConfig, credential: String, stream: OutputStream, writer: W, sink: O) -> Self {
        Self {
            config,
            credential,
            script: config.command_script(),
            stream,
            writer,
            sink,
            phase: Phase::Spawned,
            buffer: MatchBuffer::new(),
            decoder: Utf8Decoder::new(),
            scanner: LineScanner::new(&config.completion_marker),
            credential_sent: false,
            commands_sent: 0,
        }
    }

    /// Drive the session to completion and reap the child.
    ///
    /// On error the child is killed before it is reaped.
    pub fn run<C: RemoteChild + ?Sized>(mut self, child: &mut C) -> Result<DeployReport> {
        let started = Instant::now();
        let result = self.drive();

        if let Err(e) = &result {
            warn!(phase = %self.phase, error = %e, "session failed, stopping ssh");
            if let Err(kill_err) = child.terminate() {
                debug!(error = %kill_err, "ssh already gone");
            }
        }

        self.enter(Phase::Terminated);
        let exit_code = match child.wait_exit() {
            Ok(code) => {
                info!(exit_code = code, "ssh exited");
                Some(code)
            }
            Err(e) => {
                warn!(error = %e, "failed to reap ssh");
                None
            }
        };

        let Self {
            stream,
            credential_sent,
            commands_sent,
            scanner,
            ..
        } = self;
        result?;
        stream.join();

        Ok(DeployReport {
            credential_sent,
            commands_sent,
            completed: scanner.found(),
            exit_code,
            elapsed: started.elapsed(),
        })
    }

    fn drive(&mut self) -> Result<()> {
        self.enter(Phase::Authenticating);
        if !self.authenticate()? {
            warn!(
                marker = %self.config.password_prompt,
                output = %self.buffer.last_line(),
                "stream ended before the password prompt appeared"
            );
            return Ok(());
        }

        self.enter(Phase::Settling);
        self.settle()?;

        self.enter(Phase::SendingCommands);
        self.send_commands()?;

        self.enter(Phase::Relaying);
        self.relay()
    }

    fn enter(&mut self, phase: Phase) {
        debug!(from = %self.phase, to = %phase, "phase transition");
        self.phase = phase;
    }

    /// Read until the password prompt and answer it once.
    ///
    /// Returns whether the credential has been sent. End-of-stream before
    /// the prompt is not an error. Output read here is not relayed.
    pub(crate) fn authenticate(&mut self) -> Result<bool> {
        if self.credential_sent {
            return Ok(true);
        }
        let started = Instant::now();
        let limit = match self.config.sync_mode {
            SyncMode::Prompt => Some(self.config.auth_timeout()),
            SyncMode::Timed => None,
        };

        loop {
            match self.next_event(started, limit)? {
                StreamEvent::Data(bytes) => {
                    trace!(len = bytes.len(), "pre-auth output");
                    self.buffer.append(&bytes);
                    if self.buffer.contains(&self.config.password_prompt) {
                        write_line(&mut self.writer, self.credential.as_bytes(), LineEnding::Newline)
                            .map_err(|e| DeployError::io(self.phase, e))?;
                        self.credential_sent = true;
                        self.buffer.clear();
                        info!("password sent");
                        return Ok(true);
                    }
                }
                StreamEvent::Eof => {
                    debug!(output = %self.buffer.recent_output(), "stream ended during authentication");
                    return Ok(false);
                }
                StreamEvent::Failed(e) => return Err(DeployError::io(self.phase, e)),
            }
        }
    }

    fn settle(&mut self) -> Result<()> {
        match self.config.sync_mode {
            SyncMode::Timed => {
                thread::sleep(self.config.settle_delay());
                Ok(())
            }
            SyncMode::Prompt => self.wait_for_prompt(),
        }
    }

    pub(crate) fn send_commands(&mut self) -> Result<()> {
        let lines = self.script.lines().to_vec();
        let total = lines.len();
        for (index, line) in lines.iter().enumerate() {
            if self.config.sync_mode == SyncMode::Prompt && index > 0 {
                self.wait_for_prompt()?;
            }
            self.buffer.clear();
            debug!(step = index + 1, total, command = %line, "sending command");
            write_line(&mut self.writer, line.as_bytes(), LineEnding::CarriageReturn)
                .map_err(|e| DeployError::io(self.phase, e))?;
            self.commands_sent += 1;
            if self.config.sync_mode == SyncMode::Timed {
                thread::sleep(self.config.command_delay());
            }
        }
        info!(commands = self.commands_sent, "command script sent");
        Ok(())
    }

    /// Relay output until the current line ends with a shell prompt.
    ///
    /// While settling, a second password prompt means the credential was
    /// refused; it is never sent twice.
    fn wait_for_prompt(&mut self) -> Result<()> {
        let started = Instant::now();
        let limit = Some(self.config.prompt_timeout());
        loop {
            if self.buffer.ends_with_prompt(&self.config.shell_prompts) {
                trace!(waited = ?started.elapsed(), "shell prompt ready");
                return Ok(());
            }
            if self.phase == Phase::Settling && self.buffer.contains(&self.config.password_prompt) {
                return Err(DeployError::AuthRejected);
            }
            match self.next_event(started, limit)? {
                StreamEvent::Data(bytes) => {
                    self.relay_chunk(&bytes)?;
                    self.buffer.append(&bytes);
                }
                StreamEvent::Eof => return Err(DeployError::ConnectionClosed { phase: self.phase }),
                StreamEvent::Failed(e) => return Err(DeployError::io(self.phase, e)),
            }
        }
    }

    /// Copy everything to the sink until end-of-stream
    fn relay(&mut self) -> Result<()> {
        loop {
            match self.stream.recv() {
                StreamEvent::Data(bytes) => self.relay_chunk(&bytes)?,
                StreamEvent::Eof => break,
                StreamEvent::Failed(e) => return Err(DeployError::io(self.phase, e)),
            }
        }

        let tail = self.decoder.finish();
        if !tail.is_empty() {
            self.emit(&tail)?;
        }
        self.scanner.finish();
        debug!(completed = self.scanner.found(), "relay finished");
        Ok(())
    }

    fn relay_chunk(&mut self, bytes: &[u8]) -> Result<()> {
        let text = self.decoder.decode(bytes);
        self.emit(&text)
    }

    fn emit(&mut self, text: &str) -> Result<()> {
        self.scanner.feed(text);
        self.sink
            .write_all(text.as_bytes())
            .and_then(|_| self.sink.flush())
            .map_err(|e| DeployError::io(self.phase, e))
    }

    fn next_event(&self, started: Instant, limit: Option<Duration>) -> Result<StreamEvent> {
        let Some(limit) = limit else {
            return Ok(self.stream.recv());
        };
        let remaining = limit.saturating_sub(started.elapsed());
        if remaining.is_zero() {
            return Err(DeployError::Timeout {
                phase: self.phase,
                waited: limit,
            });
        }
        self.stream
            .recv_timeout(remaining)
            .ok_or(DeployError::Timeout {
                phase: self.phase,
                waited: limit,
            })
    }
}
