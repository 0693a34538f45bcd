//! Control channels backed by the system OpenSSH client.
//!
//! Each cluster gets one master connection (`ssh -M`), opened interactively so
//! the operator can answer a password or key prompt once. Every command after
//! that is a short-lived `ssh -S <socket>` client multiplexed over the master,
//! which is how several workers can share one authenticated session.

use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info, warn};

use super::{CommandOutput, ControlChannel, Connector, PendingCommand};
use crate::error::{NasDrError, Result};
use crate::process_guard::{ChildRegistry, CommandProcessGroup};

/// Exit code `ssh` uses for its own failures (as opposed to the remote's).
const SSH_FAILURE_EXIT: i32 = 255;

/// How to reach the clusters.
#[derive(Debug, Clone)]
pub struct SshOptions {
    /// Login user; `None` leaves it to ssh_config.
    pub user: Option<String>,
    /// Extra `-o key=value` options passed to every invocation.
    pub extra_options: Vec<String>,
    /// Directory for the master control sockets.
    pub control_dir: PathBuf,
    /// A started command is considered to be waiting for input once it has
    /// printed nothing for this long.
    pub quiet_period: Duration,
}

impl Default for SshOptions {
    fn default() -> Self {
        Self {
            user: None,
            extra_options: Vec::new(),
            control_dir: std::env::temp_dir(),
            quiet_period: Duration::from_millis(1500),
        }
    }
}

impl SshOptions {
    fn destination(&self, cluster: &str) -> String {
        match &self.user {
            Some(user) => format!("{}@{}", user, cluster),
            None => cluster.to_string(),
        }
    }

    fn control_path(&self, cluster: &str) -> PathBuf {
        let host: String = cluster
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '.' { c } else { '_' })
            .collect();
        self.control_dir
            .join(format!("nas-dr-{}-{}.sock", std::process::id(), host))
    }

    fn apply_extra_options(&self, cmd: &mut Command) {
        for option in &self.extra_options {
            cmd.arg("-o").arg(option);
        }
    }
}

/// Opens one multiplexed master connection per cluster.
#[derive(Debug, Clone, Default)]
pub struct SshConnector {
    options: SshOptions,
}

impl SshConnector {
    pub fn new(options: SshOptions) -> Self {
        Self { options }
    }
}

impl Connector for SshConnector {
    fn connect(&self, cluster: &str) -> Result<Arc<dyn ControlChannel>> {
        let destination = self.options.destination(cluster);
        let control_path = self.options.control_path(cluster);
        info!(cluster, "Opening control connection");

        let mut cmd = Command::new("ssh");
        cmd.args(["-M", "-N", "-f", "-o", "ControlPersist=yes", "-S"])
            .arg(&control_path);
        self.options.apply_extra_options(&mut cmd);
        // Password prompts need the terminal, so no new process group here.
        let status = cmd
            .arg(&destination)
            .stdin(Stdio::inherit())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .status()
            .map_err(|e| NasDrError::connection(format!("failed to run ssh: {}", e)))?;

        if !status.success() {
            return Err(NasDrError::connection(format!(
                "could not open control connection to {} ({})",
                cluster, status
            )));
        }

        ChildRegistry::global()
            .lock()
            .map_err(|_| NasDrError::state("child registry lock poisoned"))?
            .register_master(&control_path, &destination);

        Ok(Arc::new(SshChannel {
            cluster: cluster.to_string(),
            destination,
            control_path,
            options: self.options.clone(),
        }))
    }
}

/// A live master connection to one cluster.
#[derive(Debug)]
pub struct SshChannel {
    cluster: String,
    destination: String,
    control_path: PathBuf,
    options: SshOptions,
}

impl ControlChannel for SshChannel {
    fn cluster(&self) -> &str {
        &self.cluster
    }

    fn start(&self, command: &str) -> Result<Box<dyn PendingCommand>> {
        debug!(cluster = %self.cluster, command, "Submitting remote command");
        let mut cmd = Command::new("ssh");
        cmd.arg("-S")
            .arg(&self.control_path)
            .args(["-T", "-o", "BatchMode=yes"]);
        self.options.apply_extra_options(&mut cmd);
        cmd.arg(&self.destination).arg(command);

        let pending = PipedCommand::spawn(&mut cmd, self.options.quiet_period)?;
        Ok(Box::new(pending))
    }

    fn close(&self) -> Result<()> {
        info!(cluster = %self.cluster, "Closing control connection");
        let status = Command::new("ssh")
            .arg("-S")
            .arg(&self.control_path)
            .args(["-O", "exit"])
            .arg(&self.destination)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()?;

        if let Ok(mut registry) = ChildRegistry::global().lock() {
            registry.unregister_master(&self.control_path);
        }
        if !status.success() {
            return Err(NasDrError::connection(format!(
                "master connection to {} did not close cleanly ({})",
                self.cluster, status
            )));
        }
        Ok(())
    }
}

/// A spawned local process whose stdout is read incrementally.
///
/// Standard output is pumped by a reader thread into a channel; output is
/// considered settled once the process exits or stays silent for the quiet
/// period.
pub struct PipedCommand {
    child: Child,
    pid: u32,
    stdin: Option<ChildStdin>,
    chunks: Receiver<Vec<u8>>,
    stdout_bytes: Vec<u8>,
    stdout: String,
    eof: bool,
    stdout_reader: Option<JoinHandle<()>>,
    stderr_reader: Option<JoinHandle<Vec<u8>>>,
    quiet_period: Duration,
}

impl PipedCommand {
    /// Spawn `cmd` with all three streams piped and collect its initial output.
    pub fn spawn(cmd: &mut Command, quiet_period: Duration) -> Result<Self> {
        let mut child = cmd
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .in_new_process_group()
            .spawn()
            .map_err(|e| NasDrError::remote(format!("failed to spawn ssh client: {}", e)))?;
        let pid = child.id();
        if let Ok(mut registry) = ChildRegistry::global().lock() {
            registry.register(pid);
        }

        let stdin = child.stdin.take();
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| NasDrError::remote("child stdout was not captured"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| NasDrError::remote("child stderr was not captured"))?;

        let (tx, chunks) = mpsc::channel();
        let stdout_reader = thread::spawn(move || {
            let mut buf = [0u8; 4096];
            loop {
                match stdout.read(&mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        if tx.send(buf[..n].to_vec()).is_err() {
                            break;
                        }
                    }
                }
            }
        });
        let stderr_reader = thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = stderr.read_to_end(&mut buf);
            buf
        });

        let mut pending = Self {
            child,
            pid,
            stdin,
            chunks,
            stdout_bytes: Vec::new(),
            stdout: String::new(),
            eof: false,
            stdout_reader: Some(stdout_reader),
            stderr_reader: Some(stderr_reader),
            quiet_period,
        };
        pending.collect(Some(quiet_period));
        Ok(pending)
    }

    /// Pull chunks until EOF, or until `quiet` passes with nothing new.
    fn collect(&mut self, quiet: Option<Duration>) {
        while !self.eof {
            let next = match quiet {
                Some(timeout) => self.chunks.recv_timeout(timeout),
                None => self.chunks.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };
            match next {
                Ok(chunk) => self.stdout_bytes.extend_from_slice(&chunk),
                Err(RecvTimeoutError::Timeout) => break,
                Err(RecvTimeoutError::Disconnected) => self.eof = true,
            }
        }
        self.stdout = String::from_utf8_lossy(&self.stdout_bytes).into_owned();
    }

    fn unregister(&self) {
        if let Ok(mut registry) = ChildRegistry::global().lock() {
            registry.unregister(self.pid);
        }
    }
}

impl PendingCommand for PipedCommand {
    fn output(&self) -> &str {
        &self.stdout
    }

    fn send_line(&mut self, line: &str) -> Result<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| NasDrError::remote("standard input already closed"))?;
        stdin.write_all(line.as_bytes())?;
        stdin.write_all(b"\n")?;
        stdin.flush()?;
        self.collect(Some(self.quiet_period));
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> Result<CommandOutput> {
        drop(self.stdin.take());
        self.collect(None);

        if let Some(handle) = self.stdout_reader.take() {
            let _ = handle.join();
        }
        let stderr_bytes = self
            .stderr_reader
            .take()
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();
        let status = self.child.wait();
        self.unregister();
        let status = status?;

        let output = CommandOutput {
            stdout: std::mem::take(&mut self.stdout),
            stderr: String::from_utf8_lossy(&stderr_bytes).into_owned(),
        };
        if status.code() == Some(SSH_FAILURE_EXIT) {
            let reason = output.first_error_line().unwrap_or("connection lost").to_string();
            warn!(pid = self.pid, reason = %reason, "ssh client failed");
            return Err(NasDrError::remote(reason));
        }
        Ok(output)
    }
}

impl Drop for PipedCommand {
    fn drop(&mut self) {
        // Only reached with the child still running when finish() was skipped.
        if self.stdout_reader.is_some() {
            let _ = self.child.kill();
            let _ = self.child.wait();
            self.unregister();
        }
    }
}
