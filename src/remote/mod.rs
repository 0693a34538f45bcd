//! Remote control channels to the storage clusters.
//!
//! Everything that talks to a cluster goes through [`ControlChannel`]. A
//! command is started, its early output can be inspected and answered on the
//! same channel (the cluster CLI occasionally stops on a y/n prompt), and it is
//! then finished to collect both streams.
//!
//! - [`ssh`] drives the system `ssh` client over one multiplexed master
//!   connection per cluster.
//! - [`pool`] caches one channel per cluster for the lifetime of a session.

pub mod pool;
pub mod ssh;

use std::sync::Arc;

use crate::error::Result;

pub use pool::ConnectionPool;
pub use ssh::{SshConnector, SshOptions};

/// Both output streams of a finished remote command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn new(stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self { stdout: stdout.into(), stderr: stderr.into() }
    }

    /// Whether the remote wrote anything to its error stream.
    pub fn has_error(&self) -> bool {
        !self.stderr.trim().is_empty()
    }

    /// First non-blank line of the error stream.
    ///
    /// Full remote diagnostics can run to dozens of lines; only this line is
    /// surfaced to the operator.
    pub fn first_error_line(&self) -> Option<&str> {
        self.stderr.lines().map(str::trim).find(|line| !line.is_empty())
    }
}

/// A command that has been submitted and may still be running.
pub trait PendingCommand: Send {
    /// Standard output received so far.
    fn output(&self) -> &str;

    /// Write one line to the command's standard input and collect whatever it
    /// prints in response.
    fn send_line(&mut self, line: &str) -> Result<()>;

    /// Close standard input, wait for completion and return the complete
    /// output (including anything already returned by [`output`](Self::output)).
    fn finish(self: Box<Self>) -> Result<CommandOutput>;
}

/// One logical control channel to a cluster.
pub trait ControlChannel: Send + Sync {
    /// Host name of the cluster this channel talks to.
    fn cluster(&self) -> &str;

    /// Submit a command and return once it has exited or gone quiet.
    fn start(&self, command: &str) -> Result<Box<dyn PendingCommand>>;

    /// Submit a command and wait for it to finish.
    fn run(&self, command: &str) -> Result<CommandOutput> {
        self.start(command)?.finish()
    }

    /// Release the underlying connection.
    fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Opens channels on demand.
pub trait Connector: Send + Sync {
    fn connect(&self, cluster: &str) -> Result<Arc<dyn ControlChannel>>;
}
