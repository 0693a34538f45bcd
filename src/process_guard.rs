//! Lifecycle management for the `ssh` clients spawned by the console
//!
//! Two kinds of child state outlive a single function call:
//!
//! - per-command `ssh` clients, which run in their own process group so a
//!   terminal Ctrl+C does not tear a half-finished remote command apart
//!   mid-prompt; the registry terminates them instead
//! - multiplexed master connections, which are daemonised by `ssh -f` and
//!   therefore have to be closed through their control socket
//!
//! On normal exit the connection pool closes masters itself. On SIGINT,
//! SIGTERM or SIGHUP the signal thread walks this registry so nothing is left
//! running against the clusters.

use nix::libc;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

static CHILD_REGISTRY: OnceLock<Arc<Mutex<ChildRegistry>>> = OnceLock::new();

/// Registry of running `ssh` command clients and open master connections.
#[derive(Debug, Default)]
pub struct ChildRegistry {
    pids: HashSet<u32>,
    /// control socket -> `user@host` destination
    masters: HashMap<PathBuf, String>,
    cleanup_initiated: bool,
}

impl ChildRegistry {
    /// Get or create the global registry
    pub fn global() -> Arc<Mutex<ChildRegistry>> {
        CHILD_REGISTRY
            .get_or_init(|| Arc::new(Mutex::new(ChildRegistry::default())))
            .clone()
    }

    pub fn register(&mut self, pid: u32) {
        self.pids.insert(pid);
        debug!(pid, "Registered ssh client");
    }

    pub fn unregister(&mut self, pid: u32) {
        self.pids.remove(&pid);
        debug!(pid, "Unregistered ssh client");
    }

    pub fn register_master(&mut self, control_path: &Path, destination: &str) {
        self.masters
            .insert(control_path.to_path_buf(), destination.to_string());
        debug!(destination, path = %control_path.display(), "Registered master connection");
    }

    pub fn unregister_master(&mut self, control_path: &Path) {
        self.masters.remove(control_path);
    }

    pub fn count(&self) -> usize {
        self.pids.len()
    }

    pub fn master_count(&self) -> usize {
        self.masters.len()
    }

    /// Terminate every tracked client, then close every tracked master.
    ///
    /// Clients get SIGTERM on their process group, `grace_period` to exit,
    /// then SIGKILL.
    pub fn terminate_all(&mut self, grace_period: Duration) {
        if self.cleanup_initiated {
            debug!("Cleanup already initiated, skipping");
            return;
        }
        self.cleanup_initiated = true;

        self.terminate_clients(grace_period);
        self.close_masters();
    }

    fn terminate_clients(&mut self, grace_period: Duration) {
        if self.pids.is_empty() {
            return;
        }
        info!("Terminating {} ssh client(s)...", self.pids.len());

        let pids: Vec<u32> = self.pids.iter().copied().collect();
        for &pid in &pids {
            if let Err(e) = send_signal_to_group(pid, Signal::SIGTERM) {
                debug!(pid, error = %e, "Group SIGTERM failed, signalling process");
                if let Err(e) = send_signal(pid, Signal::SIGTERM) {
                    warn!(pid, error = %e, "Failed to send SIGTERM");
                }
            }
        }

        let start = Instant::now();
        while start.elapsed() < grace_period {
            if pids.iter().all(|&pid| !is_process_alive(pid)) {
                self.pids.clear();
                return;
            }
            std::thread::sleep(Duration::from_millis(100));
        }

        for &pid in &pids {
            if is_process_alive(pid) {
                warn!(pid, "ssh client did not terminate, sending SIGKILL");
                if send_signal_to_group(pid, Signal::SIGKILL).is_err() {
                    let _ = send_signal(pid, Signal::SIGKILL);
                }
            }
        }
        self.pids.clear();
    }

    fn close_masters(&mut self) {
        for (control_path, destination) in self.masters.drain() {
            info!(destination = %destination, "Closing master connection");
            let result = Command::new("ssh")
                .arg("-S")
                .arg(&control_path)
                .args(["-O", "exit"])
                .arg(&destination)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status();
            if let Err(e) = result {
                warn!(destination = %destination, error = %e, "Failed to close master connection");
            }
        }
    }
}

fn send_signal(pid: u32, signal: Signal) -> Result<(), nix::Error> {
    signal::kill(Pid::from_raw(pid as i32), signal)
}

/// Negative PID addresses the whole process group.
fn send_signal_to_group(pgid: u32, signal: Signal) -> Result<(), nix::Error> {
    signal::kill(Pid::from_raw(-(pgid as i32)), signal)
}

/// Alive means present and neither zombie nor dead.
fn is_process_alive(pid: u32) -> bool {
    if signal::kill(Pid::from_raw(pid as i32), None).is_err() {
        return false;
    }
    if let Ok(stat) = std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
        let fields: Vec<&str> = stat.split_whitespace().collect();
        if fields.len() > 2 {
            return !matches!(fields[2], "Z" | "X");
        }
    }
    true
}

/// RAII guard held by `main`; cleans up the global registry on drop.
pub struct ProcessGuard {
    registry: Arc<Mutex<ChildRegistry>>,
}

impl ProcessGuard {
    pub fn new() -> Self {
        Self {
            registry: ChildRegistry::global(),
        }
    }
}

impl Default for ProcessGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ProcessGuard {
    fn drop(&mut self) {
        debug!("ProcessGuard dropped, initiating cleanup");
        if let Ok(mut registry) = self.registry.lock() {
            registry.terminate_all(Duration::from_secs(5));
        }
    }
}

/// Install handlers for SIGINT, SIGTERM and SIGHUP. Call once at start-up.
pub fn init_signal_handlers() -> Result<(), std::io::Error> {
    use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM, SIGHUP])?;

    std::thread::spawn(move || {
        for sig in signals.forever() {
            let signal_name = match sig {
                SIGINT => "SIGINT",
                SIGTERM => "SIGTERM",
                SIGHUP => "SIGHUP",
                _ => "UNKNOWN",
            };
            info!("Received {}, closing cluster connections...", signal_name);

            if let Ok(mut registry) = ChildRegistry::global().lock() {
                registry.terminate_all(Duration::from_secs(3));
            }
            std::process::exit(128 + sig);
        }
    });

    Ok(())
}

/// Extension trait for `Command`: run the child as leader of its own process
/// group, and have it receive SIGTERM if the console dies.
pub trait CommandProcessGroup {
    fn in_new_process_group(&mut self) -> &mut Self;
}

impl CommandProcessGroup for Command {
    fn in_new_process_group(&mut self) -> &mut Self {
        use std::os::unix::process::CommandExt;
        // SAFETY: only async-signal-safe calls between fork and exec.
        unsafe {
            self.pre_exec(|| {
                nix::unistd::setpgid(Pid::from_raw(0), Pid::from_raw(0))
                    .map_err(std::io::Error::other)?;
                if libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGTERM) == -1 {
                    return Err(std::io::Error::last_os_error());
                }
                Ok(())
            });
        }
        self
    }
}
