//! Shared fakes for the integration tests.
//!
//! `FakeCluster` answers commands through a handler closure and records every
//! command (and every line typed into a prompt) in a log shared by all
//! clusters of a test, so cross-site ordering can be asserted.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use nasdr::actions::PollPolicy;
use nasdr::config::Inventory;
use nasdr::console::Console;
use nasdr::engine::SiteChannels;
use nasdr::error::{NasDrError, Result};
use nasdr::remote::{CommandOutput, Connector, ControlChannel, PendingCommand};

pub const APP1_YAML: &str = "\
- app_name: APP1
  prod_cluster: prod-a.corp.example
  dr_cluster: dr-a.corp.example
  prod_vserver: svm_prod
  dr_vserver: svm_dr
  volume_names:
    - volume_name: vol1
      share_name: share1
";

pub const QTREE_YAML: &str = "\
- app_name: APP2
  prod_cluster: prod-a.corp.example
  dr_cluster: dr-a.corp.example
  prod_vserver: svm_prod
  dr_vserver: svm_dr
  volume_names:
    - volume_name: vol2
      qtrees:
        - qtree_name: q1
          share_name: q1share
        - qtree_name: q2
          share_name: q2share
";

pub const NO_ENTRIES: &str = "There are no entries matching your query.\n";

pub fn inventory(yaml: &str) -> Inventory {
    Inventory::from_yaml(yaml).unwrap()
}

/// Poll immediately; give up after a second.
pub fn fast_poll() -> PollPolicy {
    PollPolicy {
        interval: Duration::from_millis(1),
        timeout: Duration::from_secs(1),
    }
}

/// A `snapmirror show` table with one relationship line.
pub fn show_line(src: &str, dst: &str, state: &str, status: &str) -> String {
    format!(
        "source-path destination-path schedule policy state status lag-time\n\
         ----------- ---------------- -------- ------ ----- ------ --------\n\
         {} {} hourly MirrorAllSnapshots {} {} 0:10:00\n",
        src, dst, state, status
    )
}

/// What a fake cluster prints for one command.
#[derive(Debug, Clone, Default)]
pub struct Reply {
    pub stdout: String,
    pub stderr: String,
    /// Printed first; the rest of `stdout` only arrives after a line is sent.
    pub prompt: Option<String>,
    /// Printed only after the answer window has closed.
    pub late: String,
}

impl Reply {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self { stdout: stdout.into(), ..Self::default() }
    }

    pub fn err(stderr: impl Into<String>) -> Self {
        Self { stderr: stderr.into(), ..Self::default() }
    }

    pub fn succeeded() -> Self {
        Self::ok("Operation succeeded: done.\n")
    }

    pub fn prompting(prompt: impl Into<String>, then: impl Into<String>) -> Self {
        Self {
            stdout: then.into(),
            prompt: Some(prompt.into()),
            ..Self::default()
        }
    }

    /// Nothing within the answer window, then `stdout` and `stderr`.
    pub fn late(stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            late: stdout.into(),
            stderr: stderr.into(),
            ..Self::default()
        }
    }
}

/// One entry of the shared log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Command { cluster: String, command: String },
    Answer { cluster: String, line: String },
}

#[derive(Debug, Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<Event>>>);

impl EventLog {
    pub fn events(&self) -> Vec<Event> {
        self.0.lock().unwrap().clone()
    }

    /// `(cluster, command)` for every command, in issue order.
    pub fn commands(&self) -> Vec<(String, String)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Command { cluster, command } => Some((cluster, command)),
                Event::Answer { .. } => None,
            })
            .collect()
    }

    pub fn answers(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Answer { line, .. } => Some(line),
                Event::Command { .. } => None,
            })
            .collect()
    }

    /// Commands other than `snapmirror show` / `cifs share show`.
    pub fn mutating_commands(&self) -> Vec<(String, String)> {
        self.commands()
            .into_iter()
            .filter(|(_, c)| !c.starts_with("snapmirror show") && !c.starts_with("cifs share show"))
            .collect()
    }

    fn push(&self, event: Event) {
        self.0.lock().unwrap().push(event);
    }
}

type Handler = Box<dyn Fn(&str) -> Reply + Send + Sync>;

pub struct FakeCluster {
    name: String,
    log: EventLog,
    handler: Handler,
}

impl FakeCluster {
    pub fn new(
        name: &str,
        log: &EventLog,
        handler: impl Fn(&str) -> Reply + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            log: log.clone(),
            handler: Box::new(handler),
        })
    }
}

impl ControlChannel for FakeCluster {
    fn cluster(&self) -> &str {
        &self.name
    }

    fn start(&self, command: &str) -> Result<Box<dyn PendingCommand>> {
        self.log.push(Event::Command {
            cluster: self.name.clone(),
            command: command.to_string(),
        });
        let reply = (self.handler)(command);
        let (shown, pending) = match reply.prompt {
            Some(prompt) => (prompt, Some(reply.stdout)),
            None => (reply.stdout, None),
        };
        Ok(Box::new(FakeCommand {
            cluster: self.name.clone(),
            log: self.log.clone(),
            shown,
            pending,
            late: reply.late,
            stderr: reply.stderr,
        }))
    }
}

struct FakeCommand {
    cluster: String,
    log: EventLog,
    shown: String,
    pending: Option<String>,
    late: String,
    stderr: String,
}

impl PendingCommand for FakeCommand {
    fn output(&self) -> &str {
        &self.shown
    }

    fn send_line(&mut self, line: &str) -> Result<()> {
        self.log.push(Event::Answer {
            cluster: self.cluster.clone(),
            line: line.to_string(),
        });
        if let Some(rest) = self.pending.take() {
            self.shown.push_str(&rest);
        }
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<CommandOutput> {
        let mut stdout = self.shown;
        stdout.push_str(&self.late);
        Ok(CommandOutput::new(stdout, self.stderr))
    }
}

/// Channels for the two clusters of `APP1_YAML`/`QTREE_YAML`.
pub fn site_channels(prod: Arc<FakeCluster>, dr: Arc<FakeCluster>) -> SiteChannels {
    SiteChannels::new(prod, dr)
}

/// Hands out prebuilt fakes by cluster name; unknown names fail to connect.
pub struct FakeConnector {
    clusters: Vec<Arc<FakeCluster>>,
    pub connects: Arc<AtomicUsize>,
}

impl FakeConnector {
    pub fn new(clusters: Vec<Arc<FakeCluster>>) -> Self {
        Self { clusters, connects: Arc::new(AtomicUsize::new(0)) }
    }
}

impl Connector for FakeConnector {
    fn connect(&self, cluster: &str) -> Result<Arc<dyn ControlChannel>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.clusters
            .iter()
            .find(|c| c.cluster() == cluster)
            .map(|c| Arc::clone(c) as Arc<dyn ControlChannel>)
            .ok_or_else(|| NasDrError::connection(format!("{}: no route to host", cluster)))
    }
}

/// Feeds canned answers and keeps everything printed.
#[derive(Debug, Default)]
pub struct ScriptedConsole {
    answers: VecDeque<String>,
    pub prompts: Vec<String>,
    pub printed: Vec<String>,
}

impl ScriptedConsole {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Everything printed, ANSI colours removed.
    pub fn text(&self) -> String {
        strip_ansi(&self.printed.join("\n"))
    }
}

impl Console for ScriptedConsole {
    fn prompt(&mut self, message: &str) -> Option<String> {
        self.prompts.push(strip_ansi(message));
        self.answers.pop_front()
    }

    fn print(&mut self, line: &str) {
        self.printed.push(line.to_string());
    }
}

pub fn strip_ansi(s: &str) -> String {
    let mut out = String::new();
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\u{1b}' {
            for c in chars.by_ref() {
                if c.is_ascii_alphabetic() {
                    break;
                }
            }
        } else {
            out.push(c);
        }
    }
    out
}
