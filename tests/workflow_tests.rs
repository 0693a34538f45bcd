// Workflow tests for nas-dr
//
// Procedures are driven end to end against scripted fake clusters: the plan
// is previewed, confirmed (or not) on a scripted console, executed, and the
// exact command sequence plus the history file are checked afterwards.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::FixedOffset;
use tempfile::TempDir;

use common::*;
use nasdr::actions::{self, Convergence, PollPolicy};
use nasdr::config::{Inventory, Settings};
use nasdr::engine::{EngineContext, ProcedureOutcome, SiteChannels, VolumeStatus, run_procedure};
use nasdr::history::{HistoryStore, Operator};
use nasdr::inspector::show_command;
use nasdr::remote::ConnectionPool;
use nasdr::session::{self, Session};
use nasdr::types::Procedure;

const PROD: &str = "prod-a.corp.example";
const DR: &str = "dr-a.corp.example";

fn operator() -> Operator {
    Operator::new("jdoe", FixedOffset::east_opt(0).unwrap(), "UTC")
}

struct Harness {
    _dir: TempDir,
    store: HistoryStore,
    operator: Operator,
    inventory: Inventory,
}

impl Harness {
    fn new(yaml: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let store = HistoryStore::new(dir.path().join("recent_actions_log.yaml"));
        Self {
            _dir: dir,
            store,
            operator: operator(),
            inventory: inventory(yaml),
        }
    }

    fn run(
        &self,
        procedure: Procedure,
        channels: &SiteChannels,
        console: &mut ScriptedConsole,
    ) -> ProcedureOutcome {
        let ctx = EngineContext {
            channels,
            history: &self.store,
            operator: &self.operator,
            poll: fast_poll(),
        };
        let app = &self.inventory.applications[0];
        run_procedure(procedure, app, &ctx, console)
    }
}

/// Replies like a healthy cluster: verbs succeed, other commands are silent.
fn healthy(command: &str) -> Reply {
    if command.starts_with("snapmirror show") {
        Reply::ok(NO_ENTRIES)
    } else if command.starts_with("snapmirror ") {
        Reply::succeeded()
    } else {
        Reply::ok("")
    }
}

/// A DR cluster whose relationship goes Transferring → Idle after `update`
/// and Quiesced after `quiesce`.
fn converging_dr(log: &EventLog) -> Arc<FakeCluster> {
    converging_dr_answering_update(log, Reply::succeeded)
}

/// [`converging_dr`] with a custom reply to `snapmirror update`.
fn converging_dr_answering_update(
    log: &EventLog,
    update_reply: impl Fn() -> Reply + Send + Sync + 'static,
) -> Arc<FakeCluster> {
    let phase: Mutex<(String, usize)> = Mutex::new((String::new(), 0));
    FakeCluster::new(DR, log, move |command| {
        let mut phase = phase.lock().unwrap();
        if let Some(rest) = command.strip_prefix("snapmirror show -destination-path ") {
            let dst = rest.split_whitespace().next().unwrap_or_default().to_string();
            let src = dst.replace("svm_dr", "svm_prod");
            phase.1 += 1;
            let status = match (phase.0.as_str(), phase.1) {
                ("update", 1) => "Transferring",
                ("update", _) => "Idle",
                ("quiesce", _) => "Quiesced",
                _ => "Idle",
            };
            return Reply::ok(show_line(&src, &dst, "Snapmirrored", status));
        }
        for verb in ["update", "quiesce", "break"] {
            if command.starts_with(&format!("snapmirror {} ", verb)) {
                *phase = (verb.to_string(), 0);
                return if verb == "update" { update_reply() } else { Reply::succeeded() };
            }
        }
        Reply::ok("")
    })
}

fn show(vserver: &str, volume: &str) -> String {
    show_command(vserver, volume)
}

fn cmd(cluster: &str, command: &str) -> (String, String) {
    (cluster.to_string(), command.to_string())
}

#[test]
fn test_rejected_confirmation_changes_nothing() {
    let h = Harness::new(APP1_YAML);
    let log = EventLog::default();
    let channels = SiteChannels::new(
        FakeCluster::new(PROD, &log, healthy),
        FakeCluster::new(DR, &log, healthy),
    );

    for answer in ["no", "y", " yes", ""] {
        let mut console = ScriptedConsole::new([answer]);
        let outcome = h.run(Procedure::Recovery, &channels, &mut console);
        assert_eq!(outcome, ProcedureOutcome::Aborted);
        assert!(console.text().contains("recovery process aborted."));
    }
    assert!(log.mutating_commands().is_empty());
    assert!(!h.store.path().exists());
}

#[test]
fn test_end_of_input_at_confirmation_aborts() {
    let h = Harness::new(APP1_YAML);
    let log = EventLog::default();
    let channels = SiteChannels::new(
        FakeCluster::new(PROD, &log, healthy),
        FakeCluster::new(DR, &log, healthy),
    );
    let mut console = ScriptedConsole::new(Vec::<String>::new());
    assert_eq!(h.run(Procedure::Break, &channels, &mut console), ProcedureOutcome::Aborted);
    assert!(log.commands().is_empty());
}

#[test]
fn test_plan_preview_lists_every_command() {
    let h = Harness::new(APP1_YAML);
    let log = EventLog::default();
    let channels = SiteChannels::new(
        FakeCluster::new(PROD, &log, healthy),
        FakeCluster::new(DR, &log, healthy),
    );
    let mut console = ScriptedConsole::new(["no"]);
    h.run(Procedure::Recovery, &channels, &mut console);

    let text = console.text();
    assert!(text.contains("Starting recovery for all volumes in APP1."));
    assert!(text.contains("snapmirror quiesce -destination-path svm_dr:vol1"));
    assert!(text.contains("volume unmount -vserver svm_prod -volume vol1"));
    assert!(text.contains("cifs share create -vserver svm_dr -share-name share1 -path /vol1"));
    assert_eq!(
        console.prompts.last().map(|p| p.trim()),
        Some("Do you want to proceed with the recovery process (yes/no)?")
    );
}

#[test]
fn test_update_follows_forward_relationship() {
    let h = Harness::new(APP1_YAML);
    let log = EventLog::default();
    let dr = FakeCluster::new(DR, &log, |command| {
        if command.starts_with("snapmirror show") {
            Reply::ok(show_line("svm_prod:vol1", "svm_dr:vol1", "Snapmirrored", "Idle"))
        } else {
            healthy(command)
        }
    });
    let channels = SiteChannels::new(FakeCluster::new(PROD, &log, healthy), dr);

    let mut console = ScriptedConsole::new(["yes"]);
    h.run(Procedure::Update, &channels, &mut console);

    assert_eq!(
        log.commands(),
        vec![
            cmd(DR, &show("svm_dr", "vol1")),
            cmd(DR, "snapmirror update -destination-path svm_dr:vol1"),
        ]
    );
}

#[test]
fn test_update_follows_reverse_relationship() {
    let h = Harness::new(APP1_YAML);
    let log = EventLog::default();
    let prod = FakeCluster::new(PROD, &log, |command| {
        if command.starts_with("snapmirror show") {
            Reply::ok(show_line("svm_dr:vol1", "svm_prod:vol1", "Snapmirrored", "Idle"))
        } else {
            healthy(command)
        }
    });
    let channels = SiteChannels::new(prod, FakeCluster::new(DR, &log, healthy));

    let mut console = ScriptedConsole::new(["YES"]);
    h.run(Procedure::Update, &channels, &mut console);

    assert_eq!(
        log.mutating_commands(),
        vec![cmd(PROD, "snapmirror update -destination-path svm_prod:vol1")]
    );
}

#[test]
fn test_update_skips_volume_without_active_link() {
    let h = Harness::new(APP1_YAML);
    let log = EventLog::default();
    let dr = FakeCluster::new(DR, &log, |command| {
        if command.starts_with("snapmirror show") {
            Reply::ok(show_line("svm_prod:vol1", "svm_dr:vol1", "Broken-off", "Idle"))
        } else {
            healthy(command)
        }
    });
    let channels = SiteChannels::new(FakeCluster::new(PROD, &log, healthy), dr);

    let mut console = ScriptedConsole::new(["yes"]);
    let ProcedureOutcome::Completed(report) = h.run(Procedure::Update, &channels, &mut console) else {
        panic!("expected the update to run");
    };

    assert!(log.mutating_commands().is_empty());
    assert_eq!(report.outcome("vol1").unwrap().status, VolumeStatus::Skipped);
    assert!(console.text().contains("no active SnapMirror link found"));
    // The run itself still counts as performed.
    assert_eq!(h.store.try_load().unwrap().entries("APP1").len(), 1);
}

#[test]
fn test_stale_snapshot_warning_gets_exactly_one_yes() {
    let log = EventLog::default();
    let dr = FakeCluster::new(DR, &log, |_| {
        Reply::prompting(
            "Warning: All data newer than Snapshot copy snapmirror.1234 on volume svm_dr:vol1 will be deleted.\n\
             Do you want to continue? {y|n}: ",
            "\nOperation succeeded: snapmirror resync for the relationship with destination \"svm_dr:vol1\".\n",
        )
    });

    let output = actions::apply(dr.as_ref(), "svm_dr", "vol1", "resync").unwrap();
    assert!(output.confirmed_warning);
    assert_eq!(log.answers(), vec!["y".to_string()]);
    assert!(output.success_line().unwrap().starts_with("Operation succeeded"));
}

#[test]
fn test_no_warning_means_no_answer() {
    let log = EventLog::default();
    let dr = FakeCluster::new(DR, &log, |_| Reply::succeeded());

    let output = actions::apply(dr.as_ref(), "svm_dr", "vol1", "resync").unwrap();
    assert!(!output.confirmed_warning);
    assert!(log.answers().is_empty());
}

#[test]
fn test_verb_with_error_text_fails() {
    let log = EventLog::default();
    let dr = FakeCluster::new(DR, &log, |_| Reply::err("Error: command failed: Relationship is busy.\nMore text\n"));
    let err = actions::apply(dr.as_ref(), "svm_dr", "vol1", "break").unwrap_err();
    assert_eq!(err.to_string(), "Error: command failed: Relationship is busy.");
}

#[test]
fn test_queued_verb_is_not_a_failure() {
    let log = EventLog::default();
    let dr = FakeCluster::new(DR, &log, |_| {
        Reply::ok("Operation is queued: snapmirror update of destination \"svm_dr:vol1\".\n")
    });
    let output = actions::apply(dr.as_ref(), "svm_dr", "vol1", "update").unwrap();
    assert!(!output.is_marked_succeeded());
    assert!(output.success_line().is_none());
}

#[test]
fn test_stale_snapshot_prompt_after_answer_window_is_named() {
    let log = EventLog::default();
    let dr = FakeCluster::new(DR, &log, |_| {
        Reply::late(
            "Warning: All data newer than Snapshot copy snapmirror.1234 on volume svm_dr:vol1 will be deleted.\n\
             Do you want to continue? {y|n}: ",
            "Error: command failed: operation cancelled.\n",
        )
    });

    let err = actions::apply(dr.as_ref(), "svm_dr", "vol1", "resync").unwrap_err();
    assert_eq!(
        err,
        actions::ActionError::LatePrompt {
            verb: "resync".to_string(),
            volume: "vol1".to_string(),
        }
    );
    assert!(err.to_string().contains("stale snapshot prompt arrived too late"));
    assert!(log.answers().is_empty());
}

#[test]
fn test_poller_inspects_n_plus_one_times() {
    const N: usize = 3;
    let log = EventLog::default();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let dr = FakeCluster::new(DR, &log, move |_| {
        let seen = counter.fetch_add(1, Ordering::SeqCst);
        let status = if seen < N { "Transferring" } else { "idle" };
        Reply::ok(show_line("svm_prod:vol1", "svm_dr:vol1", "Snapmirrored", status))
    });

    let outcome = actions::await_status(dr.as_ref(), "svm_dr", "vol1", "Idle", &fast_poll());
    assert_eq!(outcome, Convergence::Reached);
    assert_eq!(calls.load(Ordering::SeqCst), N + 1);
}

#[test]
fn test_poller_times_out() {
    let log = EventLog::default();
    let dr = FakeCluster::new(DR, &log, |_| {
        Reply::ok(show_line("svm_prod:vol1", "svm_dr:vol1", "Snapmirrored", "Transferring"))
    });
    let policy = PollPolicy {
        interval: std::time::Duration::from_millis(5),
        timeout: std::time::Duration::from_millis(30),
    };
    let outcome = actions::await_status(dr.as_ref(), "svm_dr", "vol1", "Quiesced", &policy);
    assert_eq!(
        outcome,
        Convergence::TimedOut { last_status: "Transferring".to_string() }
    );
}

#[test]
fn test_recovery_end_to_end() {
    let h = Harness::new(APP1_YAML);
    let log = EventLog::default();
    let channels = SiteChannels::new(FakeCluster::new(PROD, &log, healthy), converging_dr(&log));

    let mut console = ScriptedConsole::new(["yes"]);
    let ProcedureOutcome::Completed(report) = h.run(Procedure::Recovery, &channels, &mut console) else {
        panic!("expected recovery to run");
    };
    assert!(report.all_succeeded(), "{}", report);

    assert_eq!(
        log.commands(),
        vec![
            cmd(DR, "snapmirror update -destination-path svm_dr:vol1"),
            cmd(DR, &show("svm_dr", "vol1")),
            cmd(DR, &show("svm_dr", "vol1")),
            cmd(DR, "snapmirror quiesce -destination-path svm_dr:vol1"),
            cmd(DR, &show("svm_dr", "vol1")),
            cmd(DR, "snapmirror break -destination-path svm_dr:vol1"),
            cmd(PROD, "volume unmount -vserver svm_prod -volume vol1"),
            cmd(PROD, "volume offline -vserver svm_prod -volume vol1"),
            cmd(DR, "volume mount -vserver svm_dr -volume vol1 -junction-path /vol1"),
            cmd(DR, "cifs share create -vserver svm_dr -share-name share1 -path /vol1"),
        ]
    );

    let history = h.store.try_load().unwrap();
    let entries = history.entries("APP1");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action, "recovery");
    assert_eq!(entries[0].user, "jdoe");
}

#[test]
fn test_recovery_continues_after_queued_update() {
    let h = Harness::new(APP1_YAML);
    let log = EventLog::default();
    let dr = converging_dr_answering_update(&log, || {
        Reply::ok("Operation is queued: snapmirror update of destination \"svm_dr:vol1\".\n")
    });
    let channels = SiteChannels::new(FakeCluster::new(PROD, &log, healthy), dr);

    let mut console = ScriptedConsole::new(["yes"]);
    let ProcedureOutcome::Completed(report) = h.run(Procedure::Recovery, &channels, &mut console) else {
        panic!("expected recovery to run");
    };
    assert!(report.all_succeeded(), "{}", report);
    let outcome = report.outcome("vol1").unwrap();
    assert_eq!(outcome.status, VolumeStatus::Succeeded);
    assert!(outcome.notes.iter().any(|n| n.contains("verify manually")));

    assert_eq!(
        log.mutating_commands(),
        vec![
            cmd(DR, "snapmirror update -destination-path svm_dr:vol1"),
            cmd(DR, "snapmirror quiesce -destination-path svm_dr:vol1"),
            cmd(DR, "snapmirror break -destination-path svm_dr:vol1"),
            cmd(PROD, "volume unmount -vserver svm_prod -volume vol1"),
            cmd(PROD, "volume offline -vserver svm_prod -volume vol1"),
            cmd(DR, "volume mount -vserver svm_dr -volume vol1 -junction-path /vol1"),
            cmd(DR, "cifs share create -vserver svm_dr -share-name share1 -path /vol1"),
        ]
    );
    assert!(!console.text().contains("failed earlier"));
    assert_eq!(h.store.try_load().unwrap().entries("APP1")[0].action, "recovery");
}

#[test]
fn test_recovery_creates_one_share_per_qtree() {
    let h = Harness::new(QTREE_YAML);
    let log = EventLog::default();
    let channels = SiteChannels::new(FakeCluster::new(PROD, &log, healthy), converging_dr(&log));

    let mut console = ScriptedConsole::new(["yes"]);
    h.run(Procedure::Recovery, &channels, &mut console);

    let creates: Vec<String> = log
        .commands()
        .into_iter()
        .map(|(_, c)| c)
        .filter(|c| c.starts_with("cifs share create"))
        .collect();
    assert_eq!(
        creates,
        vec![
            "cifs share create -vserver svm_dr -share-name q1share -path /vol2/q1".to_string(),
            "cifs share create -vserver svm_dr -share-name q2share -path /vol2/q2".to_string(),
        ]
    );
}

#[test]
fn test_break_failure_on_one_volume_leaves_the_others() {
    let yaml = "\
- app_name: APP3
  prod_cluster: prod-a.corp.example
  dr_cluster: dr-a.corp.example
  prod_vserver: svm_prod
  dr_vserver: svm_dr
  volume_names:
    - volume_name: vol1
    - volume_name: vol2
";
    let h = Harness::new(yaml);
    let log = EventLog::default();
    let dr = FakeCluster::new(DR, &log, |command| {
        if command == "snapmirror break -destination-path svm_dr:vol1" {
            Reply::err("Error: command failed: Relationship is busy.\n")
        } else {
            healthy(command)
        }
    });
    let channels = SiteChannels::new(FakeCluster::new(PROD, &log, healthy), dr);

    let mut console = ScriptedConsole::new(["yes"]);
    let ProcedureOutcome::Completed(report) = h.run(Procedure::Break, &channels, &mut console) else {
        panic!("expected break to run");
    };
    assert!(matches!(
        report.outcome("vol1").unwrap().status,
        VolumeStatus::Failed { .. }
    ));
    assert_eq!(report.outcome("vol2").unwrap().status, VolumeStatus::Succeeded);
    assert!(console.text().contains("Relationship is busy."));
    // Partial failure is still recorded.
    assert_eq!(h.store.try_load().unwrap().entries("APP3")[0].action, "break");
}

#[test]
fn test_failure_stops_remaining_steps_for_that_volume_only() {
    let yaml = "\
- app_name: APP3
  prod_cluster: prod-a.corp.example
  dr_cluster: dr-a.corp.example
  prod_vserver: svm_prod
  dr_vserver: svm_dr
  volume_names:
    - volume_name: vol1
    - volume_name: vol2
";
    let h = Harness::new(yaml);
    let log = EventLog::default();
    let prod = FakeCluster::new(PROD, &log, |command| {
        if command == "volume online -vserver svm_prod -volume vol1" {
            Reply::err("Error: volume vol1 is in use\n")
        } else {
            healthy(command)
        }
    });
    let channels = SiteChannels::new(prod, FakeCluster::new(DR, &log, healthy));

    let mut console = ScriptedConsole::new(["yes"]);
    let ProcedureOutcome::Completed(report) =
        h.run(Procedure::RestorationFlipFlop, &channels, &mut console)
    else {
        panic!("expected flip-flop to run");
    };

    let mutating: Vec<String> = log.mutating_commands().into_iter().map(|(_, c)| c).collect();
    assert!(!mutating.iter().any(|c| c.contains("-volume vol1") && !c.starts_with("volume online")));
    assert!(mutating.contains(&"volume offline -vserver svm_dr -volume vol2".to_string()));
    assert!(matches!(
        report.outcome("vol1").unwrap().status,
        VolumeStatus::Failed { ref step, .. } if step == "Bring PROD volumes online"
    ));
}

#[test]
fn test_refresh_marks_unreachable_application_as_error() {
    let yaml = "\
- app_name: APP1
  prod_cluster: prod-a.corp.example
  dr_cluster: dr-a.corp.example
  prod_vserver: svm_prod
  dr_vserver: svm_dr
  volume_names:
    - volume_name: vol1
- app_name: APP2
  prod_cluster: prod-b.corp.example
  dr_cluster: dr-b.corp.example
  prod_vserver: svm_prod_b
  dr_vserver: svm_dr_b
  volume_names:
    - volume_name: data
- app_name: APP0
  prod_cluster: prod-a.corp.example
  dr_cluster: dr-a.corp.example
  prod_vserver: svm_prod
  dr_vserver: svm_dr
  volume_names:
    - volume_name: vol9
";
    let inventory = inventory(yaml);
    let log = EventLog::default();
    let dr = FakeCluster::new(DR, &log, |command| {
        if command.contains("svm_dr:vol1 ") {
            Reply::ok(show_line("svm_prod:vol1", "svm_dr:vol1", "Snapmirrored", "Idle"))
        } else {
            Reply::ok(NO_ENTRIES)
        }
    });
    let prod = FakeCluster::new(PROD, &log, |_| Reply::ok(NO_ENTRIES));
    let pool = ConnectionPool::new(FakeConnector::new(vec![prod, dr]));

    let snapshot = session::refresh(&pool, &inventory, 4);

    let forward: Vec<(&str, &str, &str)> = snapshot
        .prod_to_dr
        .iter()
        .map(|r| (r.app.as_str(), r.volume.as_str(), r.record.state.as_str()))
        .collect();
    // APP0/vol9 has no relationship and is left out.
    assert_eq!(forward, vec![("APP1", "vol1", "Snapmirrored"), ("APP2", "data", "Error")]);
    assert!(snapshot.dr_to_prod.is_empty());
}

#[test]
fn test_refresh_keeps_application_whose_inspection_panics() {
    let yaml = "\
- app_name: APP1
  prod_cluster: prod-a.corp.example
  dr_cluster: dr-a.corp.example
  prod_vserver: svm_prod
  dr_vserver: svm_dr
  volume_names:
    - volume_name: vol1
- app_name: APP2
  prod_cluster: prod-a.corp.example
  dr_cluster: dr-a.corp.example
  prod_vserver: svm_prod
  dr_vserver: svm_dr
  volume_names:
    - volume_name: garbled
";
    let inventory = inventory(yaml);
    let log = EventLog::default();
    let dr = FakeCluster::new(DR, &log, |command| {
        if command.contains("svm_dr:garbled ") {
            panic!("unparseable reply");
        }
        Reply::ok(show_line("svm_prod:vol1", "svm_dr:vol1", "Snapmirrored", "Idle"))
    });
    let prod = FakeCluster::new(PROD, &log, |_| Reply::ok(NO_ENTRIES));
    let pool = ConnectionPool::new(FakeConnector::new(vec![prod, dr]));

    // A single worker has to survive the panic to reach the other application.
    let snapshot = session::refresh(&pool, &inventory, 1);

    let forward: Vec<(&str, &str, &str)> = snapshot
        .prod_to_dr
        .iter()
        .map(|r| (r.app.as_str(), r.volume.as_str(), r.record.state.as_str()))
        .collect();
    assert_eq!(forward, vec![("APP1", "vol1", "Snapmirrored"), ("APP2", "garbled", "Error")]);
}

#[test]
fn test_session_reports_unknown_application_and_exits_on_eof() {
    let h = Harness::new(APP1_YAML);
    let log = EventLog::default();
    let pool = ConnectionPool::new(FakeConnector::new(vec![
        FakeCluster::new(PROD, &log, healthy),
        FakeCluster::new(DR, &log, healthy),
    ]));
    let settings = Settings::default();

    let mut console = ScriptedConsole::new(["APP9", "reload"]);
    Session::new(&h.inventory, &pool, &h.store, &h.operator, &settings).run(&mut console);

    let text = console.text();
    assert!(text.contains("App 'APP9' not found in input data."));
    assert!(text.contains("NO ACTIVE PROD TO DR REPLICATION FOUND"));
    // Three refreshes: initial, after APP9, after reload.
    assert_eq!(
        console
            .prompts
            .iter()
            .filter(|p| p.starts_with("Enter the app name"))
            .count(),
        3
    );
}

#[test]
fn test_session_pass_through_is_never_recorded() {
    let h = Harness::new(APP1_YAML);
    let log = EventLog::default();
    let pool = ConnectionPool::new(FakeConnector::new(vec![
        FakeCluster::new(PROD, &log, healthy),
        FakeCluster::new(DR, &log, healthy),
    ]));
    let settings = Settings::default();

    let mut console = ScriptedConsole::new(["APP1", "abort", "APP1", "abort; rm", "quit"]);
    Session::new(&h.inventory, &pool, &h.store, &h.operator, &settings).run(&mut console);

    let text = console.text();
    assert!(text.contains("Invalid action 'abort' specified. It will not be recorded."));
    assert!(text.contains("Refusing 'abort; rm'"));
    assert_eq!(
        log.mutating_commands(),
        vec![cmd(DR, "snapmirror abort -destination-path svm_dr:vol1")]
    );
    assert!(!h.store.path().exists());
}

#[test]
fn test_session_show_details() {
    let h = Harness::new(QTREE_YAML);
    let log = EventLog::default();
    let pool = ConnectionPool::new(FakeConnector::new(vec![
        FakeCluster::new(PROD, &log, healthy),
        FakeCluster::new(DR, &log, healthy),
    ]));
    let settings = Settings::default();

    let mut console = ScriptedConsole::new(["APP2", "show details", "exit"]);
    Session::new(&h.inventory, &pool, &h.store, &h.operator, &settings).run(&mut console);

    let text = console.text();
    assert!(text.contains("App Details for APP2:"));
    assert!(text.contains("q2share"));
    assert!(log.mutating_commands().is_empty());
}
