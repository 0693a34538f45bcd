//! Workflow engine: plan, confirm, execute, record.
//!
//! - [`plan`]: the operation/step/plan types and their rendering
//! - [`procedures`]: one plan builder per procedure
//! - [`executor`]: walks a confirmed plan against the clusters

pub mod executor;
pub mod plan;
pub mod procedures;

use std::sync::Arc;

use tracing::{info, warn};

use crate::actions::PollPolicy;
use crate::config::Application;
use crate::console::Console;
use crate::error::Result;
use crate::history::{HistoryStore, Operator};
use crate::remote::{ConnectionPool, ControlChannel};
use crate::theme::{Tone, paint};
use crate::types::{Procedure, Site};

pub use executor::{ExecutionReport, VolumeOutcome, VolumeStatus};
pub use plan::{ProcedurePlan, RemoteOp, Step, StepAction, StepEntry};

/// The two channels a procedure talks to.
#[derive(Clone)]
pub struct SiteChannels {
    pub prod: Arc<dyn ControlChannel>,
    pub dr: Arc<dyn ControlChannel>,
}

impl SiteChannels {
    pub fn new(prod: Arc<dyn ControlChannel>, dr: Arc<dyn ControlChannel>) -> Self {
        Self { prod, dr }
    }

    /// Channels for `app`'s clusters from the session pool.
    pub fn open(pool: &ConnectionPool, app: &Application) -> Result<Self> {
        Ok(Self {
            prod: pool.channel(&app.prod_cluster)?,
            dr: pool.channel(&app.dr_cluster)?,
        })
    }

    pub fn get(&self, site: Site) -> &dyn ControlChannel {
        match site {
            Site::Prod => self.prod.as_ref(),
            Site::Dr => self.dr.as_ref(),
        }
    }
}

/// Everything a procedure run needs besides the application.
pub struct EngineContext<'a> {
    pub channels: &'a SiteChannels,
    pub history: &'a HistoryStore,
    pub operator: &'a Operator,
    pub poll: PollPolicy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcedureOutcome {
    /// The operator declined; nothing was changed or recorded.
    Aborted,
    Completed(ExecutionReport),
}

/// Whether a confirmation answer means yes.
///
/// The answer arrives with its line terminator already stripped; it is
/// lowercased and must then be exactly `yes`.
pub fn is_confirmed(answer: &str) -> bool {
    answer.to_lowercase() == "yes"
}

/// Plan `procedure` for `app`, show the plan, ask, execute, record.
///
/// History is appended once the plan has been walked, even if some volumes
/// failed; an abort records nothing. A history write failure is reported on
/// the console but does not turn a completed run into an error.
pub fn run_procedure(
    procedure: Procedure,
    app: &Application,
    ctx: &EngineContext<'_>,
    console: &mut dyn Console,
) -> ProcedureOutcome {
    info!(app = %app.name, %procedure, "Planning procedure");
    let plan = procedures::build_plan(procedure, app, ctx.channels);

    console.print("");
    for line in plan.summary().lines() {
        console.print(line);
    }

    let question = paint(
        &format!("\nDo you want to proceed with the {} process (yes/no)? ", procedure),
        Tone::Info,
    );
    let answer = console.prompt(&question).unwrap_or_default();
    if !is_confirmed(&answer) {
        info!(app = %app.name, %procedure, "Procedure aborted by operator");
        console.print(&paint(&format!("{} process aborted.", procedure), Tone::Error));
        return ProcedureOutcome::Aborted;
    }

    let report = executor::execute(&plan, ctx.channels, &ctx.poll, console);

    if let Err(e) = ctx
        .history
        .append(&app.name, ctx.operator.entry(&procedure.to_string()))
    {
        warn!(error = %e, "Could not record action");
        console.print(&paint(
            &format!("{} ran but was not recorded: {}", procedure, e),
            Tone::Error,
        ));
    }

    console.print("");
    for line in report.to_string().lines() {
        let tone = if line.contains("FAILED") { Tone::Error } else { Tone::Success };
        console.print(&paint(line, tone));
    }
    ProcedureOutcome::Completed(report)
}
