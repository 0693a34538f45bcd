//! nas-dr library
//!
//! Core of the SnapMirror DR console: inventory, remote channels, inspection,
//! procedures and the interactive session.

pub mod actions;
pub mod cli;
pub mod config;
pub mod console;
pub mod display;
pub mod engine;
pub mod error;
pub mod history;
pub mod inspector;
pub mod process_guard;
pub mod remote;
pub mod session;
pub mod theme;
pub mod types;

// Re-export main types for convenience
pub use config::{Application, Inventory, Settings, Volume};
pub use console::{Console, Terminal};
pub use engine::{EngineContext, ProcedureOutcome, SiteChannels, run_procedure};
pub use error::NasDrError;
pub use history::{ActionHistory, ActionLogEntry, HistoryStore, Operator};
pub use inspector::ReplicationRecord;
pub use process_guard::{ChildRegistry, CommandProcessGroup, ProcessGuard};
pub use remote::{CommandOutput, ConnectionPool, Connector, ControlChannel, PendingCommand};
pub use session::{Session, Snapshot};
pub use types::{Direction, MenuChoice, Procedure, Site, SnapmirrorVerb};
