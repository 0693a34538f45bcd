//! Type-safe vocabulary for nas-dr
//!
//! Sites, replication directions, SnapMirror verbs and the named procedures are
//! proper Rust enums so that dispatch is exhaustive and typos fail at parse time.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// One of the two sites of the DR topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
pub enum Site {
    #[strum(serialize = "prod")]
    Prod,
    #[strum(serialize = "dr")]
    Dr,
}

impl Site {
    /// The other site.
    pub const fn opposite(self) -> Self {
        match self {
            Self::Prod => Self::Dr,
            Self::Dr => Self::Prod,
        }
    }
}

/// Direction of a replica relationship.
///
/// The relationship is always queried on the cluster that owns its
/// destination: prod→DR on the DR cluster, DR→prod on the prod cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
pub enum Direction {
    #[strum(serialize = "prod-to-dr")]
    ProdToDr,
    #[strum(serialize = "dr-to-prod")]
    DrToProd,
}

impl Direction {
    /// Site holding the destination volume (where the relationship is managed).
    pub const fn destination(self) -> Site {
        match self {
            Self::ProdToDr => Site::Dr,
            Self::DrToProd => Site::Prod,
        }
    }

    /// Table heading used by the session display.
    pub const fn heading(self) -> &'static str {
        match self {
            Self::ProdToDr => "PROD TO DR",
            Self::DrToProd => "DR TO PROD",
        }
    }
}

/// SnapMirror verbs handled by the action primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum SnapmirrorVerb {
    Update,
    Quiesce,
    Break,
    Resync,
}

/// The named multi-volume procedures an operator can launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[strum(serialize_all = "kebab-case")]
pub enum Procedure {
    Update,
    Quiesce,
    Break,
    Resync,
    Recovery,
    RecoveryExtended,
    RestorationExtended,
    RestorationFlipFlop,
    RestorationPostTvt,
}

impl Procedure {
    /// Menu annotation shown next to the procedure name.
    pub const fn menu_hint(self) -> Option<&'static str> {
        match self {
            Self::RecoveryExtended => Some("#reverse-replication-post-tvt"),
            Self::RestorationFlipFlop => Some("#no-replication"),
            _ => None,
        }
    }
}

/// Menu entry that is not a procedure.
pub const SHOW_DETAILS: &str = "show details";

/// Whether `action` belongs to the recognised vocabulary.
pub fn is_recognized_action(action: &str) -> bool {
    action == SHOW_DETAILS || action.parse::<Procedure>().is_ok()
}

/// What the operator typed at the action prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuChoice {
    ShowDetails,
    Run(Procedure),
    /// Anything else; applied verbatim as a SnapMirror verb.
    PassThrough(String),
}

impl MenuChoice {
    /// Parse the operator's answer. Matching is case-sensitive.
    pub fn parse(input: &str) -> Self {
        if input == SHOW_DETAILS {
            return Self::ShowDetails;
        }
        match input.parse::<Procedure>() {
            Ok(procedure) => Self::Run(procedure),
            Err(_) => Self::PassThrough(input.to_string()),
        }
    }
}
