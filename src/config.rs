//! Inventory and runtime settings.
//!
//! The inventory file lists every DR-protected application with its two
//! clusters, two vservers and replicated volumes. It is read once at startup
//! and never mutated. Loosely shaped YAML records are resolved into the typed
//! `Volume` variant here, so nothing downstream re-checks optional keys.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::NasDrError;
use crate::types::Site;

/// A named sub-directory of a volume with its own CIFS share.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Qtree {
    pub name: String,
    pub share: String,
}

/// A replicated volume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Volume {
    /// Volume shared (or not) at its own junction path.
    Direct { name: String, share: Option<String> },
    /// Volume whose shares live on qtrees; the volume itself is never shared.
    WithQtrees { name: String, qtrees: Vec<Qtree> },
}

/// A share bound to a path beneath a volume's junction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareTarget {
    pub share: String,
    /// Absolute namespace path, `/vol` or `/vol/qtree`.
    pub path: String,
    pub qtree: Option<String>,
}

impl Volume {
    pub fn name(&self) -> &str {
        match self {
            Self::Direct { name, .. } | Self::WithQtrees { name, .. } => name,
        }
    }

    /// Shares associated with this volume, qtrees first.
    pub fn share_targets(&self) -> Vec<ShareTarget> {
        match self {
            Self::WithQtrees { name, qtrees } => qtrees
                .iter()
                .map(|q| ShareTarget {
                    share: q.share.clone(),
                    path: format!("/{}/{}", name, q.name),
                    qtree: Some(q.name.clone()),
                })
                .collect(),
            Self::Direct { name, share: Some(share) } => vec![ShareTarget {
                share: share.clone(),
                path: format!("/{}", name),
                qtree: None,
            }],
            Self::Direct { share: None, .. } => Vec::new(),
        }
    }
}

/// A DR-protected application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Application {
    pub name: String,
    pub prod_cluster: String,
    pub dr_cluster: String,
    pub prod_vserver: String,
    pub dr_vserver: String,
    pub details: Option<String>,
    pub volumes: Vec<Volume>,
}

impl Application {
    pub fn vserver(&self, site: Site) -> &str {
        match site {
            Site::Prod => &self.prod_vserver,
            Site::Dr => &self.dr_vserver,
        }
    }
}

/// Short upper-case cluster label (`dr-a.corp.example` → `DR-A`).
pub fn cluster_label(cluster: &str) -> String {
    cluster.split('.').next().unwrap_or(cluster).to_uppercase()
}

// ============================================================================
// On-disk shape
// ============================================================================

#[derive(Debug, Deserialize, Serialize)]
struct RawQtree {
    qtree_name: String,
    share_name: String,
}

#[derive(Debug, Deserialize, Serialize)]
struct RawVolume {
    volume_name: String,
    #[serde(default)]
    share_name: Option<String>,
    #[serde(default)]
    qtrees: Option<Vec<RawQtree>>,
}

#[derive(Debug, Deserialize, Serialize)]
struct RawApplication {
    app_name: String,
    prod_cluster: String,
    dr_cluster: String,
    prod_vserver: String,
    dr_vserver: String,
    #[serde(default)]
    details: Option<String>,
    volume_names: Vec<RawVolume>,
}

impl From<RawVolume> for Volume {
    fn from(raw: RawVolume) -> Self {
        // A qtrees key wins over share_name, even when the list is empty.
        match raw.qtrees {
            Some(qtrees) => Volume::WithQtrees {
                name: raw.volume_name,
                qtrees: qtrees
                    .into_iter()
                    .map(|q| Qtree { name: q.qtree_name, share: q.share_name })
                    .collect(),
            },
            None => Volume::Direct {
                name: raw.volume_name,
                share: raw.share_name.filter(|s| !s.trim().is_empty()),
            },
        }
    }
}

impl From<RawApplication> for Application {
    fn from(raw: RawApplication) -> Self {
        Self {
            name: raw.app_name,
            prod_cluster: raw.prod_cluster,
            dr_cluster: raw.dr_cluster,
            prod_vserver: raw.prod_vserver,
            dr_vserver: raw.dr_vserver,
            details: raw.details,
            volumes: raw.volume_names.into_iter().map(Volume::from).collect(),
        }
    }
}

// ============================================================================
// Inventory
// ============================================================================

/// The full list of applications, in file order.
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    pub applications: Vec<Application>,
}

impl Inventory {
    /// Load an inventory from a YAML file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read inventory from {:?}", path.as_ref()))?;
        Self::from_yaml(&content)
            .with_context(|| format!("Failed to parse inventory {:?}", path.as_ref()))
    }

    /// Parse an inventory from YAML text.
    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let raw: Option<Vec<RawApplication>> =
            serde_yaml::from_str(content).context("Inventory is not a list of applications")?;
        let applications = raw
            .unwrap_or_default()
            .into_iter()
            .map(Application::from)
            .collect();
        Ok(Self { applications })
    }

    pub fn find(&self, name: &str) -> Option<&Application> {
        self.applications.iter().find(|app| app.name == name)
    }

    /// Every distinct cluster referenced by the inventory.
    pub fn clusters(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.applications
            .iter()
            .flat_map(|app| [app.prod_cluster.as_str(), app.dr_cluster.as_str()])
            .filter(|c| seen.insert(*c))
            .collect()
    }

    /// Validate the inventory.
    pub fn validate(&self) -> std::result::Result<(), NasDrError> {
        if self.applications.is_empty() {
            return Err(NasDrError::config("Inventory contains no applications"));
        }

        let mut names = HashSet::new();
        for app in &self.applications {
            if !names.insert(app.name.as_str()) {
                return Err(NasDrError::config(format!(
                    "Duplicate app_name '{}'",
                    app.name
                )));
            }
            validate_token("app_name", &app.name)?;
            validate_token("prod_cluster", &app.prod_cluster)?;
            validate_token("dr_cluster", &app.dr_cluster)?;
            validate_token("prod_vserver", &app.prod_vserver)?;
            validate_token("dr_vserver", &app.dr_vserver)?;

            if app.volumes.is_empty() {
                return Err(NasDrError::config(format!(
                    "Application '{}' has no volumes",
                    app.name
                )));
            }

            for volume in &app.volumes {
                validate_token("volume_name", volume.name())?;
                if let Volume::WithQtrees { qtrees, .. } = volume {
                    for qtree in qtrees {
                        validate_token("qtree_name", &qtree.name)?;
                        validate_token("share_name", &qtree.share)?;
                    }
                }
                if let Volume::Direct { share: Some(share), .. } = volume {
                    validate_token("share_name", share)?;
                }
            }
        }

        Ok(())
    }
}

/// Identifiers are interpolated into remote command lines, so they must be
/// single non-empty tokens.
fn validate_token(field: &str, value: &str) -> std::result::Result<(), NasDrError> {
    if value.trim().is_empty() {
        return Err(NasDrError::config(format!("{} must not be empty", field)));
    }
    if value.chars().any(|c| c.is_whitespace() || matches!(c, ';' | '|' | '&' | '`' | '"' | '\'')) {
        return Err(NasDrError::config(format!(
            "{} '{}' contains whitespace or shell metacharacters",
            field, value
        )));
    }
    Ok(())
}

// ============================================================================
// Runtime settings
// ============================================================================

/// Knobs for polling, fan-out and remote access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Delay between two convergence polls.
    pub poll_interval: Duration,
    /// Give up waiting for a status after this long.
    pub poll_timeout: Duration,
    /// Upper bound on concurrent inspection workers.
    pub max_workers: usize,
    /// How long to wait for more output before treating a command as blocked
    /// on an interactive prompt.
    pub prompt_quiet_period: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            poll_timeout: Duration::from_secs(30 * 60),
            max_workers: 8,
            prompt_quiet_period: Duration::from_millis(1500),
        }
    }
}
