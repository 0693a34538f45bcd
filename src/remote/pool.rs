//! One channel per cluster, opened on first use and shared for the session.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use super::{ControlChannel, Connector};
use crate::error::{NasDrError, Result};

/// Session-scoped cache of control channels keyed by cluster host.
///
/// Opening happens under the pool lock, so two workers asking for the same
/// cluster at once still produce a single connection (and a single password
/// prompt).
pub struct ConnectionPool {
    connector: Box<dyn Connector>,
    channels: Mutex<HashMap<String, Arc<dyn ControlChannel>>>,
}

impl ConnectionPool {
    pub fn new(connector: impl Connector + 'static) -> Self {
        Self {
            connector: Box::new(connector),
            channels: Mutex::new(HashMap::new()),
        }
    }

    /// The open channel for `cluster`, connecting if needed.
    pub fn channel(&self, cluster: &str) -> Result<Arc<dyn ControlChannel>> {
        let mut channels = self
            .channels
            .lock()
            .map_err(|_| NasDrError::state("connection pool lock poisoned"))?;

        if let Some(channel) = channels.get(cluster) {
            return Ok(Arc::clone(channel));
        }

        debug!(cluster, "No cached channel, connecting");
        let channel = self.connector.connect(cluster)?;
        channels.insert(cluster.to_string(), Arc::clone(&channel));
        Ok(channel)
    }

    /// Open channels for every cluster up front.
    pub fn open_all<'a>(&self, clusters: impl IntoIterator<Item = &'a str>) -> Result<()> {
        for cluster in clusters {
            self.channel(cluster)?;
        }
        Ok(())
    }

    pub fn open_count(&self) -> usize {
        self.channels.lock().map(|c| c.len()).unwrap_or(0)
    }

    /// Close every open channel. Failures are logged, not returned.
    pub fn close_all(&self) {
        let drained: Vec<(String, Arc<dyn ControlChannel>)> = match self.channels.lock() {
            Ok(mut channels) => channels.drain().collect(),
            Err(_) => return,
        };
        for (cluster, channel) in drained {
            if let Err(e) = channel.close() {
                warn!(cluster = %cluster, error = %e, "Failed to close channel");
            }
        }
    }
}

impl Drop for ConnectionPool {
    fn drop(&mut self) {
        self.close_all();
    }
}
