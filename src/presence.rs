//! Determines which clients are currently connected by comparing the last seen times of two
//! consecutive capture snapshots.
//!
//! The capture tool does not report whether a client is still connected. A client is considered
//! active if its last seen time changed since the previous run.

use clap::ValueEnum;
use serde::Deserialize;
use tracing::{debug, info};

use crate::{
    config::PresenceConfig,
    error::Error,
    snapshot::{ClientId, Snapshot},
    state::StateStore,
};

/// The clients considered active in a run, in the order they appear in the current snapshot.
pub type ActiveSet = Vec<ClientId>;

/// How to classify a client that was not part of the previous snapshot.
#[derive(ValueEnum, Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum NewClientPolicy {
    /// The client is active, it showed up during the last capture cycle.
    #[default]
    Active,
    /// The client only becomes active once its last seen time changes in a later run.
    ///
    /// An empty previous snapshot is still a baseline, so none of the current clients are active.
    Inactive,
}

/// Compares snapshots to find the active clients.
#[derive(Debug, Default, Clone, Copy)]
pub struct PresenceDiffer {
    pub new_clients: NewClientPolicy,
}

impl PresenceDiffer {
    pub fn new(new_clients: NewClientPolicy) -> Self {
        Self { new_clients }
    }

    /// Returns the clients from `current` that are considered active.
    ///
    /// Without a previous snapshot every client is active. Clients that are only in `previous`
    /// are ignored.
    pub fn diff(&self, previous: Option<&Snapshot>, current: &Snapshot) -> ActiveSet {
        let Some(previous) = previous else {
            debug!("No previous snapshot, all clients are active");
            return current.ids().cloned().collect();
        };

        let active: ActiveSet = current
            .iter()
            .filter(|(id, last_seen)| match previous.get(id) {
                Some(prev_last_seen) => {
                    debug!(
                        client = %id,
                        prev_last_seen = %prev_last_seen,
                        last_seen = %last_seen,
                        "Client previously seen"
                    );
                    prev_last_seen != *last_seen
                }
                None => {
                    debug!(
                        client = %id,
                        last_seen = %last_seen,
                        policy = ?self.new_clients,
                        "New client"
                    );
                    self.new_clients == NewClientPolicy::Active
                }
            })
            .map(|(id, _)| id.clone())
            .collect();

        debug!("Calculated active clients: {active:?}");
        active
    }
}

/// Runs one presence cycle: reads the capture export, compares it with the previous state and
/// stores it as the new state.
///
/// If the state cannot be written the run fails, but the active clients are still available in
/// [Error::SaveState].
pub fn run(config: &PresenceConfig) -> Result<ActiveSet, Error> {
    let current = Snapshot::read(&config.source_path)?;
    if current.is_empty() {
        debug!("No clients in the capture export");
    }

    let store = StateStore::new(&config.state_path);
    let previous = store.load();

    let active = PresenceDiffer::new(config.new_clients).diff(previous.as_ref(), &current);

    if let Err(source) = store.save(&current) {
        return Err(Error::SaveState {
            path: store.path().to_owned(),
            active,
            source,
        });
    }

    info!(
        clients = current.len(),
        active = active.len(),
        cold_start = previous.is_none(),
        "Presence cycle complete"
    );
    Ok(active)
}
