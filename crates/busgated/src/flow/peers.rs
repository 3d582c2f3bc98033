//! Live flow peers and target selection.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Mutex;

use busgate_config::TargetSelection;
use rand::Rng;
use rand::seq::IndexedRandom;
use tracing::{debug, info};

use super::FLOW_TARGET;
use super::errors::FlowError;
use crate::sync::lock;

/// Address of a flow host on the bus: the server (unit) and the process
/// (client) within it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PeerAddress {
    /// Server identifier.
    pub unit_id: String,
    /// Process identifier within the server.
    pub client_id: String,
}

impl PeerAddress {
    /// Builds an address.
    #[must_use]
    pub fn new(unit_id: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            unit_id: unit_id.into(),
            client_id: client_id.into(),
        }
    }

    fn matches(&self, server: Option<&str>, process: Option<&str>) -> bool {
        server.is_none_or(|server| server == self.unit_id)
            && process.is_none_or(|process| process == self.client_id)
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}:{}", self.unit_id, self.client_id)
    }
}

/// Connection status change reported by the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// The peer disconnected.
    Lost,
    /// The peer connected.
    Created,
    /// The peer confirmed an existing connection.
    Confirmed,
}

/// Set of peers currently connected to the bus.
#[derive(Debug, Default)]
pub struct PeerDirectory {
    live: Mutex<BTreeSet<PeerAddress>>,
}

impl PeerDirectory {
    /// Empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies a connection status event.
    pub fn apply(&self, peer: PeerAddress, status: ConnectionStatus) {
        let mut live = lock(&self.live);
        match status {
            ConnectionStatus::Lost => {
                if live.remove(&peer) {
                    info!(target: FLOW_TARGET, peer = %peer, "peer lost");
                }
            }
            ConnectionStatus::Created | ConnectionStatus::Confirmed => {
                if live.insert(peer.clone()) {
                    info!(target: FLOW_TARGET, peer = %peer, ?status, "peer connected");
                }
            }
        }
    }

    /// Whether `peer` is connected.
    #[must_use]
    pub fn is_live(&self, peer: &PeerAddress) -> bool {
        lock(&self.live).contains(peer)
    }

    /// Connected peers in address order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<PeerAddress> {
        lock(&self.live).iter().cloned().collect()
    }

    /// Completes a possibly partial target using the thread-local RNG.
    ///
    /// # Errors
    ///
    /// See [`PeerDirectory::select_with`].
    pub fn select(
        &self,
        server: Option<&str>,
        process: Option<&str>,
        policy: TargetSelection,
    ) -> Result<PeerAddress, FlowError> {
        self.select_with(server, process, policy, &mut rand::rng())
    }

    /// Completes a possibly partial target.
    ///
    /// A fully specified target is returned as given. Otherwise the
    /// [`TargetSelection::Random`] policy picks a random live peer matching
    /// the specified half, while [`TargetSelection::Explicit`] refuses.
    ///
    /// # Errors
    ///
    /// [`FlowError::IncompleteTarget`] under the explicit policy and
    /// [`FlowError::NoPeer`] when no live peer matches.
    pub fn select_with<R: Rng + ?Sized>(
        &self,
        server: Option<&str>,
        process: Option<&str>,
        policy: TargetSelection,
        rng: &mut R,
    ) -> Result<PeerAddress, FlowError> {
        if let (Some(server), Some(process)) = (server, process) {
            return Ok(PeerAddress::new(server, process));
        }
        if policy == TargetSelection::Explicit {
            return Err(FlowError::IncompleteTarget);
        }
        let candidates: Vec<PeerAddress> = lock(&self.live)
            .iter()
            .filter(|peer| peer.matches(server, process))
            .cloned()
            .collect();
        let chosen = candidates.choose(rng).cloned().ok_or_else(|| FlowError::NoPeer {
            server: server.map(str::to_owned),
            process: process.map(str::to_owned),
        })?;
        debug!(
            target: FLOW_TARGET,
            peer = %chosen,
            candidates = candidates.len(),
            "selected flow target"
        );
        Ok(chosen)
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rstest::{fixture, rstest};

    use super::*;

    #[fixture]
    fn directory() -> PeerDirectory {
        let directory = PeerDirectory::new();
        for (unit, client) in [("s1", "p1"), ("s1", "p2"), ("s2", "p1")] {
            directory.apply(PeerAddress::new(unit, client), ConnectionStatus::Created);
        }
        directory
    }

    #[rstest]
    fn tracks_connection_events(directory: PeerDirectory) {
        directory.apply(PeerAddress::new("s1", "p2"), ConnectionStatus::Lost);
        directory.apply(PeerAddress::new("s3", "p9"), ConnectionStatus::Confirmed);
        assert_eq!(
            directory.snapshot(),
            vec![
                PeerAddress::new("s1", "p1"),
                PeerAddress::new("s2", "p1"),
                PeerAddress::new("s3", "p9"),
            ]
        );
    }

    #[rstest]
    #[case(TargetSelection::Random)]
    #[case(TargetSelection::Explicit)]
    fn full_targets_are_used_as_given(directory: PeerDirectory, #[case] policy: TargetSelection) {
        let chosen = directory
            .select(Some("elsewhere"), Some("p7"), policy)
            .expect("full target");
        assert_eq!(chosen, PeerAddress::new("elsewhere", "p7"));
    }

    #[rstest]
    #[case(Some("s1"), None)]
    #[case(None, Some("p1"))]
    #[case(None, None)]
    fn random_policy_fills_in_matching_peers(
        directory: PeerDirectory,
        #[case] server: Option<&str>,
        #[case] process: Option<&str>,
    ) {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            let chosen = directory
                .select_with(server, process, TargetSelection::Random, &mut rng)
                .expect("a live peer matches");
            assert!(chosen.matches(server, process));
            assert!(directory.is_live(&chosen));
        }
    }

    #[rstest]
    fn random_policy_without_candidates_fails(directory: PeerDirectory) {
        assert_eq!(
            directory.select(Some("s9"), None, TargetSelection::Random),
            Err(FlowError::NoPeer {
                server: Some("s9".to_owned()),
                process: None,
            })
        );
    }

    #[rstest]
    fn explicit_policy_refuses_partial_targets(directory: PeerDirectory) {
        assert_eq!(
            directory.select(Some("s1"), None, TargetSelection::Explicit),
            Err(FlowError::IncompleteTarget)
        );
    }
}
