//! Neighbor sources injected into nodes at construction.
//!
//! A node never reaches into a shared container to find its peers. It is
//! handed one of these when it is built:
//! - [`StaticNeighbors`]: a fixed adjacency list from a point-to-point topology
//! - [`GeometricNeighbors`]: a disk-overlap query against a world snapshot

use alloc::collections::BTreeSet;
use alloc::sync::Arc;
use alloc::vec::Vec;

use crate::locator::{neighbors_of, NodeLocation};
use crate::traits::NeighborSource;
use crate::types::NodeId;

/// Fixed neighbor set supplied by the topology.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticNeighbors {
    peers: BTreeSet<NodeId>,
}

impl StaticNeighbors {
    pub fn new(peers: impl IntoIterator<Item = NodeId>) -> Self {
        Self {
            peers: peers.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

impl NeighborSource for StaticNeighbors {
    fn neighbors(&self, me: NodeId) -> BTreeSet<NodeId> {
        let mut peers = self.peers.clone();
        peers.remove(&me);
        peers
    }
}

/// Disk-overlap neighbors of one node within a shared, read-only world.
///
/// The neighbor set is recomputed on every query. Positions never change
/// during a run, so repeated queries give the same answer.
#[derive(Debug, Clone)]
pub struct GeometricNeighbors {
    me: NodeLocation,
    world: Arc<[NodeLocation]>,
}

impl GeometricNeighbors {
    pub fn new(me: NodeLocation, world: Arc<[NodeLocation]>) -> Self {
        Self { me, world }
    }

    /// Build from any collection of placed nodes.
    pub fn from_locations(me: NodeLocation, world: Vec<NodeLocation>) -> Self {
        Self::new(me, world.into())
    }

    pub fn location(&self) -> &NodeLocation {
        &self.me
    }
}

impl NeighborSource for GeometricNeighbors {
    fn neighbors(&self, _me: NodeId) -> BTreeSet<NodeId> {
        neighbors_of(&self.me, &self.world[..])
    }
}
