//! Network topology and link properties.
//!
//! Links are undirected. A link can be inactive (partitioned or disabled) or
//! lossy; either way a send over it never reaches the other end.

use std::collections::BTreeSet;

use floodnet::{Duration, NodeId};
use hashbrown::HashMap;

use crate::world::World;

/// Properties of a link between two nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    /// Packet loss rate (0.0 to 1.0).
    pub loss_rate: f64,
    /// Propagation delay.
    pub delay: Duration,
    /// Whether the link is currently up.
    pub active: bool,
}

impl Default for Link {
    fn default() -> Self {
        Self {
            loss_rate: 0.0,
            delay: Duration::from_millis(1),
            active: true,
        }
    }
}

impl Link {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_loss_rate(mut self, rate: f64) -> Self {
        self.loss_rate = rate.clamp(0.0, 1.0);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }
}

/// Connectivity between nodes.
#[derive(Debug, Clone, Default)]
pub struct Topology {
    /// Keyed by (lower id, higher id).
    links: HashMap<(NodeId, NodeId), Link>,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every pair of nodes linked.
    pub fn fully_connected(nodes: &[NodeId]) -> Self {
        let mut topo = Self::new();
        for (i, &a) in nodes.iter().enumerate() {
            for &b in nodes.iter().skip(i + 1) {
                topo.add_link(a, b, Link::default());
            }
        }
        topo
    }

    /// Each node linked only to the next one in the list.
    pub fn chain(nodes: &[NodeId]) -> Self {
        let mut topo = Self::new();
        for window in nodes.windows(2) {
            topo.add_link(window[0], window[1], Link::default());
        }
        topo
    }

    /// First node is the hub, linked to all others.
    pub fn star(nodes: &[NodeId]) -> Self {
        let mut topo = Self::new();
        let Some((&hub, spokes)) = nodes.split_first() else {
            return topo;
        };
        for &spoke in spokes {
            topo.add_link(hub, spoke, Link::default());
        }
        topo
    }

    /// Links from an explicit adjacency list. Listing an edge from both ends
    /// is fine; self-loops are ignored.
    pub fn from_adjacency<I, P>(adjacency: I) -> Self
    where
        I: IntoIterator<Item = (NodeId, P)>,
        P: IntoIterator<Item = NodeId>,
    {
        let mut topo = Self::new();
        for (node, peers) in adjacency {
            for peer in peers {
                if peer != node {
                    topo.add_link(node, peer, Link::default());
                }
            }
        }
        topo
    }

    /// A link between every pair of nodes whose disks overlap.
    pub fn from_world(world: &World) -> Self {
        let mut topo = Self::new();
        for location in world.locations() {
            for peer in world.neighbors_of(location.id) {
                if location.id < peer {
                    topo.add_link(location.id, peer, Link::default());
                }
            }
        }
        topo
    }

    /// Add or replace the link between `a` and `b`.
    pub fn add_link(&mut self, a: NodeId, b: NodeId, link: Link) {
        self.links.insert(Self::canonical_pair(a, b), link);
    }

    pub fn get_link(&self, a: NodeId, b: NodeId) -> Option<&Link> {
        self.links.get(&Self::canonical_pair(a, b))
    }

    pub fn get_link_mut(&mut self, a: NodeId, b: NodeId) -> Option<&mut Link> {
        self.links.get_mut(&Self::canonical_pair(a, b))
    }

    /// Link exists and is active.
    pub fn is_connected(&self, a: NodeId, b: NodeId) -> bool {
        self.get_link(a, b).is_some_and(|link| link.active)
    }

    /// Nodes reachable from `node` over active links, in id order.
    pub fn neighbors(&self, node: NodeId) -> BTreeSet<NodeId> {
        self.links
            .iter()
            .filter(|(_, link)| link.active)
            .filter_map(|(&(a, b), _)| match node {
                n if n == a => Some(b),
                n if n == b => Some(a),
                _ => None,
            })
            .collect()
    }

    /// Every node that appears on any link, in id order.
    pub fn nodes(&self) -> BTreeSet<NodeId> {
        self.links.keys().flat_map(|&(a, b)| [a, b]).collect()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// Disable all links crossing between partition groups.
    ///
    /// Nodes not listed in any group form one implicit group of their own.
    pub fn partition(&mut self, groups: &[Vec<NodeId>]) {
        for (&(a, b), link) in self.links.iter_mut() {
            let a_group = groups.iter().position(|g| g.contains(&a));
            let b_group = groups.iter().position(|g| g.contains(&b));
            if a_group != b_group {
                link.active = false;
            }
        }
    }

    /// Re-enable all links.
    pub fn heal(&mut self) {
        for link in self.links.values_mut() {
            link.active = true;
        }
    }

    /// Disable every link touching `node`.
    pub fn isolate(&mut self, node: NodeId) {
        for (&(a, b), link) in self.links.iter_mut() {
            if a == node || b == node {
                link.active = false;
            }
        }
    }

    pub fn set_global_loss_rate(&mut self, rate: f64) {
        let rate = rate.clamp(0.0, 1.0);
        for link in self.links.values_mut() {
            link.loss_rate = rate;
        }
    }

    pub fn set_global_delay(&mut self, delay: Duration) {
        for link in self.links.values_mut() {
            link.delay = delay;
        }
    }

    fn canonical_pair(a: NodeId, b: NodeId) -> (NodeId, NodeId) {
        if a < b {
            (a, b)
        } else {
            (b, a)
        }
    }
}
