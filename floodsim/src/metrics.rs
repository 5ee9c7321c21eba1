//! Metrics collection for simulation analysis.

use std::collections::BTreeSet;

use floodnet::{Duration, NodeId, NodeMetrics, PacketKey, Timestamp};
use hashbrown::HashMap;

/// One packet accepted by a sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkDelivery {
    pub sink: NodeId,
    /// Neighbor the packet arrived from.
    pub from: NodeId,
    pub key: PacketKey,
    pub hop_count: u8,
    pub created_at: Timestamp,
    pub delivered_at: Timestamp,
}

impl SinkDelivery {
    /// Time from origination to delivery.
    pub fn latency(&self) -> Duration {
        self.delivered_at - self.created_at
    }
}

/// Per-node counters at a point in time.
#[derive(Debug, Clone)]
pub struct NetworkSnapshot {
    pub time: Timestamp,
    pub nodes: HashMap<NodeId, NodeMetrics>,
}

impl NetworkSnapshot {
    pub fn new(time: Timestamp) -> Self {
        Self {
            time,
            nodes: HashMap::new(),
        }
    }

    pub fn record_node(&mut self, node_id: NodeId, metrics: NodeMetrics) {
        self.nodes.insert(node_id, metrics);
    }

    pub fn node(&self, node_id: NodeId) -> Option<&NodeMetrics> {
        self.nodes.get(&node_id)
    }

    /// Counters summed over every node.
    pub fn totals(&self) -> NodeMetrics {
        self.nodes
            .values()
            .fold(NodeMetrics::default(), |mut acc, m| {
                acc.originated += m.originated;
                acc.received += m.received;
                acc.accepted += m.accepted;
                acc.sent += m.sent;
                acc.forwarded += m.forwarded;
                acc.dropped_hop_limit += m.dropped_hop_limit;
                acc.dropped_duplicate += m.dropped_duplicate;
                acc.delivered += m.delivered;
                acc
            })
    }
}

/// Network-wide counters collected by the simulator.
#[derive(Debug, Clone, Default)]
pub struct SimMetrics {
    pub packets_originated: u64,
    /// Copies handed to a link.
    pub packets_sent: u64,
    /// Copies that reached a node.
    pub packets_delivered: u64,
    /// Copies lost to link loss, a down link or a missing recipient.
    pub packets_lost: u64,
    /// Originations run, from the timer or triggered manually.
    pub timer_fires: u64,
    /// Timer fires skipped because they were superseded or cancelled.
    pub stale_timer_fires: u64,
    /// Number of nodes that accepted each originated packet.
    pub reach: HashMap<PacketKey, u32>,
    pub sink_deliveries: Vec<SinkDelivery>,
    pub snapshots: Vec<NetworkSnapshot>,
}

impl SimMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_origination(&mut self, key: PacketKey) {
        self.packets_originated += 1;
        self.reach.entry(key).or_insert(0);
    }

    pub fn record_acceptance(&mut self, key: PacketKey) {
        *self.reach.entry(key).or_insert(0) += 1;
    }

    pub fn add_snapshot(&mut self, snapshot: NetworkSnapshot) {
        self.snapshots.push(snapshot);
    }

    pub fn latest_snapshot(&self) -> Option<&NetworkSnapshot> {
        self.snapshots.last()
    }

    /// How many nodes accepted `key`; zero if it was never seen.
    pub fn reach(&self, key: &PacketKey) -> u32 {
        self.reach.get(key).copied().unwrap_or(0)
    }

    /// Distinct packets that reached at least one sink.
    pub fn delivered_packets(&self) -> BTreeSet<PacketKey> {
        self.sink_deliveries.iter().map(|d| d.key).collect()
    }

    /// Mean origination-to-sink latency over all sink deliveries.
    pub fn mean_latency(&self) -> Option<Duration> {
        if self.sink_deliveries.is_empty() {
            return None;
        }
        let total: u64 = self
            .sink_deliveries
            .iter()
            .map(|d| d.latency().as_millis())
            .sum();
        Some(Duration::from_millis(
            total / self.sink_deliveries.len() as u64,
        ))
    }
}

/// Result of running a simulation.
#[derive(Debug, Clone)]
pub struct SimulationResult {
    pub end_time: Timestamp,
    pub metrics: SimMetrics,
    /// Whether the run stopped because no events were left.
    pub queue_exhausted: bool,
    /// Nodes alive at the end of the run.
    pub node_count: usize,
}

impl SimulationResult {
    /// Fraction of the other nodes that accepted `key`, in `[0, 1]`.
    pub fn coverage(&self, key: &PacketKey) -> f64 {
        if self.node_count <= 1 {
            return 0.0;
        }
        let others = (self.node_count - 1) as f64;
        (self.metrics.reach(key) as f64 / others).min(1.0)
    }

    /// Mean coverage over every originated packet.
    pub fn mean_coverage(&self) -> f64 {
        if self.metrics.reach.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.metrics.reach.keys().map(|k| self.coverage(k)).sum();
        sum / self.metrics.reach.len() as f64
    }

    /// Fraction of originated packets that reached any sink.
    pub fn delivery_ratio(&self) -> f64 {
        if self.metrics.packets_originated == 0 {
            return 0.0;
        }
        self.metrics.delivered_packets().len() as f64 / self.metrics.packets_originated as f64
    }

    /// Counters of `node` from the final snapshot.
    pub fn node_metrics(&self, node: NodeId) -> Option<&NodeMetrics> {
        self.metrics
            .latest_snapshot()
            .and_then(|s| s.node(node))
    }

    /// Counters summed over all nodes from the final snapshot.
    pub fn totals(&self) -> NodeMetrics {
        self.metrics
            .latest_snapshot()
            .map(|s| s.totals())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delivery(key: PacketKey, created: u64, delivered: u64) -> SinkDelivery {
        SinkDelivery {
            sink: 0,
            from: 1,
            key,
            hop_count: 1,
            created_at: Timestamp::from_millis(created),
            delivered_at: Timestamp::from_millis(delivered),
        }
    }

    #[test]
    fn test_reach_tracking() {
        let mut metrics = SimMetrics::new();
        let a = PacketKey::new(1, 0);
        let b = PacketKey::new(2, 0);

        metrics.record_origination(a);
        metrics.record_origination(b);
        metrics.record_acceptance(a);
        metrics.record_acceptance(a);

        assert_eq!(metrics.packets_originated, 2);
        assert_eq!(metrics.reach(&a), 2);
        assert_eq!(metrics.reach(&b), 0);
        assert_eq!(metrics.reach(&PacketKey::new(9, 9)), 0);
    }

    #[test]
    fn test_latency_and_delivered_packets() {
        let mut metrics = SimMetrics::new();
        assert_eq!(metrics.mean_latency(), None);

        let key = PacketKey::new(3, 1);
        metrics.sink_deliveries.push(delivery(key, 100, 130));
        metrics.sink_deliveries.push(delivery(key, 100, 170));

        assert_eq!(metrics.mean_latency(), Some(Duration::from_millis(50)));
        assert_eq!(metrics.delivered_packets(), BTreeSet::from([key]));
    }

    #[test]
    fn test_coverage() {
        let mut metrics = SimMetrics::new();
        let full = PacketKey::new(1, 0);
        let half = PacketKey::new(2, 0);
        metrics.record_origination(full);
        metrics.record_origination(half);
        for _ in 0..4 {
            metrics.record_acceptance(full);
        }
        for _ in 0..2 {
            metrics.record_acceptance(half);
        }

        let result = SimulationResult {
            end_time: Timestamp::from_secs(1),
            metrics,
            queue_exhausted: false,
            node_count: 5,
        };
        assert_eq!(result.coverage(&full), 1.0);
        assert_eq!(result.coverage(&half), 0.5);
        assert_eq!(result.mean_coverage(), 0.75);
        assert_eq!(result.delivery_ratio(), 0.0);
    }

    #[test]
    fn test_snapshot_totals() {
        let mut snapshot = NetworkSnapshot::new(Timestamp::ZERO);
        let a = NodeMetrics {
            sent: 3,
            dropped_duplicate: 1,
            ..Default::default()
        };
        let b = NodeMetrics {
            sent: 2,
            delivered: 4,
            ..Default::default()
        };
        snapshot.record_node(1, a);
        snapshot.record_node(2, b);

        let totals = snapshot.totals();
        assert_eq!(totals.sent, 5);
        assert_eq!(totals.dropped(), 1);
        assert_eq!(totals.delivered, 4);
        assert_eq!(snapshot.node(2), Some(&b));
    }
}
