//! Per-node dissemination engine.
//!
//! A sensor node has a single steady state (idle) and two transitions, both
//! run to completion:
//!
//! - **Origination** ([`SensorNode::on_origination_timer`]): create a packet
//!   with the next version and hop count 0, send a copy to every neighbor,
//!   re-arm the timer with a uniform random delay.
//! - **Arrival** ([`SensorNode::on_packet_arrival`]): drop at the hop ceiling,
//!   drop duplicates, otherwise record the packet and forward a copy with one
//!   more hop to every neighbor except the one it came from.
//!
//! The order of the arrival checks is fixed: hop ceiling, then history
//! lookup, then history insert, then fan-out. Recording happens before any
//! copy is sent, so a host that delivers re-entrantly still sees the packet
//! as a duplicate.

use alloc::collections::BTreeSet;

use crate::config::EngineConfig;
use crate::error::ConfigError;
use crate::history::PacketHistory;
use crate::locator::{Locatable, Position};
use crate::neighbors::GeometricNeighbors;
use crate::time::{Duration, Timestamp};
use crate::traits::{NeighborSource, Random, Timer, Transport};
use crate::types::{
    Disposition, DropReason, NodeId, NodeMetrics, Origination, Packet, Version,
};

/// Hop-ceiling and duplicate gate shared by sensors and sinks.
///
/// Does not touch the history; callers insert on `Ok`.
pub(crate) fn admit(
    history: &PacketHistory,
    max_hop_count: u8,
    packet: &Packet,
) -> Result<(), DropReason> {
    if packet.hop_count >= max_hop_count {
        return Err(DropReason::HopLimit);
    }
    if history.contains_key(&packet.key()) {
        return Err(DropReason::Duplicate);
    }
    Ok(())
}

/// A flooding sensor node.
///
/// Owns its history and counters exclusively. The collaborators are injected
/// at construction, including where its neighbors come from.
///
/// Dropping the node cancels its pending origination timer.
pub struct SensorNode<T, Tm, R, N>
where
    T: Transport,
    Tm: Timer,
    R: Random,
    N: NeighborSource,
{
    id: NodeId,
    config: EngineConfig,
    history: PacketHistory,
    /// Version for the next originated packet.
    next_version: Version,
    transport: T,
    timer: Tm,
    random: R,
    neighbors: N,
    metrics: NodeMetrics,
    shut_down: bool,
}

impl<T, Tm, R, N> SensorNode<T, Tm, R, N>
where
    T: Transport,
    Tm: Timer,
    R: Random,
    N: NeighborSource,
{
    /// Create a node. The origination timer is not armed until [`start`](Self::start).
    pub fn new(
        id: NodeId,
        config: EngineConfig,
        transport: T,
        timer: Tm,
        random: R,
        neighbors: N,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            id,
            config,
            history: PacketHistory::with_capacity(config.history_capacity),
            next_version: 0,
            transport,
            timer,
            random,
            neighbors,
            metrics: NodeMetrics::default(),
            shut_down: false,
        })
    }

    /// Arm the first origination timer.
    ///
    /// Returns the chosen delay, or `None` if the node has been shut down.
    pub fn start(&mut self) -> Option<Duration> {
        if self.shut_down {
            return None;
        }
        let delay = self.arm_timer();
        tracing::debug!(node = self.id, delay_ms = delay.as_millis(), "node started");
        Some(delay)
    }

    /// Originate a new packet and flood it to the current neighbors.
    ///
    /// Returns `None` for a timer that fires after [`shutdown`](Self::shutdown).
    pub fn on_origination_timer(&mut self, now: Timestamp) -> Option<Origination> {
        if self.shut_down {
            tracing::trace!(node = self.id, "ignoring timer after shutdown");
            return None;
        }

        let packet = Packet::originate(self.id, self.next_version, now);
        if self.config.record_own_packets {
            self.history.insert_key(packet.key());
        }

        let mut fanout = 0;
        for neighbor in self.current_neighbors() {
            self.transport.send_to(neighbor, packet);
            fanout += 1;
        }

        self.next_version = self.next_version.wrapping_add(1);
        self.metrics.originated += 1;
        self.metrics.sent += fanout as u64;

        tracing::debug!(
            node = self.id,
            version = packet.version,
            fanout,
            "originated packet"
        );

        let next_in = self.arm_timer();
        Some(Origination {
            packet,
            fanout,
            next_in,
        })
    }

    /// Handle a packet delivered by neighbor `from`.
    pub fn on_packet_arrival(&mut self, packet: Packet, from: NodeId) -> Disposition {
        self.metrics.received += 1;

        if let Err(reason) = admit(&self.history, self.config.max_hop_count, &packet) {
            self.metrics.record_drop(reason);
            tracing::trace!(
                node = self.id,
                from,
                originator = packet.originator,
                version = packet.version,
                hop_count = packet.hop_count,
                %reason,
                "dropping packet"
            );
            return Disposition::Dropped(reason);
        }

        self.history.insert_key(packet.key());
        self.metrics.accepted += 1;

        let relayed = packet.relayed();
        let mut forwarded = 0;
        for neighbor in self.current_neighbors() {
            if neighbor == from {
                continue;
            }
            self.transport.send_to(neighbor, relayed);
            forwarded += 1;
        }
        self.metrics.forwarded += forwarded as u64;
        self.metrics.sent += forwarded as u64;

        tracing::trace!(
            node = self.id,
            from,
            originator = packet.originator,
            version = packet.version,
            hop_count = relayed.hop_count,
            forwarded,
            "forwarding packet"
        );

        Disposition::Accepted { forwarded }
    }

    /// Cancel the origination timer. Later timer fires are ignored.
    ///
    /// Called automatically on drop; calling it more than once is harmless.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;
        self.timer.cancel(self.id);
        tracing::debug!(node = self.id, "node shut down");
    }

    /// Neighbors as reported by the injected source, never including self.
    pub fn current_neighbors(&self) -> BTreeSet<NodeId> {
        let mut neighbors = self.neighbors.neighbors(self.id);
        neighbors.remove(&self.id);
        neighbors
    }

    fn arm_timer(&mut self) -> Duration {
        let delay = self.random.gen_delay(
            self.config.origination_delay_min,
            self.config.origination_delay_max,
        );
        self.timer.schedule_after(self.id, delay);
        delay
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn history(&self) -> &PacketHistory {
        &self.history
    }

    pub fn metrics(&self) -> &NodeMetrics {
        &self.metrics
    }

    /// Version the next originated packet will carry.
    pub fn next_version(&self) -> Version {
        self.next_version
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn timer(&self) -> &Tm {
        &self.timer
    }

    pub fn neighbor_source(&self) -> &N {
        &self.neighbors
    }
}

impl<T, Tm, R, N> Drop for SensorNode<T, Tm, R, N>
where
    T: Transport,
    Tm: Timer,
    R: Random,
    N: NeighborSource,
{
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl<T, Tm, R> Locatable for SensorNode<T, Tm, R, GeometricNeighbors>
where
    T: Transport,
    Tm: Timer,
    R: Random,
{
    fn id(&self) -> NodeId {
        self.id
    }

    fn position(&self) -> Position {
        self.neighbors.location().position
    }

    fn range(&self) -> f64 {
        self.neighbors.location().range
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;
    use alloc::vec::Vec;

    use super::*;
    use crate::locator::{neighbors_of, NodeLocation};
    use crate::neighbors::StaticNeighbors;
    use crate::traits::test_impls::{MockRandom, MockTimer, MockTransport, TimerCall};

    type TestNode = SensorNode<MockTransport, MockTimer, MockRandom, StaticNeighbors>;

    fn node_with(id: NodeId, peers: &[NodeId], config: EngineConfig) -> TestNode {
        SensorNode::new(
            id,
            config,
            MockTransport::new(),
            MockTimer::new(),
            MockRandom::new(),
            StaticNeighbors::new(peers.iter().copied()),
        )
        .unwrap()
    }

    fn node(id: NodeId, peers: &[NodeId]) -> TestNode {
        node_with(id, peers, EngineConfig::default())
    }

    fn packet(originator: NodeId, version: Version, hop_count: u8) -> Packet {
        Packet {
            hop_count,
            ..Packet::originate(originator, version, Timestamp::ZERO)
        }
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let result = SensorNode::new(
            1,
            EngineConfig::default().with_history_capacity(0),
            MockTransport::new(),
            MockTimer::new(),
            MockRandom::new(),
            StaticNeighbors::default(),
        );
        assert_eq!(result.err(), Some(ConfigError::InvalidHistoryCapacity));
    }

    #[test]
    fn test_start_arms_timer_in_window() {
        let mut n = node(1, &[2]);
        let delay = n.start().unwrap();

        assert!(delay >= Duration::from_millis(100) && delay <= Duration::from_millis(1000));
        assert_eq!(
            n.timer().calls,
            vec![TimerCall::Schedule { node: 1, delay }]
        );
        assert!(n.transport().sent().is_empty());
    }

    #[test]
    fn test_origination_sends_to_every_neighbor() {
        let mut n = node(1, &[4, 2, 3]);
        let now = Timestamp::from_millis(700);

        let report = n.on_origination_timer(now).unwrap();

        assert_eq!(report.fanout, 3);
        assert_eq!(report.packet, Packet::originate(1, 0, now));
        assert_eq!(n.transport().destinations(), [2, 3, 4]);
        assert!(n
            .transport()
            .sent()
            .iter()
            .all(|(_, p)| *p == Packet::originate(1, 0, now)));
    }

    #[test]
    fn test_origination_versions_increase_and_timer_rearms() {
        let mut n = node_with(1, &[2], EngineConfig::default());

        for expected in 0..4 {
            let report = n.on_origination_timer(Timestamp::from_secs(expected as u64)).unwrap();
            assert_eq!(report.packet.version, expected);
            assert_eq!(n.timer().last_delay(), Some(report.next_in));
        }
        assert_eq!(n.next_version(), 4);
        assert_eq!(n.timer().schedule_count(), 4);
        assert_eq!(n.metrics().originated, 4);
        assert_eq!(n.metrics().sent, 4);
    }

    #[test]
    fn test_origination_with_no_neighbors() {
        let mut n = node(1, &[]);
        let report = n.on_origination_timer(Timestamp::ZERO).unwrap();
        assert_eq!(report.fanout, 0);
        assert_eq!(n.next_version(), 1);
        // Still re-arms.
        assert_eq!(n.timer().schedule_count(), 1);
    }

    #[test]
    fn test_fixed_random_gives_exact_schedule() {
        let mut n = SensorNode::new(
            1,
            EngineConfig::default(),
            MockTransport::new(),
            MockTimer::new(),
            MockRandom::always(250),
            StaticNeighbors::default(),
        )
        .unwrap();

        assert_eq!(n.start(), Some(Duration::from_millis(250)));
        let report = n.on_origination_timer(Timestamp::from_millis(250)).unwrap();
        assert_eq!(report.next_in, Duration::from_millis(250));
    }

    #[test]
    fn test_accept_and_forward_excludes_sender() {
        let mut n = node(2, &[1, 3, 4]);

        let disposition = n.on_packet_arrival(packet(1, 0, 0), 1);

        assert_eq!(disposition, Disposition::Accepted { forwarded: 2 });
        assert_eq!(n.transport().destinations(), [3, 4]);
        assert!(n
            .transport()
            .sent()
            .iter()
            .all(|(_, p)| p.hop_count == 1 && p.key() == packet(1, 0, 0).key()));
        assert!(n.history().contains(1, 0));
    }

    #[test]
    fn test_no_back_forwarding_to_previous_hop() {
        // Packet from originator 1 relayed by 3; 3 is still a neighbor.
        let mut n = node(2, &[1, 3, 4]);
        n.on_packet_arrival(packet(1, 0, 1), 3);

        let destinations = n.transport().destinations();
        assert!(!destinations.contains(&3));
        // The originator is not the sender here, so it does get a copy.
        assert_eq!(destinations, [1, 4]);
    }

    #[test]
    fn test_duplicate_suppression() {
        let mut n = node(2, &[1, 3]);
        let p = packet(5, 3, 0);

        assert!(n.on_packet_arrival(p, 1).is_accepted());
        let sent_after_first = n.transport().sent().len();
        let metrics_after_first = *n.metrics();

        // Same sender and a different sender both count as duplicates.
        assert_eq!(
            n.on_packet_arrival(p, 1),
            Disposition::Dropped(DropReason::Duplicate)
        );
        assert_eq!(
            n.on_packet_arrival(p.relayed(), 3),
            Disposition::Dropped(DropReason::Duplicate)
        );

        assert_eq!(n.transport().sent().len(), sent_after_first);
        assert_eq!(n.history().len(), 1);
        assert_eq!(n.metrics().accepted, metrics_after_first.accepted);
        assert_eq!(n.metrics().forwarded, metrics_after_first.forwarded);
        assert_eq!(n.metrics().dropped_duplicate, 2);
    }

    #[test]
    fn test_hop_limit_termination() {
        let mut n = node(2, &[1, 3]);

        for hops in [3, 4, u8::MAX] {
            assert_eq!(
                n.on_packet_arrival(packet(9, hops as u32, hops), 1),
                Disposition::Dropped(DropReason::HopLimit)
            );
        }
        assert!(n.history().is_empty());
        assert!(n.transport().sent().is_empty());

        // hop 2 is still below the ceiling and leaves with hop 3.
        assert!(n.on_packet_arrival(packet(9, 100, 2), 1).is_accepted());
        assert_eq!(n.transport().sent(), [(3, packet(9, 100, 3))]);
    }

    #[test]
    fn test_hop_limit_checked_before_duplicate() {
        let mut n = node(2, &[1, 3]);
        n.on_packet_arrival(packet(9, 0, 0), 1);

        // Same identity at the ceiling reports the hop limit, not a duplicate.
        assert_eq!(
            n.on_packet_arrival(packet(9, 0, 3), 1),
            Disposition::Dropped(DropReason::HopLimit)
        );
        assert_eq!(n.metrics().dropped_hop_limit, 1);
        assert_eq!(n.metrics().dropped_duplicate, 0);
    }

    #[test]
    fn test_zero_hop_ceiling_drops_everything() {
        let mut n = node_with(2, &[1], EngineConfig::default().with_max_hop_count(0));
        assert_eq!(
            n.on_packet_arrival(packet(1, 0, 0), 1),
            Disposition::Dropped(DropReason::HopLimit)
        );
    }

    #[test]
    fn test_history_eviction_lets_old_packet_through() {
        let mut n = node_with(2, &[1], EngineConfig::default().with_history_capacity(2));
        n.on_packet_arrival(packet(7, 0, 0), 1);
        n.on_packet_arrival(packet(7, 1, 0), 1);
        n.on_packet_arrival(packet(7, 2, 0), 1);

        // 7/v0 was evicted and is accepted again.
        assert!(n.on_packet_arrival(packet(7, 0, 0), 1).is_accepted());
    }

    #[test]
    fn test_own_packet_recorded_by_default() {
        let mut n = node(1, &[2, 3]);
        let report = n.on_origination_timer(Timestamp::ZERO).unwrap();

        assert!(n.history().contains_key(&report.packet.key()));
        assert_eq!(
            n.on_packet_arrival(report.packet.relayed(), 2),
            Disposition::Dropped(DropReason::Duplicate)
        );
    }

    #[test]
    fn test_own_packet_not_recorded_when_disabled() {
        let config = EngineConfig::default().with_record_own_packets(false);
        let mut n = node_with(1, &[2, 3], config);
        let report = n.on_origination_timer(Timestamp::ZERO).unwrap();
        n.transport_mut().take_sent();

        // Looped-back copy is treated as new and re-flooded.
        assert_eq!(
            n.on_packet_arrival(report.packet.relayed(), 2),
            Disposition::Accepted { forwarded: 1 }
        );
        assert_eq!(n.transport().destinations(), [3]);
    }

    #[test]
    fn test_shutdown_cancels_timer_once() {
        let mut n = node(1, &[2]);
        n.start();
        n.shutdown();
        n.shutdown();

        assert!(n.is_shut_down());
        assert_eq!(n.timer().cancel_count(), 1);
        assert_eq!(n.on_origination_timer(Timestamp::from_secs(1)), None);
        assert_eq!(n.start(), None);
        assert_eq!(n.timer().schedule_count(), 1);
    }

    #[test]
    fn test_drop_cancels_timer() {
        let mut timer = MockTimer::new();
        {
            let mut n = SensorNode::new(
                8,
                EngineConfig::default(),
                MockTransport::new(),
                &mut timer,
                MockRandom::new(),
                StaticNeighbors::new([1]),
            )
            .unwrap();
            n.start();
        }
        assert_eq!(timer.calls.len(), 2);
        assert_eq!(timer.calls[1], TimerCall::Cancel { node: 8 });
    }

    #[test]
    fn test_static_source_listing_self_is_ignored() {
        let mut n = node(1, &[1, 2]);
        let report = n.on_origination_timer(Timestamp::ZERO).unwrap();
        assert_eq!(report.fanout, 1);
        assert_eq!(n.transport().destinations(), [2]);
    }

    #[test]
    fn test_geometric_node_is_locatable() {
        let world = vec![
            NodeLocation::new(1, Position::new(0.0, 0.0), 5.0).unwrap(),
            NodeLocation::new(2, Position::new(9.0, 0.0), 5.0).unwrap(),
        ];
        let n = SensorNode::new(
            1,
            EngineConfig::default(),
            MockTransport::new(),
            MockTimer::new(),
            MockRandom::new(),
            GeometricNeighbors::from_locations(world[0], world.clone()),
        )
        .unwrap();

        assert_eq!(Locatable::id(&n), 1);
        assert_eq!(n.range(), 5.0);
        let found: Vec<_> = neighbors_of(&n, &world).into_iter().collect();
        assert_eq!(found, [2]);
        assert_eq!(n.current_neighbors(), BTreeSet::from([2]));
    }
}
