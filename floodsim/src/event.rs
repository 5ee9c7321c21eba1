//! Event types and priority queue ordering for the discrete event simulation.

use std::cmp::Ordering;

use floodnet::{NodeId, Packet, Timestamp};

/// Unique sequence number for deterministic event ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SequenceNumber(u64);

impl SequenceNumber {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Changes to the network applied at a scheduled time.
#[derive(Debug, Clone, PartialEq)]
pub enum ScenarioAction {
    /// Disable every link crossing between the groups.
    Partition { groups: Vec<Vec<NodeId>> },
    /// Re-enable all links.
    HealPartition,
    DisableLink { a: NodeId, b: NodeId },
    EnableLink { a: NodeId, b: NodeId },
    /// Set the loss rate of one link, clamped to `[0, 1]`.
    SetLossRate { a: NodeId, b: NodeId, rate: f64 },
    /// Tear a node down. Its origination timer is cancelled and in-flight
    /// packets addressed to it are lost.
    RemoveNode { node: NodeId },
    /// Record per-node counters.
    TakeSnapshot,
}

/// Events in the discrete event simulation.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Hand a packet sent by `from` to node `to`.
    PacketDelivery {
        to: NodeId,
        from: NodeId,
        packet: Packet,
    },
    /// Origination timer of `node`. Only the most recent `generation` is live;
    /// older fires were superseded or cancelled and are skipped.
    TimerFire { node: NodeId, generation: u64 },
    /// Make `node` originate now, outside its timer schedule.
    Originate { node: NodeId },
    ScenarioAction(ScenarioAction),
}

/// A scheduled event with timestamp and sequence number for ordering.
#[derive(Debug, Clone)]
pub struct ScheduledEvent {
    /// When the event should occur.
    pub time: Timestamp,
    /// Breaks ties between events at the same time, first scheduled first.
    pub seq: SequenceNumber,
    pub event: Event,
}

impl ScheduledEvent {
    pub fn new(time: Timestamp, seq: SequenceNumber, event: Event) -> Self {
        Self { time, seq, event }
    }
}

// Min-heap ordering (BinaryHeap is a max-heap, so comparisons are reversed).
impl PartialEq for ScheduledEvent {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.seq == other.seq
    }
}

impl Eq for ScheduledEvent {}

impl PartialOrd for ScheduledEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .time
            .cmp(&self.time)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}
