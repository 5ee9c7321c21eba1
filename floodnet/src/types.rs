//! Core types and constants for the flood protocol.

use core::fmt;

use crate::time::{Duration, Timestamp};

/// Default number of (originator, version) pairs a node remembers.
pub const DEFAULT_HISTORY_CAPACITY: usize = 10;

/// Default hop ceiling. A packet arriving with this many hops is dropped.
pub const DEFAULT_MAX_HOP_COUNT: u8 = 3;

/// Lower bound of the origination re-arm delay (0.1 time units).
pub const ORIGINATION_DELAY_MIN: Duration = Duration::from_millis(100);

/// Upper bound of the origination re-arm delay (1.0 time units).
pub const ORIGINATION_DELAY_MAX: Duration = Duration::from_millis(1000);

/// Network-unique node identifier, assigned once from external configuration.
pub type NodeId = u32;

/// Per-originator packet sequence number.
pub type Version = u32;

/// Deduplication identity of a packet.
///
/// Hop count and creation time are metadata and deliberately excluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PacketKey {
    /// Node that created the packet.
    pub originator: NodeId,
    /// Sequence number assigned by the originator.
    pub version: Version,
}

impl PacketKey {
    pub const fn new(originator: NodeId, version: Version) -> Self {
        Self {
            originator,
            version,
        }
    }
}

impl fmt::Display for PacketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/v{}", self.originator, self.version)
    }
}

/// Data packet flowing between nodes.
///
/// Packets are plain values: every forward sends an independent copy and no
/// node keeps a handle to a packet it has sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Packet {
    /// Node that created the packet.
    pub originator: NodeId,
    /// Monotonic per originator, starting at 0.
    pub version: Version,
    /// Forwarding relays traversed since origination.
    pub hop_count: u8,
    /// Simulated time of origination.
    pub created_at: Timestamp,
}

impl Packet {
    /// A freshly originated packet (hop count 0).
    pub const fn originate(originator: NodeId, version: Version, now: Timestamp) -> Self {
        Self {
            originator,
            version,
            hop_count: 0,
            created_at: now,
        }
    }

    pub const fn key(&self) -> PacketKey {
        PacketKey::new(self.originator, self.version)
    }

    /// Copy of this packet as it leaves a relay.
    pub fn relayed(&self) -> Self {
        Self {
            hop_count: self.hop_count.saturating_add(1),
            ..*self
        }
    }
}

/// Why a node discarded an inbound packet.
///
/// These are expected outcomes of flooding, not failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DropReason {
    /// Hop count reached the node's ceiling.
    HopLimit,
    /// (originator, version) is already in the history window.
    Duplicate,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::HopLimit => write!(f, "max hop count reached"),
            DropReason::Duplicate => write!(f, "duplicate packet"),
        }
    }
}

/// Outcome of handling one inbound packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Recorded in history; `forwarded` copies were sent (always 0 at a sink).
    Accepted { forwarded: usize },
    /// Discarded without touching history.
    Dropped(DropReason),
}

impl Disposition {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Disposition::Accepted { .. })
    }

    /// Number of copies sent as a result of this arrival.
    pub fn forwarded(&self) -> usize {
        match self {
            Disposition::Accepted { forwarded } => *forwarded,
            Disposition::Dropped(_) => 0,
        }
    }
}

/// Report of one origination timer firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Origination {
    /// The packet as sent (hop count 0).
    pub packet: Packet,
    /// Number of neighbors a copy was sent to.
    pub fanout: usize,
    /// Delay until the next origination.
    pub next_in: Duration,
}

/// Protocol counters kept by every node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeMetrics {
    /// Packets created by this node.
    pub originated: u64,
    /// Inbound packets handed to this node.
    pub received: u64,
    /// Inbound packets recorded in history.
    pub accepted: u64,
    /// Outbound copies sent (originated and relayed).
    pub sent: u64,
    /// Outbound copies of relayed packets only.
    pub forwarded: u64,
    /// Inbound packets dropped at the hop ceiling.
    pub dropped_hop_limit: u64,
    /// Inbound packets dropped as duplicates.
    pub dropped_duplicate: u64,
    /// Packets handed to a delivery collaborator (sinks only).
    pub delivered: u64,
}

impl NodeMetrics {
    pub(crate) fn record_drop(&mut self, reason: DropReason) {
        match reason {
            DropReason::HopLimit => self.dropped_hop_limit += 1,
            DropReason::Duplicate => self.dropped_duplicate += 1,
        }
    }

    /// Total inbound drops for any reason.
    pub fn dropped(&self) -> u64 {
        self.dropped_hop_limit + self.dropped_duplicate
    }
}
