#![forbid(unsafe_code)]
//! floodnet - Hop-limited flood dissemination for ad hoc sensor networks
//!
//! Every sensor periodically originates a versioned data packet and floods it
//! to its one-hop neighbors. Receivers re-flood each packet at most once,
//! using a small FIFO window of recently seen `(originator, version)` pairs,
//! and a hard hop ceiling bounds how far any packet travels. Sinks run the
//! same checks but only collect.
//!
//! This crate is `no_std` but **requires the `alloc` crate**. Scheduling,
//! delivery and randomness are supplied by the host through the traits in
//! [`traits`]; the `floodsim` crate is one such host.
//!
//! # Key Properties
//!
//! - Neighbors are injected per node: a fixed adjacency list or a disk-overlap
//!   query (`distance <= range_a + range_b`)
//! - A packet is never forwarded back to the neighbor it arrived from
//! - A packet is recorded in history before any copy is forwarded
//! - Origination re-arms after a uniform random delay in `[0.1, 1.0]` time units
//! - No acknowledgments, retransmission or routing state
//!
//! # Example
//!
//! ```
//! use floodnet::{
//!     Disposition, Duration, EngineConfig, NodeId, Packet, Random, SensorNode, StaticNeighbors,
//!     Timer, Timestamp, Transport,
//! };
//!
//! #[derive(Default)]
//! struct Outbox(Vec<NodeId>);
//!
//! impl Transport for Outbox {
//!     fn send_to(&mut self, to: NodeId, _packet: Packet) {
//!         self.0.push(to);
//!     }
//! }
//!
//! struct NoTimer;
//!
//! impl Timer for NoTimer {
//!     fn schedule_after(&mut self, _node: NodeId, _delay: Duration) {}
//!     fn cancel(&mut self, _node: NodeId) {}
//! }
//!
//! struct Lowest;
//!
//! impl Random for Lowest {
//!     fn gen_range(&mut self, min: u64, _max: u64) -> u64 {
//!         min
//!     }
//! }
//!
//! let mut node = SensorNode::new(
//!     2,
//!     EngineConfig::default(),
//!     Outbox::default(),
//!     NoTimer,
//!     Lowest,
//!     StaticNeighbors::new([1, 3]),
//! )
//! .unwrap();
//!
//! // Arrives from node 1, goes out to node 3 only.
//! let packet = Packet::originate(1, 0, Timestamp::ZERO);
//! assert_eq!(node.on_packet_arrival(packet, 1), Disposition::Accepted { forwarded: 1 });
//! assert_eq!(node.transport().0, [3]);
//!
//! // Second copy is a duplicate.
//! assert!(!node.on_packet_arrival(packet, 3).is_accepted());
//! ```
//!
//! # Module Structure
//!
//! - [`types`] - Packets, identities, dispositions and counters
//! - [`history`] - Fixed-capacity duplicate-detection window
//! - [`locator`] - Positions, descriptor parsing and disk-overlap neighbors
//! - [`neighbors`] - Neighbor sources injected into nodes
//! - [`engine`] - The sensor node state machine
//! - [`sink`] - The collecting sink node
//! - [`traits`] - Transport, Timer, Random, DeliverySink, NeighborSource
//! - [`config`] - Per-node protocol parameters
//! - [`error`] - Configuration errors
//! - [`time`] - Timestamp and Duration types

#![no_std]

// Prevent test features from being used in release builds.
#[cfg(all(feature = "test-support", not(test), not(debug_assertions)))]
compile_error!(
    "The `test-support` feature must not be enabled in release builds. \
     It exposes mock collaborators intended only for tests and simulation."
);

extern crate alloc;

pub mod config;
pub mod engine;
pub mod error;
pub mod history;
pub mod locator;
pub mod neighbors;
pub mod sink;
pub mod time;
pub mod traits;
pub mod types;

// Re-export main types at crate root
pub use config::EngineConfig;
pub use engine::SensorNode;
pub use error::ConfigError;
pub use history::PacketHistory;
pub use locator::{in_range, neighbors_of, parse_position, Locatable, NodeLocation, Position};
pub use neighbors::{GeometricNeighbors, StaticNeighbors};
pub use sink::SinkNode;
pub use time::{Duration, Timestamp};
pub use traits::{DeliverySink, NeighborSource, Random, Timer, Transport};
pub use types::{
    Disposition, DropReason, NodeId, NodeMetrics, Origination, Packet, PacketKey, Version,
};

// Re-export constants
pub use types::{
    DEFAULT_HISTORY_CAPACITY, DEFAULT_MAX_HOP_COUNT, ORIGINATION_DELAY_MAX, ORIGINATION_DELAY_MIN,
};
