//! floodsim - Discrete event simulator for floodnet sensor networks.
//!
//! Runs many floodnet nodes in one process with no real-time delays and a
//! fully deterministic schedule for a given seed.
//!
//! # Features
//!
//! - **Discrete event simulation**: events ordered by (time, sequence number)
//! - **Sensors and sinks**: sinks collect, sensors originate and relay
//! - **Topologies**: fully connected, chain, star, custom adjacency, or
//!   geometric placement with disk-overlap links
//! - **Link properties**: delay, loss rate, active flag per link
//! - **Scenario builder**: scheduled partitions, healing, link changes, node removal
//! - **Metrics**: per-packet reach, sink deliveries and latency, per-node counters
//!
//! # Example
//!
//! ```
//! use floodsim::{Duration, ScenarioBuilder};
//!
//! // Five sensors in a chain feeding a sink, run for 10 seconds.
//! let result = ScenarioBuilder::new(5)
//!     .with_sinks(1)
//!     .chain_topology()
//!     .run_for(Duration::from_secs(10))
//!     .unwrap();
//!
//! assert!(result.metrics.packets_originated > 0);
//! assert!(!result.metrics.sink_deliveries.is_empty());
//! ```
//!
//! # Architecture
//!
//! The main loop:
//! 1. Pop the next event from the queue
//! 2. Advance simulation time
//! 3. Call the node's handler directly (`on_packet_arrival`, `on_origination_timer`)
//! 4. Collect the node's buffered sends and timer requests
//! 5. Route sends over the topology and schedule deliveries

pub mod event;
pub mod metrics;
pub mod node;
pub mod scenario;
pub mod sim;
pub mod topology;
pub mod world;

// Re-export main types
pub use event::{Event, ScenarioAction, ScheduledEvent};
pub use floodnet::{Duration, EngineConfig, NodeId, PacketKey, Position, Timestamp};
pub use metrics::{NetworkSnapshot, SimMetrics, SimulationResult, SinkDelivery};
pub use node::SimNode;
pub use scenario::{collection_scenario, simple_scenario, ScenarioBuilder};
pub use sim::Simulator;
pub use topology::{Link, Topology};
pub use world::{NodeKind, NodeSpec, Placement, World};
