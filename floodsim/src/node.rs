//! Simulated nodes and the collaborators the simulator hands them.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

use floodnet::{
    ConfigError, DeliverySink, Disposition, Duration, EngineConfig, GeometricNeighbors,
    NeighborSource, NodeId, NodeMetrics, Origination, Packet, PacketHistory, Random, SensorNode,
    SinkNode, StaticNeighbors, Timer, Timestamp, Transport,
};
use hashbrown::HashMap;
use rand_chacha::ChaCha8Rng;
use rand_core::{RngCore, SeedableRng};

use crate::metrics::SinkDelivery;
use crate::world::NodeKind;

/// Buffers sends until the simulator collects and routes them.
#[derive(Debug, Default)]
pub struct SimTransport {
    sent: Vec<(NodeId, Packet)>,
}

impl SimTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take_sent(&mut self) -> Vec<(NodeId, Packet)> {
        std::mem::take(&mut self.sent)
    }
}

impl Transport for SimTransport {
    fn send_to(&mut self, to: NodeId, packet: Packet) {
        self.sent.push((to, packet));
    }
}

/// A timer request waiting to be put on the event queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerRequest {
    pub node: NodeId,
    pub at: Timestamp,
    pub generation: u64,
}

/// Timer state shared by the simulator and every sensor's [`SimTimer`].
///
/// Each schedule or cancel bumps the node's generation, so only the latest
/// request stays live.
#[derive(Debug, Default)]
pub struct TimerTable {
    now: Timestamp,
    generations: HashMap<NodeId, u64>,
    requests: Vec<TimerRequest>,
}

impl TimerTable {
    pub fn set_now(&mut self, now: Timestamp) {
        self.now = now;
    }

    /// Whether a fire carrying `generation` should still be delivered.
    pub fn is_live(&self, node: NodeId, generation: u64) -> bool {
        self.generations.get(&node) == Some(&generation)
    }

    pub fn take_requests(&mut self) -> Vec<TimerRequest> {
        std::mem::take(&mut self.requests)
    }

    fn bump(&mut self, node: NodeId) -> u64 {
        let generation = self.generations.entry(node).or_insert(0);
        *generation += 1;
        *generation
    }
}

pub type SharedTimers = Rc<RefCell<TimerTable>>;

/// A sensor's handle on the shared timer table.
///
/// Lives inside the node, so the cancel issued when a node is dropped still
/// reaches the simulator.
#[derive(Debug, Clone)]
pub struct SimTimer {
    table: SharedTimers,
}

impl SimTimer {
    pub fn new(table: SharedTimers) -> Self {
        Self { table }
    }
}

impl Timer for SimTimer {
    fn schedule_after(&mut self, node: NodeId, delay: Duration) {
        let mut table = self.table.borrow_mut();
        let generation = table.bump(node);
        let at = table.now + delay;
        table.requests.push(TimerRequest {
            node,
            at,
            generation,
        });
    }

    fn cancel(&mut self, node: NodeId) {
        self.table.borrow_mut().bump(node);
    }
}

/// Seeded ChaCha8 source for origination delays.
#[derive(Debug, Clone)]
pub struct SimRandom {
    rng: ChaCha8Rng,
}

impl SimRandom {
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl Random for SimRandom {
    fn gen_range(&mut self, min: u64, max: u64) -> u64 {
        if max <= min {
            return min;
        }
        min + self.rng.next_u64() % (max - min)
    }
}

/// Records what a sink accepted, stamped with the simulation time.
#[derive(Debug, Default)]
pub struct SimSink {
    id: NodeId,
    now: Timestamp,
    deliveries: Vec<SinkDelivery>,
}

impl SimSink {
    pub fn new(id: NodeId) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    pub fn set_now(&mut self, now: Timestamp) {
        self.now = now;
    }

    pub fn take_deliveries(&mut self) -> Vec<SinkDelivery> {
        std::mem::take(&mut self.deliveries)
    }
}

impl DeliverySink for SimSink {
    fn delivered(&mut self, packet: &Packet, from: NodeId) {
        self.deliveries.push(SinkDelivery {
            sink: self.id,
            from,
            key: packet.key(),
            hop_count: packet.hop_count,
            created_at: packet.created_at,
            delivered_at: self.now,
        });
    }
}

/// Where a simulated sensor gets its neighbors from.
#[derive(Debug, Clone)]
pub enum SimNeighbors {
    /// Adjacency taken from the topology when the node was added.
    Static(StaticNeighbors),
    /// Disk overlap against the scenario's world.
    Geometric(GeometricNeighbors),
}

impl NeighborSource for SimNeighbors {
    fn neighbors(&self, me: NodeId) -> BTreeSet<NodeId> {
        match self {
            SimNeighbors::Static(source) => source.neighbors(me),
            SimNeighbors::Geometric(source) => source.neighbors(me),
        }
    }
}

pub type SimSensor = SensorNode<SimTransport, SimTimer, SimRandom, SimNeighbors>;
pub type SimSinkNode = SinkNode<SimSink>;

/// A node in the simulation.
pub enum SimNode {
    Sensor(Box<SimSensor>),
    Sink(SimSinkNode),
}

impl SimNode {
    /// A sensor wired to the shared timer table. Not started.
    pub fn sensor(
        id: NodeId,
        config: EngineConfig,
        neighbors: SimNeighbors,
        timers: &SharedTimers,
        seed: u64,
    ) -> Result<Self, ConfigError> {
        let node = SensorNode::new(
            id,
            config,
            SimTransport::new(),
            SimTimer::new(Rc::clone(timers)),
            SimRandom::with_seed(seed),
            neighbors,
        )?;
        Ok(Self::Sensor(Box::new(node)))
    }

    pub fn sink(id: NodeId, config: EngineConfig) -> Result<Self, ConfigError> {
        Ok(Self::Sink(SinkNode::new(id, config, SimSink::new(id))?))
    }

    pub fn id(&self) -> NodeId {
        match self {
            SimNode::Sensor(node) => node.id(),
            SimNode::Sink(node) => node.id(),
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            SimNode::Sensor(_) => NodeKind::Sensor,
            SimNode::Sink(_) => NodeKind::Sink,
        }
    }

    pub fn metrics(&self) -> &NodeMetrics {
        match self {
            SimNode::Sensor(node) => node.metrics(),
            SimNode::Sink(node) => node.metrics(),
        }
    }

    pub fn history(&self) -> &PacketHistory {
        match self {
            SimNode::Sensor(node) => node.history(),
            SimNode::Sink(node) => node.history(),
        }
    }

    /// Neighbors the node would send to; always empty for a sink.
    pub fn neighbors(&self) -> BTreeSet<NodeId> {
        match self {
            SimNode::Sensor(node) => node.current_neighbors(),
            SimNode::Sink(_) => BTreeSet::new(),
        }
    }

    pub fn as_sensor(&self) -> Option<&SimSensor> {
        match self {
            SimNode::Sensor(node) => Some(node.as_ref()),
            SimNode::Sink(_) => None,
        }
    }

    pub fn as_sink(&self) -> Option<&SimSinkNode> {
        match self {
            SimNode::Sensor(_) => None,
            SimNode::Sink(node) => Some(node),
        }
    }

    /// Arm the origination timer. Sinks have none.
    pub fn start(&mut self) -> Option<Duration> {
        match self {
            SimNode::Sensor(node) => node.start(),
            SimNode::Sink(_) => None,
        }
    }

    pub fn handle_timer(&mut self, now: Timestamp) -> Option<Origination> {
        match self {
            SimNode::Sensor(node) => node.on_origination_timer(now),
            SimNode::Sink(_) => None,
        }
    }

    pub fn handle_packet(&mut self, packet: Packet, from: NodeId, now: Timestamp) -> Disposition {
        match self {
            SimNode::Sensor(node) => node.on_packet_arrival(packet, from),
            SimNode::Sink(node) => {
                node.sink_mut().set_now(now);
                node.on_packet_arrival(packet, from)
            }
        }
    }

    /// Sends buffered since the last call.
    pub fn take_outgoing(&mut self) -> Vec<(NodeId, Packet)> {
        match self {
            SimNode::Sensor(node) => node.transport_mut().take_sent(),
            SimNode::Sink(_) => Vec::new(),
        }
    }

    /// Sink deliveries buffered since the last call.
    pub fn take_deliveries(&mut self) -> Vec<SinkDelivery> {
        match self {
            SimNode::Sensor(_) => Vec::new(),
            SimNode::Sink(node) => node.sink_mut().take_deliveries(),
        }
    }
}
