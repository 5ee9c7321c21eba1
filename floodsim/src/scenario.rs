//! Scenario builder for setting up and running simulations.

use floodnet::{ConfigError, Duration, EngineConfig, NodeId, Timestamp};

use crate::event::ScenarioAction;
use crate::metrics::SimulationResult;
use crate::sim::Simulator;
use crate::topology::Topology;
use crate::world::{NodeKind, NodeSpec, World};

/// Type of topology to generate.
#[derive(Debug, Clone)]
enum TopologyType {
    FullyConnected,
    Chain,
    /// First node is the hub.
    Star,
    /// Uniform random placement with a common range; links by disk overlap.
    RandomGeometric {
        width: f64,
        height: f64,
        range: f64,
    },
    /// Explicit placement. Node ids and kinds come from the specs.
    World(Vec<NodeSpec>),
    Custom(Topology),
}

/// Actions whose nodes are given as indices into the built node list.
#[derive(Debug, Clone)]
enum PendingAction {
    Partition(Vec<Vec<usize>>),
    RemoveNode(usize),
    Ready(ScenarioAction),
}

/// Builder for simulation scenarios.
///
/// Sensors get ids `0..sensors`; sinks follow on with the next ids, so in a
/// chain the sinks sit at the far end.
pub struct ScenarioBuilder {
    num_sensors: usize,
    num_sinks: usize,
    seed: u64,
    /// Must be set before `build`.
    topology_type: Option<TopologyType>,
    loss_rate: f64,
    /// Overrides every link's delay when set.
    delay: Option<Duration>,
    engine_config: EngineConfig,
    actions: Vec<(Timestamp, PendingAction)>,
    snapshot_interval: Option<Duration>,
}

impl Default for ScenarioBuilder {
    fn default() -> Self {
        Self::new(0)
    }
}

impl ScenarioBuilder {
    /// A scenario with `num_sensors` sensors and no sinks.
    ///
    /// A topology must be chosen before calling `build`.
    pub fn new(num_sensors: usize) -> Self {
        Self {
            num_sensors,
            num_sinks: 0,
            seed: 42,
            topology_type: None,
            loss_rate: 0.0,
            delay: None,
            engine_config: EngineConfig::default(),
            actions: Vec::new(),
            snapshot_interval: None,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_sinks(mut self, num_sinks: usize) -> Self {
        self.num_sinks = num_sinks;
        self
    }

    pub fn with_engine_config(mut self, config: EngineConfig) -> Self {
        self.engine_config = config;
        self
    }

    pub fn topology(mut self, topo: Topology) -> Self {
        self.topology_type = Some(TopologyType::Custom(topo));
        self
    }

    pub fn fully_connected(mut self) -> Self {
        self.topology_type = Some(TopologyType::FullyConnected);
        self
    }

    pub fn chain_topology(mut self) -> Self {
        self.topology_type = Some(TopologyType::Chain);
        self
    }

    pub fn star_topology(mut self) -> Self {
        self.topology_type = Some(TopologyType::Star);
        self
    }

    /// Scatter nodes over a `width` x `height` area, all with `range`.
    /// Placement is fixed by the seed.
    pub fn random_geometric(mut self, width: f64, height: f64, range: f64) -> Self {
        self.topology_type = Some(TopologyType::RandomGeometric {
            width,
            height,
            range,
        });
        self
    }

    /// Place nodes explicitly. Replaces the sensor and sink counts.
    pub fn world(mut self, specs: Vec<NodeSpec>) -> Self {
        self.topology_type = Some(TopologyType::World(specs));
        self
    }

    pub fn with_loss_rate(mut self, rate: f64) -> Self {
        self.loss_rate = rate.clamp(0.0, 1.0);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_snapshot_interval(mut self, interval: Duration) -> Self {
        self.snapshot_interval = Some(interval);
        self
    }

    /// Partition the network at `time`. Groups hold indices into the node list.
    pub fn partition_at(mut self, time: Timestamp, groups: Vec<Vec<usize>>) -> Self {
        self.actions.push((time, PendingAction::Partition(groups)));
        self
    }

    pub fn heal_at(mut self, time: Timestamp) -> Self {
        self.actions
            .push((time, PendingAction::Ready(ScenarioAction::HealPartition)));
        self
    }

    /// Tear down the node at `index` in the node list.
    pub fn remove_node_at(mut self, time: Timestamp, index: usize) -> Self {
        self.actions.push((time, PendingAction::RemoveNode(index)));
        self
    }

    pub fn snapshot_at(mut self, time: Timestamp) -> Self {
        self.actions
            .push((time, PendingAction::Ready(ScenarioAction::TakeSnapshot)));
        self
    }

    /// Schedule any action with concrete node ids.
    pub fn action_at(mut self, time: Timestamp, action: ScenarioAction) -> Self {
        self.actions.push((time, PendingAction::Ready(action)));
        self
    }

    /// Build the simulator with all nodes started.
    ///
    /// Returns the node ids in creation order, sensors first.
    pub fn build(self) -> Result<(Simulator, Vec<NodeId>), ConfigError> {
        let mut sim = Simulator::new(self.seed).with_engine_config(self.engine_config);
        if let Some(interval) = self.snapshot_interval {
            sim = sim.with_snapshot_interval(interval);
        }

        let sensor_ids: Vec<NodeId> = (0..self.num_sensors as NodeId).collect();
        let sink_ids: Vec<NodeId> =
            (self.num_sensors as NodeId..(self.num_sensors + self.num_sinks) as NodeId).collect();
        let counted: Vec<(NodeId, NodeKind)> = sensor_ids
            .iter()
            .map(|&id| (id, NodeKind::Sensor))
            .chain(sink_ids.iter().map(|&id| (id, NodeKind::Sink)))
            .collect();
        let all_ids: Vec<NodeId> = counted.iter().map(|(id, _)| *id).collect();

        let nodes = match self.topology_type.ok_or(ConfigError::MissingTopology)? {
            TopologyType::FullyConnected => {
                sim = sim.with_topology(Topology::fully_connected(&all_ids));
                counted
            }
            TopologyType::Chain => {
                sim = sim.with_topology(Topology::chain(&all_ids));
                counted
            }
            TopologyType::Star => {
                sim = sim.with_topology(Topology::star(&all_ids));
                counted
            }
            TopologyType::Custom(topo) => {
                sim = sim.with_topology(topo);
                counted
            }
            TopologyType::RandomGeometric {
                width,
                height,
                range,
            } => {
                let world = World::random(&sensor_ids, &sink_ids, self.seed, (width, height), range)?;
                sim = sim.with_world(world);
                counted
            }
            TopologyType::World(specs) => {
                let world = World::from_specs(&specs)?;
                let nodes = specs.iter().map(|s| (s.id, s.kind)).collect();
                sim = sim.with_world(world);
                nodes
            }
        };

        let topology = sim.topology_mut();
        if self.loss_rate > 0.0 {
            topology.set_global_loss_rate(self.loss_rate);
        }
        if let Some(delay) = self.delay {
            topology.set_global_delay(delay);
        }

        let mut node_ids = Vec::with_capacity(nodes.len());
        for (id, kind) in nodes {
            node_ids.push(sim.add_node(id, kind)?);
        }

        let lookup = |index: usize| {
            node_ids
                .get(index)
                .copied()
                .ok_or(ConfigError::UnknownNode {
                    node: index as NodeId,
                })
        };
        for (time, pending) in self.actions {
            let action = match pending {
                PendingAction::Partition(groups) => ScenarioAction::Partition {
                    groups: groups
                        .into_iter()
                        .map(|group| group.into_iter().map(lookup).collect::<Result<Vec<_>, _>>())
                        .collect::<Result<Vec<_>, _>>()?,
                },
                PendingAction::RemoveNode(index) => ScenarioAction::RemoveNode {
                    node: lookup(index)?,
                },
                PendingAction::Ready(action) => action,
            };
            sim.schedule_action(time, action);
        }

        tracing::info!(
            nodes = node_ids.len(),
            seed = self.seed,
            links = sim.topology().link_count(),
            "scenario built"
        );
        Ok((sim, node_ids))
    }

    /// Build and run for `duration`.
    pub fn run_for(self, duration: Duration) -> Result<SimulationResult, ConfigError> {
        let (mut sim, _) = self.build()?;
        Ok(sim.run_for(duration))
    }

    /// Build and run until `time`.
    pub fn run_until(self, time: Timestamp) -> Result<SimulationResult, ConfigError> {
        let (mut sim, _) = self.build()?;
        Ok(sim.run_until(time))
    }
}

/// Fully connected sensors.
pub fn simple_scenario(num_sensors: usize) -> ScenarioBuilder {
    ScenarioBuilder::new(num_sensors).fully_connected()
}

/// A chain of sensors feeding one sink at the far end.
pub fn collection_scenario(num_sensors: usize) -> ScenarioBuilder {
    ScenarioBuilder::new(num_sensors)
        .with_sinks(1)
        .chain_topology()
}
