//! Placed nodes for geometric scenarios.
//!
//! A [`World`] is built once from node specs and never changes during a run.
//! Positions come either from a descriptor string (`"p=<x>,<y>"`) or directly
//! from coordinates; every node also needs a connection range.

use std::collections::BTreeSet;
use std::sync::Arc;

use floodnet::{neighbors_of, ConfigError, NodeId, NodeLocation, Position};
use hashbrown::HashSet;
use rand_chacha::ChaCha8Rng;
use rand_core::{RngCore, SeedableRng};

/// Which protocol a node runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Sensor,
    Sink,
}

/// Where a node sits, before validation.
#[derive(Debug, Clone, PartialEq)]
pub enum Placement {
    /// Display-string style descriptor carrying a `p=<x>,<y>` tag.
    Descriptor(String),
    Position(Position),
}

/// Per-node configuration parameters. Validated by [`World::from_specs`].
#[derive(Debug, Clone, PartialEq)]
pub struct NodeSpec {
    pub id: NodeId,
    pub kind: NodeKind,
    pub range: Option<f64>,
    pub placement: Option<Placement>,
}

impl NodeSpec {
    pub fn sensor(id: NodeId) -> Self {
        Self {
            id,
            kind: NodeKind::Sensor,
            range: None,
            placement: None,
        }
    }

    pub fn sink(id: NodeId) -> Self {
        Self {
            kind: NodeKind::Sink,
            ..Self::sensor(id)
        }
    }

    pub fn with_range(mut self, range: f64) -> Self {
        self.range = Some(range);
        self
    }

    pub fn with_descriptor(mut self, descriptor: impl Into<String>) -> Self {
        self.placement = Some(Placement::Descriptor(descriptor.into()));
        self
    }

    pub fn at(mut self, position: Position) -> Self {
        self.placement = Some(Placement::Position(position));
        self
    }

    fn locate(&self) -> Result<NodeLocation, ConfigError> {
        let range = self.range.ok_or(ConfigError::MissingParameter {
            node: self.id,
            parameter: "range",
        })?;
        match &self.placement {
            Some(Placement::Descriptor(descriptor)) => {
                NodeLocation::from_descriptor(self.id, range, descriptor)
            }
            Some(Placement::Position(position)) => NodeLocation::new(self.id, *position, range),
            None => Err(ConfigError::MissingParameter {
                node: self.id,
                parameter: "position",
            }),
        }
    }
}

/// Validated, immutable set of placed nodes.
#[derive(Debug, Clone)]
pub struct World {
    locations: Arc<[NodeLocation]>,
    sinks: BTreeSet<NodeId>,
}

impl World {
    /// Validate specs into a world. Ids must be unique; every node needs a
    /// range and a parseable position.
    pub fn from_specs(specs: &[NodeSpec]) -> Result<Self, ConfigError> {
        let mut seen = HashSet::with_capacity(specs.len());
        let mut locations = Vec::with_capacity(specs.len());
        let mut sinks = BTreeSet::new();

        for spec in specs {
            if !seen.insert(spec.id) {
                return Err(ConfigError::DuplicateNodeId { node: spec.id });
            }
            locations.push(spec.locate()?);
            if spec.kind == NodeKind::Sink {
                sinks.insert(spec.id);
            }
        }

        tracing::debug!(nodes = locations.len(), sinks = sinks.len(), "world built");
        Ok(Self {
            locations: locations.into(),
            sinks,
        })
    }

    /// Scatter nodes uniformly over a `width` x `height` area, all with the
    /// same range. The same seed always gives the same layout.
    pub fn random(
        sensors: &[NodeId],
        sinks: &[NodeId],
        seed: u64,
        (width, height): (f64, f64),
        range: f64,
    ) -> Result<Self, ConfigError> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let specs: Vec<NodeSpec> = sensors
            .iter()
            .map(|&id| NodeSpec::sensor(id))
            .chain(sinks.iter().map(|&id| NodeSpec::sink(id)))
            .map(|spec| {
                let x = unit_f64(&mut rng) * width;
                let y = unit_f64(&mut rng) * height;
                spec.with_range(range).at(Position::new(x, y))
            })
            .collect();
        Self::from_specs(&specs)
    }

    pub fn locations(&self) -> &[NodeLocation] {
        &self.locations
    }

    /// Shared handle for per-node neighbor sources.
    pub fn shared(&self) -> Arc<[NodeLocation]> {
        Arc::clone(&self.locations)
    }

    pub fn get(&self, id: NodeId) -> Option<&NodeLocation> {
        self.locations.iter().find(|l| l.id == id)
    }

    /// Node ids in the order they were given.
    pub fn ids(&self) -> Vec<NodeId> {
        self.locations.iter().map(|l| l.id).collect()
    }

    pub fn kind(&self, id: NodeId) -> Option<NodeKind> {
        self.get(id).map(|_| {
            if self.sinks.contains(&id) {
                NodeKind::Sink
            } else {
                NodeKind::Sensor
            }
        })
    }

    pub fn sinks(&self) -> &BTreeSet<NodeId> {
        &self.sinks
    }

    /// Disk-overlap neighbors of `id`; empty for an unknown id.
    pub fn neighbors_of(&self, id: NodeId) -> BTreeSet<NodeId> {
        match self.get(id) {
            Some(me) => neighbors_of(me, &self.locations[..]),
            None => BTreeSet::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }
}

/// Uniform f64 in `[0, 1)` from the top 53 bits.
pub(crate) fn unit_f64(rng: &mut ChaCha8Rng) -> f64 {
    (rng.next_u64() >> 11) as f64 / (1u64 << 53) as f64
}
