//! Geometric neighbor discovery.
//!
//! Two nodes are linked iff their position-centred disks overlap, i.e. the
//! distance between them is at most the *sum* of both connection ranges.
//! Range is a property of both endpoints, which makes the relation symmetric.
//!
//! Positions come from display-string style descriptors of the form
//! `"...p=<x>,<y>;..."`. Parsing is kept as a standalone pure function so it
//! can be tested against malformed input on its own.

use alloc::collections::BTreeSet;
use alloc::string::ToString;

use crate::error::ConfigError;
use crate::types::NodeId;

/// Planar coordinates of a node.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    pub fn distance(&self, other: &Position) -> f64 {
        libm::hypot(self.x - other.x, self.y - other.y)
    }
}

/// Anything that can be placed in the world.
///
/// Sensors and sinks both implement this, so distance checks never need to
/// know what kind of node they are looking at.
pub trait Locatable {
    fn id(&self) -> NodeId;
    fn position(&self) -> Position;
    /// Broadcast radius, non-negative.
    fn range(&self) -> f64;
}

/// A placed node: identity, position and connection range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeLocation {
    pub id: NodeId,
    pub position: Position,
    pub range: f64,
}

impl NodeLocation {
    /// Create a placed node, rejecting negative or non-finite ranges.
    pub fn new(id: NodeId, position: Position, range: f64) -> Result<Self, ConfigError> {
        if !range.is_finite() || range < 0.0 {
            return Err(ConfigError::InvalidRange { node: id, range });
        }
        if !position.x.is_finite() || !position.y.is_finite() {
            return Err(ConfigError::MalformedPosition {
                descriptor: alloc::format!("p={},{}", position.x, position.y),
            });
        }
        Ok(Self {
            id,
            position,
            range,
        })
    }

    /// Create a placed node from a position descriptor string.
    pub fn from_descriptor(id: NodeId, range: f64, descriptor: &str) -> Result<Self, ConfigError> {
        let position = parse_position(descriptor)?;
        Self::new(id, position, range)
    }
}

impl Locatable for NodeLocation {
    fn id(&self) -> NodeId {
        self.id
    }

    fn position(&self) -> Position {
        self.position
    }

    fn range(&self) -> f64 {
        self.range
    }
}

/// Disk-overlap test: `distance(a, b) <= a.range + b.range`.
pub fn in_range<A: Locatable + ?Sized, B: Locatable + ?Sized>(a: &A, b: &B) -> bool {
    a.position().distance(&b.position()) <= a.range() + b.range()
}

/// Ids of every node in `all` whose disk overlaps `me`'s.
///
/// `me` itself (matched by id) is never included. The result is ordered so
/// that fan-out happens in a stable order run over run.
pub fn neighbors_of<M, L>(me: &M, all: &[L]) -> BTreeSet<NodeId>
where
    M: Locatable + ?Sized,
    L: Locatable,
{
    let my_id = me.id();
    all.iter()
        .filter(|other| other.id() != my_id && in_range(me, *other))
        .map(|other| other.id())
        .collect()
}

/// Parse the `p=<x>,<y>` tag out of a `;`-separated descriptor.
///
/// Arguments after `y` (layout hints) are ignored. A missing tag, a missing
/// coordinate or a non-finite coordinate is a configuration error.
pub fn parse_position(descriptor: &str) -> Result<Position, ConfigError> {
    let args = descriptor
        .split(';')
        .map(str::trim)
        .find_map(|tag| tag.strip_prefix("p="))
        .ok_or_else(|| ConfigError::MissingPositionTag {
            descriptor: descriptor.to_string(),
        })?;

    let malformed = || ConfigError::MalformedPosition {
        descriptor: descriptor.to_string(),
    };

    let mut coords = args.split(',').map(str::trim);
    let x = parse_coordinate(coords.next()).ok_or_else(malformed)?;
    let y = parse_coordinate(coords.next()).ok_or_else(malformed)?;

    Ok(Position::new(x, y))
}

fn parse_coordinate(raw: Option<&str>) -> Option<f64> {
    raw.filter(|s| !s.is_empty())
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|v| v.is_finite())
}
