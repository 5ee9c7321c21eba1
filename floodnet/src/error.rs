//! Configuration errors.
//!
//! Only configuration problems are errors. Hop-limit drops, duplicate drops
//! and empty neighbor sets are normal protocol outcomes and are reported via
//! [`Disposition`](crate::types::Disposition) instead.

use alloc::string::String;

use crate::types::NodeId;

/// A fatal problem with the network description or node parameters.
///
/// Continuing with partial topology information would silently corrupt
/// connectivity decisions, so these abort the run.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// Descriptor has no `p=` tag.
    #[error("position descriptor {descriptor:?} has no `p=` tag")]
    MissingPositionTag { descriptor: String },

    /// `p=` tag present but the coordinates do not parse.
    #[error("malformed position in descriptor {descriptor:?}")]
    MalformedPosition { descriptor: String },

    /// Connection range is negative, NaN or infinite.
    #[error("node {node}: invalid connection range {range}")]
    InvalidRange { node: NodeId, range: f64 },

    /// A required per-node parameter was not supplied.
    #[error("node {node}: missing required parameter `{parameter}`")]
    MissingParameter {
        node: NodeId,
        parameter: &'static str,
    },

    /// The same node id appears twice in a network description.
    #[error("duplicate node id {node}")]
    DuplicateNodeId { node: NodeId },

    /// A link or action refers to a node that does not exist.
    #[error("unknown node id {node}")]
    UnknownNode { node: NodeId },

    /// History capacity must be at least 1.
    #[error("history capacity must be at least 1")]
    InvalidHistoryCapacity,

    /// Origination delay window is empty or inverted.
    #[error("invalid origination delay window [{min_ms}ms, {max_ms}ms]")]
    InvalidDelayWindow { min_ms: u64, max_ms: u64 },

    /// A scenario was built without choosing a topology.
    #[error("no topology specified")]
    MissingTopology,
}
