//! Data sink: a terminal node that collects flooded packets.
//!
//! A sink applies the same hop-ceiling and duplicate checks as a sensor, but
//! never originates and never forwards. Accepted packets go to a
//! [`DeliverySink`].

use crate::config::EngineConfig;
use crate::engine::admit;
use crate::error::ConfigError;
use crate::history::PacketHistory;
use crate::traits::DeliverySink;
use crate::types::{Disposition, NodeId, NodeMetrics, Packet};

/// Collector node. Has no timer and no transport.
pub struct SinkNode<D: DeliverySink> {
    id: NodeId,
    config: EngineConfig,
    history: PacketHistory,
    sink: D,
    metrics: NodeMetrics,
}

impl<D: DeliverySink> SinkNode<D> {
    /// Only `history_capacity` and `max_hop_count` of `config` apply to a sink.
    pub fn new(id: NodeId, config: EngineConfig, sink: D) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            id,
            config,
            history: PacketHistory::with_capacity(config.history_capacity),
            sink,
            metrics: NodeMetrics::default(),
        })
    }

    /// Handle a packet delivered by neighbor `from`.
    pub fn on_packet_arrival(&mut self, packet: Packet, from: NodeId) -> Disposition {
        self.metrics.received += 1;

        if let Err(reason) = admit(&self.history, self.config.max_hop_count, &packet) {
            self.metrics.record_drop(reason);
            tracing::trace!(
                sink = self.id,
                from,
                originator = packet.originator,
                version = packet.version,
                %reason,
                "sink dropping packet"
            );
            return Disposition::Dropped(reason);
        }

        self.history.insert_key(packet.key());
        self.metrics.accepted += 1;
        self.metrics.delivered += 1;
        self.sink.delivered(&packet, from);

        tracing::debug!(
            sink = self.id,
            from,
            originator = packet.originator,
            version = packet.version,
            hop_count = packet.hop_count,
            "packet delivered"
        );

        Disposition::Accepted { forwarded: 0 }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn history(&self) -> &PacketHistory {
        &self.history
    }

    pub fn metrics(&self) -> &NodeMetrics {
        &self.metrics
    }

    pub fn sink(&self) -> &D {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut D {
        &mut self.sink
    }
}
