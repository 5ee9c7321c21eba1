//! Collaborator traits at the boundary between the protocol and its host.
//!
//! The protocol core never schedules, delivers or draws randomness on its
//! own. A host (the simulator in `floodsim`, or a firmware runtime) supplies:
//! - [`Transport`]: unacknowledged one-hop sends
//! - [`Timer`]: the single recurring origination self-event per node
//! - [`Random`]: the source for the randomized re-arm delay
//! - [`DeliverySink`]: where a sink hands off accepted packets
//! - [`NeighborSource`]: who a node can currently reach
//!
//! All calls are synchronous and expected to succeed; a send is a local
//! enqueue, not a network operation.

use alloc::collections::BTreeSet;

use crate::time::Duration;
use crate::types::{NodeId, Packet};

/// Outbound one-hop sends.
pub trait Transport {
    /// Send one copy of `packet` to the neighbor `to`. Fire-and-forget.
    fn send_to(&mut self, to: NodeId, packet: Packet);
}

/// Timer service for a node's origination self-event.
///
/// The host guarantees the event comes back to
/// [`SensorNode::on_origination_timer`](crate::engine::SensorNode::on_origination_timer)
/// in time order, unless it was cancelled first.
pub trait Timer {
    /// Request a self-event for `node` after `delay`.
    fn schedule_after(&mut self, node: NodeId, delay: Duration);

    /// Void any pending request for `node`. Cancelling twice is harmless.
    fn cancel(&mut self, node: NodeId);
}

/// Random number source.
///
/// Injected so test suites and simulations can drive deterministic schedules.
pub trait Random {
    /// Generate a random u64 in `[min, max)`. Returns `min` if the range is empty.
    fn gen_range(&mut self, min: u64, max: u64) -> u64;

    /// Uniform delay in `[min, max]`, inclusive at both ends.
    fn gen_delay(&mut self, min: Duration, max: Duration) -> Duration {
        let lo = min.as_millis();
        let hi = max.as_millis().max(lo);
        Duration::from_millis(self.gen_range(lo, hi.saturating_add(1)))
    }
}

/// Receives packets accepted by a sink.
pub trait DeliverySink {
    /// `from` is the neighbor the packet arrived from.
    fn delivered(&mut self, packet: &Packet, from: NodeId);
}

/// Current set of reachable peers for a node.
///
/// Implementations must not include `me` in the result.
pub trait NeighborSource {
    fn neighbors(&self, me: NodeId) -> BTreeSet<NodeId>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn send_to(&mut self, to: NodeId, packet: Packet) {
        (**self).send_to(to, packet)
    }
}

impl<T: Timer + ?Sized> Timer for &mut T {
    fn schedule_after(&mut self, node: NodeId, delay: Duration) {
        (**self).schedule_after(node, delay)
    }

    fn cancel(&mut self, node: NodeId) {
        (**self).cancel(node)
    }
}

#[cfg(any(test, feature = "test-support"))]
pub mod test_impls {
    //! Mock implementations of the collaborator traits for unit tests.
    //!
    //! Available when running tests or with the `test-support` feature enabled.

    use alloc::vec::Vec;

    use super::*;

    /// Records every send in order.
    #[derive(Debug, Default)]
    pub struct MockTransport {
        sent: Vec<(NodeId, Packet)>,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self::default()
        }

        /// Take all sends recorded so far.
        pub fn take_sent(&mut self) -> Vec<(NodeId, Packet)> {
            core::mem::take(&mut self.sent)
        }

        pub fn sent(&self) -> &[(NodeId, Packet)] {
            &self.sent
        }

        /// Destinations of recorded sends, in send order.
        pub fn destinations(&self) -> Vec<NodeId> {
            self.sent.iter().map(|(to, _)| *to).collect()
        }
    }

    impl Transport for MockTransport {
        fn send_to(&mut self, to: NodeId, packet: Packet) {
            self.sent.push((to, packet));
        }
    }

    /// A recorded timer call.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum TimerCall {
        Schedule { node: NodeId, delay: Duration },
        Cancel { node: NodeId },
    }

    /// Records schedule and cancel calls.
    #[derive(Debug, Default)]
    pub struct MockTimer {
        pub calls: Vec<TimerCall>,
    }

    impl MockTimer {
        pub fn new() -> Self {
            Self::default()
        }

        /// Delay of the most recent schedule request, if any.
        pub fn last_delay(&self) -> Option<Duration> {
            self.calls.iter().rev().find_map(|call| match call {
                TimerCall::Schedule { delay, .. } => Some(*delay),
                TimerCall::Cancel { .. } => None,
            })
        }

        pub fn schedule_count(&self) -> usize {
            self.calls
                .iter()
                .filter(|call| matches!(call, TimerCall::Schedule { .. }))
                .count()
        }

        pub fn cancel_count(&self) -> usize {
            self.calls
                .iter()
                .filter(|call| matches!(call, TimerCall::Cancel { .. }))
                .count()
        }
    }

    impl Timer for MockTimer {
        fn schedule_after(&mut self, node: NodeId, delay: Duration) {
            self.calls.push(TimerCall::Schedule { node, delay });
        }

        fn cancel(&mut self, node: NodeId) {
            self.calls.push(TimerCall::Cancel { node });
        }
    }

    /// Deterministic random source (LCG), or a fixed value for exact schedules.
    #[derive(Debug, Clone)]
    pub struct MockRandom {
        pub state: u64,
        fixed: Option<u64>,
    }

    impl Default for MockRandom {
        fn default() -> Self {
            Self {
                state: 12345,
                fixed: None,
            }
        }
    }

    impl MockRandom {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_seed(seed: u64) -> Self {
            Self {
                state: seed,
                fixed: None,
            }
        }

        /// Always return `value`, clamped into the requested range.
        pub fn always(value: u64) -> Self {
            Self {
                state: 0,
                fixed: Some(value),
            }
        }
    }

    impl Random for MockRandom {
        fn gen_range(&mut self, min: u64, max: u64) -> u64 {
            if max <= min {
                return min;
            }
            if let Some(value) = self.fixed {
                return value.clamp(min, max - 1);
            }
            self.state = self.state.wrapping_mul(6364136223846793005).wrapping_add(1);
            min + (self.state % (max - min))
        }
    }

    /// Collects packets handed to a sink.
    #[derive(Debug, Default)]
    pub struct RecordingSink {
        pub delivered: Vec<(Packet, NodeId)>,
    }

    impl RecordingSink {
        pub fn new() -> Self {
            Self::default()
        }
    }

    impl DeliverySink for RecordingSink {
        fn delivered(&mut self, packet: &Packet, from: NodeId) {
            self.delivered.push((*packet, from));
        }
    }
}
