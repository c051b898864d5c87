//! Aggregation node: message bus seam, cloud uplink and the node itself.

mod bus;
mod cloud;
mod node;

pub use bus::{MessageBus, MqttBus};
pub use cloud::{CloudClient, ForwardOutcome};
pub use node::{FogError, FogNode, NodePhase};
