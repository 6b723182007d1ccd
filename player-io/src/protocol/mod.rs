//! Wire protocol: framing and protobuf payloads

pub mod frame;
pub mod messages;
pub mod wire;

pub use frame::{DecodeStep, FrameDecoder};
pub use messages::{ActuatorRequests, SensorMeasurements};
