//! Sensor sampling: enabled-sensor sets, period gating and camera frames

pub mod camera;
pub mod sampler;
pub mod sensors;

pub use sampler::SensorSampler;
pub use sensors::{ActiveSensor, Enabled, EnabledSensorSet};
