//! Protobuf message types exchanged with the remote controller.
//!
//! Generated at build time from `proto/messages.proto`.
//!
//! - [`ActuatorRequests`] (inbound): motor, camera and sensor-timestep commands
//! - [`SensorMeasurements`] (outbound): one batch of measurements and diagnostics per cycle

include!(concat!(env!("OUT_DIR"), "/playerio.rs"));

impl From<[f64; 3]> for Vector3 {
    fn from(v: [f64; 3]) -> Self {
        Self {
            x: v[0],
            y: v[1],
            z: v[2],
        }
    }
}
