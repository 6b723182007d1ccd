//! Device registry abstraction
//!
//! The simulation engine owns the robot's devices. PlayerIO only looks them up
//! by name, applies actuator commands and reads sensor values, all through
//! [`DeviceRegistry`].
//!
//! - [`DeviceKind`]: what a name resolves to
//! - [`SensorKind`]: tagged sensor type, resolved once when a sensor is enabled
//! - [`SensorSample`]: value returned by [`DeviceRegistry::sample`]

pub mod mock;

/// Touch sensor flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TouchKind {
    /// Binary contact (value 1.0 when pressed)
    Bumper,
    /// Scalar force
    Force,
    /// Three-axis force
    Force3d,
}

/// Sensor types that can be enabled and sampled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorKind {
    Accelerometer,
    Camera,
    Gyro,
    PositionSensor,
    Touch(TouchKind),
}

/// What a device name resolves to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceKind {
    Motor,
    Sensor(SensorKind),
    /// Exists in the simulation but PlayerIO has no protocol mapping for it
    Unsupported(String),
}

impl DeviceKind {
    /// Sensor kind, if this device can be enabled with a timestep
    pub fn sensor(&self) -> Option<SensorKind> {
        match self {
            DeviceKind::Sensor(kind) => Some(*kind),
            _ => None,
        }
    }
}

/// Raw camera frame as exposed by the simulation (4 bytes per pixel, BGRA)
#[derive(Debug, Clone, PartialEq)]
pub struct CameraImage {
    pub width: u32,
    pub height: u32,
    pub bgra: Vec<u8>,
}

/// One sensor reading
#[derive(Debug, Clone, PartialEq)]
pub enum SensorSample {
    Scalar(f64),
    Vector3([f64; 3]),
    Image(CameraImage),
}

/// Motor actuator
pub trait Motor {
    fn set_position(&mut self, position: f64);
    fn set_velocity(&mut self, velocity: f64);
    fn set_force(&mut self, force: f64);
    fn set_torque(&mut self, torque: f64);
    fn set_control_pid(&mut self, p: f64, i: f64, d: f64);
}

/// Camera controls beyond sampling
pub trait Camera {
    fn set_exposure(&mut self, exposure: f64);
}

/// Name-based access to the simulated robot's devices
pub trait DeviceRegistry {
    /// Resolve a device name, `None` if the robot has no such device
    fn device_kind(&self, name: &str) -> Option<DeviceKind>;

    /// Motor named `name`, `None` if absent or not a motor
    fn motor(&mut self, name: &str) -> Option<&mut dyn Motor>;

    /// Camera named `name`, `None` if absent or not a camera
    fn camera(&mut self, name: &str) -> Option<&mut dyn Camera>;

    /// Set the sampling period of a sensor in milliseconds, 0 disables it
    fn set_sampling_period(&mut self, name: &str, kind: SensorKind, period_ms: u32);

    /// Current reading of an enabled sensor
    fn sample(&mut self, name: &str, kind: SensorKind) -> Option<SensorSample>;
}
