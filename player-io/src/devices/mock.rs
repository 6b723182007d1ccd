//! Simulated robot for running the server without a physics engine
//!
//! Provides a deterministic [`DeviceRegistry`] with a small humanoid layout:
//!
//! | Device | Kind |
//! |--------|------|
//! | `Neck`, `Head`, `ShoulderL/R`, `ElbowL/R`, `HipL/R`, `KneeL/R`, `AnkleL/R` | Motor |
//! | `<motor>S` | Position sensor tracking the motor |
//! | `accelerometer` | Accelerometer (gravity only) |
//! | `gyro` | Gyro (rest) |
//! | `camera` | Camera (moving gradient) |
//! | `left_foot_bumper`, `right_foot_bumper` | Touch (bumper) |
//! | `left_foot_force`, `right_foot_force` | Touch (force) |
//! | `left_foot_force3d`, `right_foot_force3d` | Touch (3D force) |
//! | `led` | Unsupported |
//!
//! Motors move toward their target position at their velocity limit each
//! [`SimulatedRobot::advance`] call. Sensors only report while enabled.

use crate::devices::{
    Camera, CameraImage, DeviceKind, DeviceRegistry, Motor, SensorKind, SensorSample, TouchKind,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const GRAVITY: f64 = 9.81;

const MOTOR_NAMES: [&str; 12] = [
    "Neck", "Head", "ShoulderL", "ShoulderR", "ElbowL", "ElbowR", "HipL", "HipR", "KneeL", "KneeR",
    "AnkleL", "AnkleR",
];

/// Parameters of the simulated robot
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SimulationConfig {
    #[serde(default = "default_camera_width")]
    pub camera_width: u32,
    #[serde(default = "default_camera_height")]
    pub camera_height: u32,
    /// Total mass, split evenly over both feet for force readings
    #[serde(default = "default_mass_kg")]
    pub mass_kg: f64,
    /// Default motor velocity limit (rad/s)
    #[serde(default = "default_max_velocity")]
    pub max_velocity: f64,
}

fn default_camera_width() -> u32 {
    160
}
fn default_camera_height() -> u32 {
    120
}
fn default_mass_kg() -> f64 {
    3.0
}
fn default_max_velocity() -> f64 {
    5.0
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            camera_width: default_camera_width(),
            camera_height: default_camera_height(),
            mass_kg: default_mass_kg(),
            max_velocity: default_max_velocity(),
        }
    }
}

/// Position-controlled joint
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedMotor {
    pub position: f64,
    pub target: f64,
    pub velocity: f64,
    pub force: f64,
    pub torque: f64,
    pub pid: [f64; 3],
}

impl SimulatedMotor {
    fn new(max_velocity: f64) -> Self {
        Self {
            position: 0.0,
            target: 0.0,
            velocity: max_velocity,
            force: 0.0,
            torque: 0.0,
            pid: [10.0, 0.0, 0.0],
        }
    }

    fn advance(&mut self, dt_s: f64) {
        let max_step = self.velocity.abs() * dt_s;
        let error = self.target - self.position;
        self.position += error.clamp(-max_step, max_step);
    }
}

impl Motor for SimulatedMotor {
    fn set_position(&mut self, position: f64) {
        self.target = position;
    }

    fn set_velocity(&mut self, velocity: f64) {
        self.velocity = velocity;
    }

    fn set_force(&mut self, force: f64) {
        self.force = force;
    }

    fn set_torque(&mut self, torque: f64) {
        self.torque = torque;
    }

    fn set_control_pid(&mut self, p: f64, i: f64, d: f64) {
        self.pid = [p, i, d];
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedCamera {
    pub exposure: f64,
}

impl Camera for SimulatedCamera {
    fn set_exposure(&mut self, exposure: f64) {
        self.exposure = exposure;
    }
}

#[derive(Debug, Clone)]
enum SimDevice {
    Motor(SimulatedMotor),
    Camera(SimulatedCamera),
    Sensor {
        kind: SensorKind,
        /// Motor whose position a position sensor reports
        tracks: Option<String>,
    },
    Other(String),
}

/// Deterministic stand-in for the simulation engine's device registry
pub struct SimulatedRobot {
    config: SimulationConfig,
    devices: BTreeMap<String, SimDevice>,
    /// Sampling periods of enabled sensors (absent = disabled)
    periods: BTreeMap<String, u32>,
    time_ms: u64,
}

impl SimulatedRobot {
    /// Robot with the humanoid device layout
    pub fn humanoid(config: SimulationConfig) -> Self {
        let mut devices = BTreeMap::new();

        for motor in MOTOR_NAMES {
            devices.insert(
                motor.to_string(),
                SimDevice::Motor(SimulatedMotor::new(config.max_velocity)),
            );
            devices.insert(
                format!("{}S", motor),
                SimDevice::Sensor {
                    kind: SensorKind::PositionSensor,
                    tracks: Some(motor.to_string()),
                },
            );
        }

        let sensors = [
            ("accelerometer", SensorKind::Accelerometer),
            ("gyro", SensorKind::Gyro),
            ("left_foot_bumper", SensorKind::Touch(TouchKind::Bumper)),
            ("right_foot_bumper", SensorKind::Touch(TouchKind::Bumper)),
            ("left_foot_force", SensorKind::Touch(TouchKind::Force)),
            ("right_foot_force", SensorKind::Touch(TouchKind::Force)),
            ("left_foot_force3d", SensorKind::Touch(TouchKind::Force3d)),
            ("right_foot_force3d", SensorKind::Touch(TouchKind::Force3d)),
        ];
        for (name, kind) in sensors {
            devices.insert(name.to_string(), SimDevice::Sensor { kind, tracks: None });
        }

        devices.insert(
            "camera".to_string(),
            SimDevice::Camera(SimulatedCamera { exposure: 1.0 }),
        );
        devices.insert("led".to_string(), SimDevice::Other("LED".to_string()));

        log::debug!("Simulated robot with {} devices", devices.len());

        Self {
            config,
            devices,
            periods: BTreeMap::new(),
            time_ms: 0,
        }
    }

    /// Advance motors by one simulation step
    pub fn advance(&mut self, step_ms: u32) {
        let dt_s = f64::from(step_ms) / 1000.0;
        for device in self.devices.values_mut() {
            if let SimDevice::Motor(motor) = device {
                motor.advance(dt_s);
            }
        }
        self.time_ms += u64::from(step_ms);
    }

    /// Inspect a motor's state
    pub fn motor_state(&self, name: &str) -> Option<&SimulatedMotor> {
        match self.devices.get(name) {
            Some(SimDevice::Motor(motor)) => Some(motor),
            _ => None,
        }
    }

    /// Inspect a camera's state
    pub fn camera_state(&self, name: &str) -> Option<&SimulatedCamera> {
        match self.devices.get(name) {
            Some(SimDevice::Camera(camera)) => Some(camera),
            _ => None,
        }
    }

    /// Sampling period of a sensor, `None` while disabled
    pub fn sampling_period(&self, name: &str) -> Option<u32> {
        self.periods.get(name).copied()
    }

    fn camera_image(&self) -> CameraImage {
        let width = self.config.camera_width;
        let height = self.config.camera_height;
        let shift = (self.time_ms / 8) as u32;
        let mut bgra = Vec::with_capacity((width * height * 4) as usize);
        for y in 0..height {
            for x in 0..width {
                bgra.push(((x + shift) % 256) as u8);
                bgra.push((y % 256) as u8);
                bgra.push(((x + y) % 256) as u8);
                bgra.push(255);
            }
        }
        CameraImage {
            width,
            height,
            bgra,
        }
    }
}

impl DeviceRegistry for SimulatedRobot {
    fn device_kind(&self, name: &str) -> Option<DeviceKind> {
        self.devices.get(name).map(|device| match device {
            SimDevice::Motor(_) => DeviceKind::Motor,
            SimDevice::Camera(_) => DeviceKind::Sensor(SensorKind::Camera),
            SimDevice::Sensor { kind, .. } => DeviceKind::Sensor(*kind),
            SimDevice::Other(node) => DeviceKind::Unsupported(node.clone()),
        })
    }

    fn motor(&mut self, name: &str) -> Option<&mut dyn Motor> {
        match self.devices.get_mut(name) {
            Some(SimDevice::Motor(motor)) => Some(motor as &mut dyn Motor),
            _ => None,
        }
    }

    fn camera(&mut self, name: &str) -> Option<&mut dyn Camera> {
        match self.devices.get_mut(name) {
            Some(SimDevice::Camera(camera)) => Some(camera as &mut dyn Camera),
            _ => None,
        }
    }

    fn set_sampling_period(&mut self, name: &str, _kind: SensorKind, period_ms: u32) {
        if period_ms == 0 {
            self.periods.remove(name);
        } else {
            self.periods.insert(name.to_string(), period_ms);
        }
    }

    fn sample(&mut self, name: &str, kind: SensorKind) -> Option<SensorSample> {
        if !self.periods.contains_key(name) {
            return None;
        }
        let foot_load = self.config.mass_kg * GRAVITY / 2.0;

        match (self.devices.get(name)?, kind) {
            (SimDevice::Camera(_), SensorKind::Camera) => {
                Some(SensorSample::Image(self.camera_image()))
            }
            (SimDevice::Sensor { tracks, .. }, SensorKind::PositionSensor) => {
                let motor = tracks.as_deref().and_then(|m| self.motor_state(m))?;
                Some(SensorSample::Scalar(motor.position))
            }
            (SimDevice::Sensor { .. }, SensorKind::Accelerometer) => {
                Some(SensorSample::Vector3([0.0, 0.0, GRAVITY]))
            }
            (SimDevice::Sensor { .. }, SensorKind::Gyro) => {
                Some(SensorSample::Vector3([0.0, 0.0, 0.0]))
            }
            (SimDevice::Sensor { .. }, SensorKind::Touch(TouchKind::Bumper)) => {
                Some(SensorSample::Scalar(1.0))
            }
            (SimDevice::Sensor { .. }, SensorKind::Touch(TouchKind::Force)) => {
                Some(SensorSample::Scalar(foot_load))
            }
            (SimDevice::Sensor { .. }, SensorKind::Touch(TouchKind::Force3d)) => {
                Some(SensorSample::Vector3([0.0, 0.0, foot_load]))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_kinds() {
        let robot = SimulatedRobot::humanoid(SimulationConfig::default());
        assert_eq!(robot.device_kind("Neck"), Some(DeviceKind::Motor));
        assert_eq!(
            robot.device_kind("NeckS"),
            Some(DeviceKind::Sensor(SensorKind::PositionSensor))
        );
        assert_eq!(
            robot.device_kind("camera"),
            Some(DeviceKind::Sensor(SensorKind::Camera))
        );
        assert_eq!(
            robot.device_kind("led"),
            Some(DeviceKind::Unsupported("LED".to_string()))
        );
        assert_eq!(robot.device_kind("tail"), None);
    }

    #[test]
    fn test_motor_moves_toward_target() {
        let mut robot = SimulatedRobot::humanoid(SimulationConfig::default());
        robot.motor("KneeL").unwrap().set_position(1.0);

        // 5 rad/s over 100 ms
        robot.advance(100);
        let knee = robot.motor_state("KneeL").unwrap();
        assert!((knee.position - 0.5).abs() < 1e-9);

        robot.advance(200);
        let knee = robot.motor_state("KneeL").unwrap();
        assert!((knee.position - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_sensor_reports_only_when_enabled() {
        let mut robot = SimulatedRobot::humanoid(SimulationConfig::default());
        assert!(robot.sample("accelerometer", SensorKind::Accelerometer).is_none());

        robot.set_sampling_period("accelerometer", SensorKind::Accelerometer, 16);
        assert_eq!(robot.sampling_period("accelerometer"), Some(16));
        assert_eq!(
            robot.sample("accelerometer", SensorKind::Accelerometer),
            Some(SensorSample::Vector3([0.0, 0.0, GRAVITY]))
        );

        robot.set_sampling_period("accelerometer", SensorKind::Accelerometer, 0);
        assert!(robot.sample("accelerometer", SensorKind::Accelerometer).is_none());
    }

    #[test]
    fn test_camera_image_size() {
        let config = SimulationConfig {
            camera_width: 4,
            camera_height: 3,
            ..Default::default()
        };
        let mut robot = SimulatedRobot::humanoid(config);
        robot.set_sampling_period("camera", SensorKind::Camera, 32);

        match robot.sample("camera", SensorKind::Camera) {
            Some(SensorSample::Image(image)) => {
                assert_eq!((image.width, image.height), (4, 3));
                assert_eq!(image.bgra.len(), 4 * 3 * 4);
            }
            other => panic!("unexpected sample {:?}", other),
        }
    }

    #[test]
    fn test_camera_exposure() {
        let mut robot = SimulatedRobot::humanoid(SimulationConfig::default());
        robot.camera("camera").unwrap().set_exposure(0.25);
        assert_eq!(robot.camera_state("camera").unwrap().exposure, 0.25);
        assert!(robot.camera("Neck").is_none());
    }
}
