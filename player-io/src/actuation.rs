//! Actuator command handling
//!
//! Applies one decoded [`ActuatorRequests`] frame to the device registry.
//! Commands that cannot be applied never fail the frame: each one adds a
//! WARNING to the outgoing batch and processing continues.
//!
//! # Command order
//!
//! | Order | Commands |
//! |-------|----------|
//! | 1 | motor position, velocity, force, torque, PID |
//! | 2 | camera quality, exposure |
//! | 3 | sensor time steps |
//!
//! Sensor time steps go last so a sensor enabled by this frame is only
//! sampled after the current batch is built.

use crate::batch::MeasurementBatch;
use crate::devices::{DeviceKind, DeviceRegistry, Motor};
use crate::protocol::messages::{ActuatorRequests, SensorTimeStep};
use crate::protocol::wire;
use crate::sampling::{Enabled, EnabledSensorSet, SensorSampler};

/// Validates and applies actuator requests
#[derive(Debug, Clone)]
pub struct ActuatorCommandApplier {
    basic_time_step_ms: u32,
}

impl ActuatorCommandApplier {
    pub fn new(basic_time_step_ms: u32) -> Self {
        Self { basic_time_step_ms }
    }

    /// Decode a raw frame payload and apply it.
    ///
    /// A payload that does not decode is reported as a warning.
    pub fn apply_payload(
        &self,
        payload: &[u8],
        registry: &mut dyn DeviceRegistry,
        sensors: &mut EnabledSensorSet,
        sampler: &mut SensorSampler,
        batch: &mut MeasurementBatch,
    ) {
        match wire::decode_requests(payload) {
            Ok(request) => self.apply(&request, registry, sensors, sampler, batch),
            Err(e) => {
                log::warn!("Discarding malformed request of {} bytes: {}", payload.len(), e);
                batch.warn(format!(
                    "Cannot parse actuator request of {} bytes ({}), ignored.",
                    payload.len(),
                    e
                ));
            }
        }
    }

    /// Apply every command of `request`
    pub fn apply(
        &self,
        request: &ActuatorRequests,
        registry: &mut dyn DeviceRegistry,
        sensors: &mut EnabledSensorSet,
        sampler: &mut SensorSampler,
        batch: &mut MeasurementBatch,
    ) {
        for cmd in &request.motor_positions {
            with_motor(registry, batch, &cmd.name, "position", |m| {
                m.set_position(cmd.position)
            });
        }
        for cmd in &request.motor_velocities {
            with_motor(registry, batch, &cmd.name, "velocity", |m| {
                m.set_velocity(cmd.velocity)
            });
        }
        for cmd in &request.motor_forces {
            with_motor(registry, batch, &cmd.name, "force", |m| m.set_force(cmd.force));
        }
        for cmd in &request.motor_torques {
            with_motor(registry, batch, &cmd.name, "torque", |m| {
                m.set_torque(cmd.torque)
            });
        }
        for cmd in &request.motor_pids {
            let mut missing_gains = false;
            with_motor(registry, batch, &cmd.name, "PID", |m| match &cmd.pid {
                Some(pid) => m.set_control_pid(pid.x, pid.y, pid.z),
                None => missing_gains = true,
            });
            if missing_gains {
                batch.warn(format!(
                    "PID command for \"{}\" carries no gains, ignored.",
                    cmd.name
                ));
            }
        }

        for cmd in &request.camera_qualities {
            if !is_camera(registry, batch, &cmd.name, "quality") {
                continue;
            }
            if !sampler.set_camera_quality(&cmd.name, cmd.quality) {
                batch.warn(format!(
                    "Quality for \"{}\" should be -1 (raw) or between 1 and 100, ignoring {} value.",
                    cmd.name, cmd.quality
                ));
            }
        }
        for cmd in &request.camera_exposures {
            if is_camera(registry, batch, &cmd.name, "exposure")
                && let Some(camera) = registry.camera(&cmd.name)
            {
                camera.set_exposure(cmd.exposure);
            }
        }

        for cmd in &request.sensor_time_steps {
            self.apply_time_step(cmd, registry, sensors, batch);
        }
    }

    fn apply_time_step(
        &self,
        cmd: &SensorTimeStep,
        registry: &mut dyn DeviceRegistry,
        sensors: &mut EnabledSensorSet,
        batch: &mut MeasurementBatch,
    ) {
        let name = cmd.name.as_str();
        let period = cmd.timestep;
        let base = self.basic_time_step_ms;

        let Some(kind) = registry.device_kind(name) else {
            batch.warn(format!(
                "Device \"{}\" not found, time step command ignored.",
                name
            ));
            return;
        };
        let Some(kind) = kind.sensor() else {
            batch.warn(format!(
                "Device \"{}\" is not supported, time step command ignored.",
                name
            ));
            return;
        };

        if period == 0 {
            registry.set_sampling_period(name, kind, 0);
            if sensors.disable(name) {
                log::debug!("Sensor \"{}\" disabled", name);
            }
            return;
        }
        if period < base {
            batch.warn(format!(
                "Time step for \"{}\" should be greater or equal to {}, ignoring {} value.",
                name, base, period
            ));
            return;
        }
        if period % base != 0 {
            batch.warn(format!(
                "Time step for \"{}\" should be a multiple of {}, ignoring {} value.",
                name, base, period
            ));
            return;
        }

        registry.set_sampling_period(name, kind, period);
        match sensors.enable(name, kind, period) {
            Enabled::Pending => log::debug!("Sensor \"{}\" enabled every {} ms", name, period),
            Enabled::PeriodUpdated => {
                log::debug!("Sensor \"{}\" period changed to {} ms", name, period)
            }
        }
    }
}

/// Run `f` on motor `name`, or warn about the ignored `command`
fn with_motor(
    registry: &mut dyn DeviceRegistry,
    batch: &mut MeasurementBatch,
    name: &str,
    command: &str,
    f: impl FnOnce(&mut dyn Motor),
) {
    match registry.device_kind(name) {
        None => batch.warn(format!(
            "Motor \"{}\" not found, {} command ignored.",
            name, command
        )),
        Some(DeviceKind::Motor) => {
            if let Some(motor) = registry.motor(name) {
                f(motor);
            }
        }
        Some(_) => batch.warn(format!(
            "Device \"{}\" is not a motor, {} command ignored.",
            name, command
        )),
    }
}

/// Check that `name` is a camera, warning about the ignored `command` otherwise
fn is_camera(
    registry: &mut dyn DeviceRegistry,
    batch: &mut MeasurementBatch,
    name: &str,
    command: &str,
) -> bool {
    if registry.camera(name).is_some() {
        return true;
    }
    if registry.device_kind(name).is_some() {
        batch.warn(format!(
            "Device \"{}\" is not a camera, {} command ignored.",
            name, command
        ));
    } else {
        batch.warn(format!(
            "Camera \"{}\" not found, {} command ignored.",
            name, command
        ));
    }
    false
}
