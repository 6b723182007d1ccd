//! Per-cycle sensor sampling
//!
//! Walks the active sensors, skips those whose sampling period does not
//! divide the current cycle time, and appends one typed record per sampled
//! sensor to the batch. Pending sensors are promoted afterwards.

use crate::batch::MeasurementBatch;
use crate::devices::{CameraImage, DeviceRegistry, SensorKind, SensorSample, TouchKind};
use crate::protocol::messages::{
    AccelerometerMeasurement, BumperMeasurement, CameraMeasurement, Force3DMeasurement,
    ForceMeasurement, GyroMeasurement, PositionSensorMeasurement, SensorMeasurements,
};
use crate::sampling::camera::{self, JPEG_QUALITY, RAW_QUALITY};
use crate::sampling::sensors::EnabledSensorSet;
use std::collections::HashMap;

/// Builds the measurement part of each outgoing batch
#[derive(Debug, Default)]
pub struct SensorSampler {
    /// Per-camera transport quality, absent = raw
    camera_quality: HashMap<String, i32>,
}

impl SensorSampler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Select raw (`-1`) or JPEG (`1..=100`) transport for a camera.
    ///
    /// Returns false and leaves the setting unchanged for any other value.
    pub fn set_camera_quality(&mut self, name: &str, quality: i32) -> bool {
        if quality == RAW_QUALITY {
            self.camera_quality.remove(name);
            true
        } else if JPEG_QUALITY.contains(&quality) {
            self.camera_quality.insert(name.to_string(), quality);
            true
        } else {
            false
        }
    }

    pub fn camera_quality(&self, name: &str) -> i32 {
        self.camera_quality
            .get(name)
            .copied()
            .unwrap_or(RAW_QUALITY)
    }

    /// Sample every due sensor into `batch`, then promote pending sensors.
    ///
    /// Returns the number of records appended.
    pub fn build(
        &self,
        registry: &mut dyn DeviceRegistry,
        sensors: &mut EnabledSensorSet,
        time_ms: u32,
        batch: &mut MeasurementBatch,
    ) -> usize {
        let mut recorded = 0;

        for (name, sensor) in sensors.active() {
            if sensor.period_ms == 0 || time_ms % sensor.period_ms != 0 {
                continue;
            }
            let Some(sample) = registry.sample(name, sensor.kind) else {
                log::debug!("Sensor \"{}\" returned no value at {} ms", name, time_ms);
                continue;
            };
            if self.record(name, sensor.kind, sample, batch.measurements_mut()) {
                recorded += 1;
            }
        }

        let promoted = sensors.promote_pending();
        if promoted > 0 {
            log::debug!("{} sensor(s) start sampling next cycle", promoted);
        }
        recorded
    }

    fn record(
        &self,
        name: &str,
        kind: SensorKind,
        sample: SensorSample,
        out: &mut SensorMeasurements,
    ) -> bool {
        let name = name.to_string();
        match (kind, sample) {
            (SensorKind::Accelerometer, SensorSample::Vector3(v)) => {
                out.accelerometers.push(AccelerometerMeasurement {
                    name,
                    value: Some(v.into()),
                });
            }
            (SensorKind::Gyro, SensorSample::Vector3(v)) => {
                out.gyros.push(GyroMeasurement {
                    name,
                    value: Some(v.into()),
                });
            }
            (SensorKind::PositionSensor, SensorSample::Scalar(value)) => {
                out.position_sensors
                    .push(PositionSensorMeasurement { name, value });
            }
            (SensorKind::Touch(TouchKind::Bumper), SensorSample::Scalar(value)) => {
                out.bumpers.push(BumperMeasurement {
                    name,
                    value: value == 1.0,
                });
            }
            (SensorKind::Touch(TouchKind::Force), SensorSample::Scalar(value)) => {
                out.forces.push(ForceMeasurement { name, value });
            }
            (SensorKind::Touch(TouchKind::Force3d), SensorSample::Vector3(v)) => {
                out.force3ds.push(Force3DMeasurement {
                    name,
                    value: Some(v.into()),
                });
            }
            (SensorKind::Camera, SensorSample::Image(frame)) => {
                if let Err(e) = camera::check_frame(&frame) {
                    log::debug!("Camera \"{}\" frame skipped: {}", name, e);
                    return false;
                }
                let measurement = self.camera_measurement(name, frame);
                out.cameras.push(measurement);
            }
            (kind, sample) => {
                log::debug!(
                    "Sensor \"{}\" ({:?}) produced an unexpected sample {:?}, skipped",
                    name,
                    kind,
                    sample
                );
                return false;
            }
        }
        true
    }

    fn camera_measurement(&self, name: String, frame: CameraImage) -> CameraMeasurement {
        let quality = self.camera_quality(&name);

        if quality != RAW_QUALITY {
            match camera::encode_jpeg(&frame, quality as u8) {
                Ok(jpeg) => {
                    return CameraMeasurement {
                        name,
                        width: frame.width,
                        height: frame.height,
                        quality,
                        image: jpeg,
                    };
                }
                Err(e) => {
                    log::warn!("JPEG encoding failed for \"{}\", sending raw: {}", name, e);
                }
            }
        }

        CameraMeasurement {
            width: frame.width,
            height: frame.height,
            quality: RAW_QUALITY,
            image: camera::bgra_to_bgr(&frame.bgra),
            name,
        }
    }
}
