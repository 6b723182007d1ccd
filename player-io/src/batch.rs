//! Outgoing batch of measurements and diagnostics
//!
//! One [`MeasurementBatch`] is built per cycle. Warnings collected while
//! applying commands land in the same batch as the measurements, so the
//! client learns about rejected commands with the next message it receives.

use crate::protocol::messages::message::MessageType;
use crate::protocol::messages::{Message, SensorMeasurements};

/// Measurements and diagnostics for one cycle
#[derive(Debug, Default)]
pub struct MeasurementBatch {
    measurements: SensorMeasurements,
}

impl MeasurementBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a WARNING diagnostic
    pub fn warn(&mut self, text: impl Into<String>) {
        let text = text.into();
        log::debug!("Warning for client: {}", text);
        self.push(MessageType::WarningMessage, text);
    }

    /// Append an ERROR diagnostic
    pub fn error(&mut self, text: impl Into<String>) {
        self.push(MessageType::ErrorMessage, text.into());
    }

    fn push(&mut self, kind: MessageType, text: String) {
        self.measurements.messages.push(Message {
            message_type: kind as i32,
            text,
        });
    }

    /// Stamp the batch with simulated and wall-clock time
    pub fn stamp(&mut self, time_ms: u32, real_time_ms: u64) {
        self.measurements.time = time_ms;
        self.measurements.real_time = real_time_ms;
    }

    /// Drop every record but keep the timestamps
    pub fn clear_records(&mut self) {
        let time = self.measurements.time;
        let real_time = self.measurements.real_time;
        self.measurements = SensorMeasurements {
            time,
            real_time,
            ..Default::default()
        };
    }

    /// Start over for the next cycle
    pub fn reset(&mut self) {
        self.measurements = SensorMeasurements::default();
    }

    /// Texts of the WARNING diagnostics collected so far
    pub fn warnings(&self) -> impl Iterator<Item = &str> {
        self.measurements
            .messages
            .iter()
            .filter(|m| m.message_type() == MessageType::WarningMessage)
            .map(|m| m.text.as_str())
    }

    pub fn measurements(&self) -> &SensorMeasurements {
        &self.measurements
    }

    pub fn measurements_mut(&mut self) -> &mut SensorMeasurements {
        &mut self.measurements
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::messages::PositionSensorMeasurement;

    #[test]
    fn test_diagnostics() {
        let mut batch = MeasurementBatch::new();
        batch.warn("first");
        batch.error("second");
        batch.warn("third");

        assert_eq!(batch.warnings().collect::<Vec<_>>(), vec!["first", "third"]);
        let messages = &batch.measurements().messages;
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].message_type(), MessageType::ErrorMessage);
    }

    #[test]
    fn test_clear_records_keeps_time() {
        let mut batch = MeasurementBatch::new();
        batch.stamp(96, 1234);
        batch.warn("w");
        batch
            .measurements_mut()
            .position_sensors
            .push(PositionSensorMeasurement {
                name: "NeckS".to_string(),
                value: 0.5,
            });

        batch.clear_records();
        assert_eq!(batch.measurements().time, 96);
        assert_eq!(batch.measurements().real_time, 1234);
        assert!(batch.measurements().messages.is_empty());
        assert!(batch.measurements().position_sensors.is_empty());

        batch.reset();
        assert_eq!(batch.measurements().time, 0);
    }
}
