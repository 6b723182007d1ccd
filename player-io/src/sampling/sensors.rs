//! Enabled-sensor bookkeeping
//!
//! Sensors enabled during a cycle first go to `pending` and are only merged
//! into `active` after that cycle's batch is built. A sensor therefore never
//! reports a value in the same message that acknowledges its enabling.

use crate::devices::SensorKind;
use std::collections::BTreeMap;

/// A sensor that is being sampled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveSensor {
    pub kind: SensorKind,
    pub period_ms: u32,
}

/// Result of [`EnabledSensorSet::enable`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enabled {
    /// Newly enabled, first sample in a later cycle
    Pending,
    /// Already active, sampling period replaced
    PeriodUpdated,
}

/// `active` and `pending` sensor sets, disjoint by construction
#[derive(Debug, Default)]
pub struct EnabledSensorSet {
    active: BTreeMap<String, ActiveSensor>,
    pending: BTreeMap<String, ActiveSensor>,
}

impl EnabledSensorSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable `name` at `period_ms` (non-zero)
    pub fn enable(&mut self, name: &str, kind: SensorKind, period_ms: u32) -> Enabled {
        let sensor = ActiveSensor { kind, period_ms };
        if let Some(active) = self.active.get_mut(name) {
            *active = sensor;
            Enabled::PeriodUpdated
        } else {
            self.pending.insert(name.to_string(), sensor);
            Enabled::Pending
        }
    }

    /// Stop sampling `name`. Returns false if it was not enabled.
    pub fn disable(&mut self, name: &str) -> bool {
        let was_active = self.active.remove(name).is_some();
        let was_pending = self.pending.remove(name).is_some();
        was_active || was_pending
    }

    /// Merge `pending` into `active`, returning how many sensors moved
    pub fn promote_pending(&mut self) -> usize {
        let promoted = self.pending.len();
        self.active.append(&mut self.pending);
        promoted
    }

    /// Sensors sampled this cycle, in name order
    pub fn active(&self) -> impl Iterator<Item = (&str, &ActiveSensor)> {
        self.active.iter().map(|(name, sensor)| (name.as_str(), sensor))
    }

    pub fn is_active(&self, name: &str) -> bool {
        self.active.contains_key(name)
    }

    pub fn is_pending(&self, name: &str) -> bool {
        self.pending.contains_key(name)
    }

    pub fn active_len(&self) -> usize {
        self.active.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enable_goes_pending_then_active() {
        let mut set = EnabledSensorSet::new();
        assert_eq!(set.enable("gyro", SensorKind::Gyro, 32), Enabled::Pending);
        assert!(set.is_pending("gyro"));
        assert!(!set.is_active("gyro"));
        assert_eq!(set.active().count(), 0);

        assert_eq!(set.promote_pending(), 1);
        assert!(set.is_active("gyro"));
        assert!(!set.is_pending("gyro"));
        assert_eq!(set.promote_pending(), 0);
    }

    #[test]
    fn test_reenable_updates_period() {
        let mut set = EnabledSensorSet::new();
        set.enable("gyro", SensorKind::Gyro, 32);
        set.promote_pending();

        assert_eq!(set.enable("gyro", SensorKind::Gyro, 64), Enabled::PeriodUpdated);
        assert!(!set.is_pending("gyro"));
        let (_, sensor) = set.active().next().unwrap();
        assert_eq!(sensor.period_ms, 64);
    }

    #[test]
    fn test_disable() {
        let mut set = EnabledSensorSet::new();
        set.enable("gyro", SensorKind::Gyro, 32);
        set.promote_pending();
        set.enable("accelerometer", SensorKind::Accelerometer, 32);

        assert!(set.disable("gyro"));
        assert!(!set.is_active("gyro"));
        assert!(set.disable("accelerometer"));
        assert!(!set.is_pending("accelerometer"));
        assert!(!set.disable("camera"));
        assert_eq!(set.promote_pending(), 0);
        assert_eq!(set.active_len(), 0);
    }
}
