//! Calibration values published as groups of topics.
//!
//! A calibration named `Shooter` lives under the namespace prefix as six
//! topics:
//!
//! ```text
//! /Calibrations/Shooter/units      string
//! /Calibrations/Shooter/min        double
//! /Calibrations/Shooter/max        double
//! /Calibrations/Shooter/default    double
//! /Calibrations/Shooter/curValue   double
//! /Calibrations/Shooter/desValue   double   (written by tuning clients)
//! ```
//!
//! [`CalibrationTracker`] is a [`TopicListener`] that assembles these into
//! [`Calibration`] entries. An entry is surfaced only once it is complete.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use ntlink_protocol::Value;
use ntlink_topics::Topic;
use tracing::trace;

use crate::TopicListener;

/// One calibration as observed so far.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Calibration {
    pub name: String,
    pub units: Option<String>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub default: Option<f64>,
    pub current: Option<f64>,
    pub desired: Option<f64>,
}

impl Calibration {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    /// Units, min, max, default and current value have each been seen.
    pub fn is_complete(&self) -> bool {
        self.units.is_some()
            && self.min.is_some()
            && self.max.is_some()
            && self.default.is_some()
            && self.current.is_some()
    }

    fn apply(&mut self, field: &str, value: &Value) -> bool {
        match field {
            "units" => {
                let Some(units) = value.as_str() else {
                    return false;
                };
                self.units = Some(units.to_string());
            }
            "min" | "max" | "default" | "curValue" | "desValue" => {
                let Some(v) = value.as_f64() else {
                    return false;
                };
                let slot = match field {
                    "min" => &mut self.min,
                    "max" => &mut self.max,
                    "default" => &mut self.default,
                    "curValue" => &mut self.current,
                    _ => &mut self.desired,
                };
                *slot = Some(v);
            }
            _ => return false,
        }
        true
    }
}

/// Collects calibrations from topics under a namespace prefix.
///
/// Register it as a client-wide or per-subscription listener. Unannouncing
/// a field topic does not forget values already seen.
#[derive(Debug)]
pub struct CalibrationTracker {
    prefix: String,
    entries: Mutex<BTreeMap<String, Calibration>>,
}

impl Default for CalibrationTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl CalibrationTracker {
    pub const DEFAULT_PREFIX: &'static str = "/Calibrations/";

    /// A tracker for [`Self::DEFAULT_PREFIX`].
    pub fn new() -> Self {
        Self::with_prefix(Self::DEFAULT_PREFIX)
    }

    /// A tracker for a custom prefix. A trailing `/` is added if missing.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        let mut prefix = prefix.into();
        if !prefix.ends_with('/') {
            prefix.push('/');
        }
        Self {
            prefix,
            entries: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The topic a tuning client publishes to request a new value.
    pub fn desired_topic_name(&self, calibration: &str) -> String {
        format!("{}{calibration}/desValue", self.prefix)
    }

    /// Complete entries, ordered by name.
    pub fn complete_entries(&self) -> Vec<Calibration> {
        self.entries()
            .values()
            .filter(|c| c.is_complete())
            .cloned()
            .collect()
    }

    /// An entry by name, complete or not.
    pub fn entry(&self, name: &str) -> Option<Calibration> {
        self.entries().get(name).cloned()
    }

    /// Number of calibrations seen, complete or not.
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Splits `<prefix><Name>/<field>` into `(Name, field)`.
    fn split<'a>(&self, topic: &'a str) -> Option<(&'a str, &'a str)> {
        let rest = topic.strip_prefix(self.prefix.as_str())?;
        let (name, field) = rest.rsplit_once('/')?;
        (!name.is_empty() && !field.is_empty()).then_some((name, field))
    }

    fn entries(&self) -> MutexGuard<'_, BTreeMap<String, Calibration>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TopicListener for CalibrationTracker {
    fn on_announce(&self, topic: &Topic) {
        if let Some((name, _)) = self.split(&topic.name) {
            self.entries()
                .entry(name.to_string())
                .or_insert_with(|| Calibration::new(name));
        }
    }

    fn on_value(&self, topic: &Topic, _timestamp_us: i64, value: &Value) {
        let Some((name, field)) = self.split(&topic.name) else {
            return;
        };
        let mut entries = self.entries();
        let entry = entries
            .entry(name.to_string())
            .or_insert_with(|| Calibration::new(name));
        if entry.apply(field, value) {
            trace!(name, field, complete = entry.is_complete(), "calibration field");
        }
    }
}

#[cfg(test)]
mod tests {
    use ntlink_protocol::{Properties, TopicId, ValueType};

    use super::*;

    fn topic(name: &str, value_type: ValueType) -> Topic {
        Topic {
            id: TopicId(1),
            name: name.to_string(),
            value_type,
            properties: Properties::new(),
            pubuid: None,
        }
    }

    fn feed(tracker: &CalibrationTracker, field: &str, value: Value) {
        let ty = value.canonical_type();
        let t = topic(&format!("/Calibrations/Shooter/{field}"), ty);
        tracker.on_announce(&t);
        tracker.on_value(&t, 0, &value);
    }

    #[test]
    fn test_entry_complete_after_required_fields() {
        let tracker = CalibrationTracker::new();
        feed(&tracker, "units", Value::from("RPM"));
        feed(&tracker, "min", Value::Double(0.0));
        feed(&tracker, "max", Value::Double(6000.0));
        feed(&tracker, "default", Value::Double(3000.0));
        assert!(tracker.complete_entries().is_empty(), "curValue still missing");

        feed(&tracker, "curValue", Value::Double(3100.0));
        let complete = tracker.complete_entries();
        assert_eq!(complete.len(), 1);
        assert_eq!(complete[0].name, "Shooter");
        assert_eq!(complete[0].units.as_deref(), Some("RPM"));
        assert_eq!(complete[0].current, Some(3100.0));
        assert_eq!(complete[0].desired, None, "desValue is not required");
    }

    #[test]
    fn test_announce_alone_creates_incomplete_entry() {
        let tracker = CalibrationTracker::new();
        tracker.on_announce(&topic("/Calibrations/Arm/min", ValueType::Double));
        assert_eq!(tracker.len(), 1);
        assert!(!tracker.entry("Arm").unwrap().is_complete());
    }

    #[test]
    fn test_unannounce_keeps_observed_values() {
        let tracker = CalibrationTracker::new();
        feed(&tracker, "min", Value::Double(1.0));
        tracker.on_unannounce(&topic("/Calibrations/Shooter/min", ValueType::Double));
        assert_eq!(tracker.entry("Shooter").unwrap().min, Some(1.0));
    }

    #[test]
    fn test_topics_outside_prefix_are_ignored() {
        let tracker = CalibrationTracker::new();
        tracker.on_value(
            &topic("/Signals/Rpm", ValueType::Double),
            0,
            &Value::Double(1.0),
        );
        tracker.on_announce(&topic("/Calibrations/loose", ValueType::Double));
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_wrong_value_type_is_not_recorded() {
        let tracker = CalibrationTracker::new();
        feed(&tracker, "units", Value::Double(1.0));
        feed(&tracker, "min", Value::from("low"));
        let entry = tracker.entry("Shooter").unwrap();
        assert_eq!(entry.units, None);
        assert_eq!(entry.min, None);
    }

    #[test]
    fn test_integer_values_are_accepted_as_numbers() {
        let tracker = CalibrationTracker::new();
        feed(&tracker, "max", Value::Int(10));
        assert_eq!(tracker.entry("Shooter").unwrap().max, Some(10.0));
    }

    #[test]
    fn test_desired_topic_name() {
        let tracker = CalibrationTracker::new();
        assert_eq!(
            tracker.desired_topic_name("Shooter"),
            "/Calibrations/Shooter/desValue"
        );
        let custom = CalibrationTracker::with_prefix("/Tuning");
        assert_eq!(custom.prefix(), "/Tuning/");
        assert_eq!(custom.desired_topic_name("Arm"), "/Tuning/Arm/desValue");
    }
}
