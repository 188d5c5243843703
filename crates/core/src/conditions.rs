//! Condition ledger: an insertion-ordered, type-unique set of timestamped
//! observations. The phase state machine is built on top of it.

use chrono::{DateTime, TimeZone, Utc};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use smallvec::SmallVec;

/// Source of "now" for transition timestamps.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> { Utc::now() }
}

/// Clock pinned to one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl FixedClock {
    pub fn at_secs(secs: i64) -> Self {
        Self(Utc.timestamp_opt(secs, 0).single().unwrap_or_default())
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> { self.0 }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionStatus {
    True,
    False,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub type_: String,
    pub status: ConditionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<Time>,
}

impl Condition {
    pub fn new(type_: impl Into<String>, status: ConditionStatus) -> Self {
        Self { type_: type_.into(), status, ..Default::default() }
    }

    pub fn with_reason(mut self, reason: impl Into<String>, message: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self.message = Some(message.into());
        self
    }

    pub fn is_true(&self) -> bool { self.status == ConditionStatus::True }
    pub fn is_false(&self) -> bool { self.status == ConditionStatus::False }
    pub fn is_unknown(&self) -> bool { self.status == ConditionStatus::Unknown }
}

/// The ledger. Serialized sorted by type so equal ledgers render identically;
/// deserialization keeps the incoming order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Conditions(SmallVec<[Condition; 8]>);

impl Conditions {
    pub fn new() -> Self { Self::default() }

    pub fn len(&self) -> usize { self.0.len() }
    pub fn is_empty(&self) -> bool { self.0.is_empty() }
    pub fn iter(&self) -> impl Iterator<Item = &Condition> { self.0.iter() }

    pub fn get(&self, type_: &str) -> Option<&Condition> { self.0.iter().find(|c| c.type_ == type_) }

    /// Insert or replace the condition of the same type.
    ///
    /// The transition time is refreshed only when the status changes. Returns
    /// true when status, reason or message differ from the stored entry, or
    /// when the type was not present.
    pub fn set(&mut self, mut cond: Condition, clock: &dyn Clock) -> bool {
        cond.last_transition_time = Some(Time(clock.now()));
        match self.0.iter_mut().find(|c| c.type_ == cond.type_) {
            Some(existing) => {
                if existing.status == cond.status {
                    cond.last_transition_time = existing.last_transition_time.clone();
                }
                let changed = existing.status != cond.status
                    || existing.reason != cond.reason
                    || existing.message != cond.message;
                *existing = cond;
                changed
            }
            None => {
                self.0.push(cond);
                true
            }
        }
    }

    pub fn remove(&mut self, type_: &str) -> bool {
        match self.0.iter().position(|c| c.type_ == type_) {
            Some(i) => { self.0.remove(i); true }
            None => false,
        }
    }

    /// Apply every condition of `other` in order.
    pub fn merge(&mut self, other: &Conditions, clock: &dyn Clock) -> bool {
        let mut changed = false;
        for c in other.iter() {
            changed = self.set(c.clone(), clock) || changed;
        }
        changed
    }

    pub fn is_true_for(&self, type_: &str) -> bool { self.get(type_).map(Condition::is_true).unwrap_or(false) }
    pub fn is_false_for(&self, type_: &str) -> bool { self.get(type_).map(Condition::is_false).unwrap_or(false) }
    /// Absent conditions are unknown.
    pub fn is_unknown_for(&self, type_: &str) -> bool { self.get(type_).map(Condition::is_unknown).unwrap_or(true) }
}

impl FromIterator<Condition> for Conditions {
    fn from_iter<I: IntoIterator<Item = Condition>>(iter: I) -> Self {
        let mut out = Conditions::new();
        for c in iter {
            match out.0.iter_mut().find(|e| e.type_ == c.type_) {
                Some(e) => *e = c,
                None => out.0.push(c),
            }
        }
        out
    }
}

impl Serialize for Conditions {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut sorted: Vec<&Condition> = self.0.iter().collect();
        sorted.sort_by(|a, b| a.type_.cmp(&b.type_));
        sorted.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Conditions {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let items = Vec::<Condition>::deserialize(deserializer)?;
        Ok(items.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_keeps_transition_time_when_status_unchanged() {
        let mut l = Conditions::new();
        assert!(l.set(Condition::new("Ready", ConditionStatus::True), &FixedClock::at_secs(10)));
        assert!(!l.set(Condition::new("Ready", ConditionStatus::True), &FixedClock::at_secs(20)));
        let t = l.get("Ready").and_then(|c| c.last_transition_time.clone()).unwrap();
        assert_eq!(t.0.timestamp(), 10);

        assert!(l.set(Condition::new("Ready", ConditionStatus::False), &FixedClock::at_secs(30)));
        let t = l.get("Ready").and_then(|c| c.last_transition_time.clone()).unwrap();
        assert_eq!(t.0.timestamp(), 30);
    }

    #[test]
    fn reason_change_reports_changed() {
        let clock = FixedClock::at_secs(1);
        let mut l = Conditions::new();
        l.set(Condition::new("Failed", ConditionStatus::True), &clock);
        assert!(l.set(Condition::new("Failed", ConditionStatus::True).with_reason("Boom", "it broke"), &clock));
        assert_eq!(l.len(), 1);
    }

    #[test]
    fn remove_and_unknown() {
        let clock = FixedClock::at_secs(1);
        let mut l = Conditions::new();
        l.set(Condition::new("Scaling", ConditionStatus::True), &clock);
        assert!(l.is_true_for("Scaling"));
        assert!(l.remove("Scaling"));
        assert!(!l.remove("Scaling"));
        assert!(l.is_unknown_for("Scaling"));
        assert!(!l.is_false_for("Scaling"));
    }

    #[test]
    fn serializes_sorted_keeps_insertion_order() {
        let clock = FixedClock::at_secs(1);
        let mut l = Conditions::new();
        l.set(Condition::new("Stopped", ConditionStatus::True), &clock);
        l.set(Condition::new("Initialized", ConditionStatus::True), &clock);
        assert_eq!(l.iter().next().unwrap().type_, "Stopped");
        let json = serde_json::to_value(&l).unwrap();
        assert_eq!(json[0]["type"], "Initialized");
        assert_eq!(json[1]["type"], "Stopped");
        let back: Conditions = serde_json::from_value(json).unwrap();
        assert_eq!(back.iter().next().unwrap().type_, "Initialized");
    }

    #[test]
    fn merge_applies_in_order() {
        let clock = FixedClock::at_secs(5);
        let mut a = Conditions::new();
        a.set(Condition::new("Ready", ConditionStatus::True), &clock);
        let b: Conditions = vec![
            Condition::new("Ready", ConditionStatus::False),
            Condition::new("Scaling", ConditionStatus::True),
        ].into_iter().collect();
        assert!(a.merge(&b, &clock));
        assert!(a.is_false_for("Ready"));
        assert!(a.is_true_for("Scaling"));
        assert!(!a.merge(&b, &clock));
    }
}
