use super::entry_set::EntrySet;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Global sequence number assigned to every recorded observation.
pub type Sequence = u64;

/// Stable identifier of a measurement point, owned by the device model.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PointId(String);

impl PointId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PointId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for PointId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Flags the device model supplies when a point is registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointSpec {
    pub id: PointId,
    /// Payloads are parsed as entry sets rather than scalars.
    #[serde(default)]
    pub is_table: bool,
    /// Every payload stands alone: no carry-over merge, no duplicate suppression.
    #[serde(default)]
    pub is_discrete: bool,
}

impl PointSpec {
    /// Cumulative data-set point.
    pub fn table(id: impl Into<PointId>) -> Self {
        Self {
            id: id.into(),
            is_table: true,
            is_discrete: false,
        }
    }

    /// Scalar point.
    pub fn scalar(id: impl Into<PointId>) -> Self {
        Self {
            id: id.into(),
            is_table: false,
            is_discrete: false,
        }
    }

    pub fn discrete(mut self) -> Self {
        self.is_discrete = true;
        self
    }
}

/// Reason a payload discarded the accumulated state of its point.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResetTrigger {
    Manual,
    Day,
    Shift,
    Week,
    Month,
    Annual,
    ActionComplete,
    Maintenance,
    Life,
    PowerOnTime,
    Other(String),
}

impl ResetTrigger {
    /// Maps the suffix of a `:NAME` token onto a trigger; unknown names are kept verbatim.
    pub fn from_name(name: &str) -> Self {
        match name {
            "MANUAL" => ResetTrigger::Manual,
            "DAY" => ResetTrigger::Day,
            "SHIFT" => ResetTrigger::Shift,
            "WEEK" => ResetTrigger::Week,
            "MONTH" => ResetTrigger::Month,
            "ANNUAL" => ResetTrigger::Annual,
            "ACTION_COMPLETE" => ResetTrigger::ActionComplete,
            "MAINTENANCE" => ResetTrigger::Maintenance,
            "LIFE" => ResetTrigger::Life,
            "POWER_ON_TIME" => ResetTrigger::PowerOnTime,
            other => ResetTrigger::Other(other.to_string()),
        }
    }

    /// Canonical uppercase representation.
    pub fn as_str(&self) -> &str {
        match self {
            ResetTrigger::Manual => "MANUAL",
            ResetTrigger::Day => "DAY",
            ResetTrigger::Shift => "SHIFT",
            ResetTrigger::Week => "WEEK",
            ResetTrigger::Month => "MONTH",
            ResetTrigger::Annual => "ANNUAL",
            ResetTrigger::ActionComplete => "ACTION_COMPLETE",
            ResetTrigger::Maintenance => "MAINTENANCE",
            ResetTrigger::Life => "LIFE",
            ResetTrigger::PowerOnTime => "POWER_ON_TIME",
            ResetTrigger::Other(name) => name,
        }
    }
}

impl fmt::Display for ResetTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ResetTrigger {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Value carried by a checkpoint or a recorded observation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ObservationValue {
    Scalar(String),
    DataSet(EntrySet),
}

impl ObservationValue {
    pub fn as_data_set(&self) -> Option<&EntrySet> {
        match self {
            ObservationValue::DataSet(set) => Some(set),
            ObservationValue::Scalar(_) => None,
        }
    }

    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            ObservationValue::Scalar(value) => Some(value),
            ObservationValue::DataSet(_) => None,
        }
    }

    /// Number of entries for data sets (the `count` attribute), 1 for scalars.
    pub fn count(&self) -> usize {
        match self {
            ObservationValue::DataSet(set) => set.len(),
            ObservationValue::Scalar(_) => 1,
        }
    }
}

/// Delta recorded in the sequence buffer for a single accepted merge.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObservationRecord {
    pub sequence: Sequence,
    pub timestamp: String,
    pub point_id: PointId,
    /// Delta for cumulative data sets, the full payload otherwise.
    pub payload: ObservationValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_trigger: Option<ResetTrigger>,
    /// Replay replaces the running state rather than merging into it.
    #[serde(skip_serializing_if = "is_false")]
    pub discrete: bool,
}

fn is_false(flag: &bool) -> bool {
    !*flag
}
