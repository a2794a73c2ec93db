use super::entry_set::EntrySet;
use super::value::{ObservationRecord, ObservationValue, PointId, ResetTrigger, Sequence};
use serde::Serialize;
use std::collections::BTreeMap;

/// Effective state of one point as of a given sequence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckpointEntry {
    pub point_id: PointId,
    /// Sequence of the latest record folded into this entry.
    pub sequence: Sequence,
    pub timestamp: String,
    pub effective_state: ObservationValue,
    /// Trigger carried by the latest record, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_reset_trigger: Option<ResetTrigger>,
}

impl CheckpointEntry {
    /// Entry seeded from a point's first record.
    pub fn from_record(record: &ObservationRecord) -> Self {
        Self::new(record, folded_state(None, record))
    }

    /// Entry holding `effective_state` as produced for `record`.
    pub fn new(record: &ObservationRecord, effective_state: ObservationValue) -> Self {
        Self {
            point_id: record.point_id.clone(),
            sequence: record.sequence,
            timestamp: record.timestamp.clone(),
            effective_state,
            last_reset_trigger: record.reset_trigger.clone(),
        }
    }

    /// Installs the state computed by the merge engine for `record`.
    pub fn update(&mut self, record: &ObservationRecord, effective_state: ObservationValue) {
        assert!(
            record.sequence > self.sequence,
            "checkpoint for {} moved backwards ({} -> {})",
            self.point_id,
            self.sequence,
            record.sequence
        );
        *self = Self::new(record, effective_state);
    }

    /// Replays `record` onto this entry exactly as the merge engine produced it.
    pub fn fold(&mut self, record: &ObservationRecord) {
        let state = folded_state(Some(&self.effective_state), record);
        self.update(record, state);
    }

    pub fn count(&self) -> usize {
        self.effective_state.count()
    }
}

fn folded_state(previous: Option<&ObservationValue>, record: &ObservationRecord) -> ObservationValue {
    match &record.payload {
        ObservationValue::Scalar(_) => record.payload.clone(),
        ObservationValue::DataSet(delta) => {
            let mut state = if record.discrete || record.reset_trigger.is_some() {
                EntrySet::new()
            } else {
                previous
                    .and_then(ObservationValue::as_data_set)
                    .cloned()
                    .unwrap_or_default()
            };
            state.fold_delta(delta);
            ObservationValue::DataSet(state)
        }
    }
}

/// Per-point effective state, one entry per observed point.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Checkpoint {
    entries: BTreeMap<PointId, CheckpointEntry>,
}

impl Checkpoint {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, point_id: &PointId) -> Option<&CheckpointEntry> {
        self.entries.get(point_id)
    }

    /// Effective state of a point, `None` when it was never observed.
    pub fn get_current(&self, point_id: &PointId) -> Option<&ObservationValue> {
        self.entries
            .get(point_id)
            .map(|entry| &entry.effective_state)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CheckpointEntry> {
        self.entries.values()
    }

    pub fn insert(&mut self, entry: CheckpointEntry) {
        self.entries.insert(entry.point_id.clone(), entry);
    }

    /// Installs the merge engine's effective state for the record's point.
    pub fn update(&mut self, record: &ObservationRecord, effective_state: ObservationValue) {
        match self.entries.get_mut(&record.point_id) {
            Some(entry) => entry.update(record, effective_state),
            None => self.insert(CheckpointEntry::new(record, effective_state)),
        }
    }

    /// Replays a recorded delta onto the record's point.
    pub fn fold(&mut self, record: &ObservationRecord) {
        match self.entries.get_mut(&record.point_id) {
            Some(entry) => entry.fold(record),
            None => self.insert(CheckpointEntry::from_record(record)),
        }
    }
}
