//! Carry-over merge with duplicate compression.
//!
//! Pure: the caller owns the checkpoint and the sequence buffer and decides
//! what to do with the outcome.

use super::entry_set::EntrySet;
use super::tokenizer::{parse_payload, TokenizedPayload};
use super::value::{ObservationRecord, ObservationValue, PointId, PointSpec, ResetTrigger, Sequence};

/// Whether an incoming payload must be appended to the sequence buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeDecision {
    /// The payload changed the effective state (or reset it).
    Record,
    /// No net change: neither the checkpoint nor the buffer is touched.
    Duplicate,
}

/// Result of merging one payload against the previous effective state.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    pub decision: MergeDecision,
    /// New effective state for the checkpoint.
    pub effective: ObservationValue,
    /// Payload of the record to append.
    pub delta: ObservationValue,
    pub reset_trigger: Option<ResetTrigger>,
    pub discrete: bool,
}

impl MergeOutcome {
    pub fn is_duplicate(&self) -> bool {
        self.decision == MergeDecision::Duplicate
    }

    /// Builds the record carrying this outcome's delta.
    pub fn to_record(
        &self,
        sequence: Sequence,
        timestamp: impl Into<String>,
        point_id: PointId,
    ) -> ObservationRecord {
        ObservationRecord {
            sequence,
            timestamp: timestamp.into(),
            point_id,
            payload: self.delta.clone(),
            reset_trigger: self.reset_trigger.clone(),
            discrete: self.discrete,
        }
    }
}

/// Merges a raw payload for `point` onto its previous effective state.
pub fn merge(
    point: &PointSpec,
    previous: Option<&ObservationValue>,
    raw_payload: &str,
) -> MergeOutcome {
    if point.is_table {
        merge_data_set(point, previous, &parse_payload(raw_payload))
    } else {
        merge_scalar(point, previous, raw_payload)
    }
}

/// Merges an already tokenized data-set payload.
pub fn merge_data_set(
    point: &PointSpec,
    previous: Option<&ObservationValue>,
    payload: &TokenizedPayload,
) -> MergeOutcome {
    let empty = EntrySet::new();
    let base = if point.is_discrete {
        &empty
    } else {
        previous
            .and_then(ObservationValue::as_data_set)
            .unwrap_or(&empty)
    };
    let change = base.apply(payload);
    let decision = if !point.is_discrete && change.delta.is_empty() && !change.reset {
        MergeDecision::Duplicate
    } else {
        MergeDecision::Record
    };
    MergeOutcome {
        decision,
        effective: ObservationValue::DataSet(change.state),
        delta: ObservationValue::DataSet(change.delta),
        reset_trigger: payload.reset_trigger.clone(),
        discrete: point.is_discrete,
    }
}

fn merge_scalar(
    point: &PointSpec,
    previous: Option<&ObservationValue>,
    raw_payload: &str,
) -> MergeOutcome {
    let value = ObservationValue::Scalar(raw_payload.trim().to_string());
    let decision = if !point.is_discrete && previous == Some(&value) {
        MergeDecision::Duplicate
    } else {
        MergeDecision::Record
    };
    MergeOutcome {
        decision,
        effective: value.clone(),
        delta: value,
        reset_trigger: None,
        discrete: point.is_discrete,
    }
}
