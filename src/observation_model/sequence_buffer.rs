use super::checkpoint::{Checkpoint, CheckpointEntry};
use super::value::{ObservationRecord, PointId, Sequence};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

/// Default ring capacity (2^17 records).
pub const DEFAULT_BUFFER_CAPACITY: usize = 1 << 17;
/// Default number of appends between periodic checkpoints.
pub const DEFAULT_CHECKPOINT_INTERVAL: u64 = 1_000;

/// Historical query failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HistoryError {
    #[error("sequence {requested} has been evicted (oldest retained sequence is {first_available})")]
    SequenceEvicted {
        requested: Sequence,
        first_available: Sequence,
    },
    #[error("sequence {requested} has not been assigned yet (next sequence is {next})")]
    SequenceOutOfRange { requested: Sequence, next: Sequence },
    #[error("sequence {requested} is more than {limit} behind the last sequence {last}")]
    ReplayDepthExceeded {
        requested: Sequence,
        limit: u64,
        last: Sequence,
    },
}

/// How a range request related to the retained window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RangeStatus {
    Complete,
    /// The start had been evicted; records begin at `available_from`.
    Clipped {
        requested: Sequence,
        available_from: Sequence,
    },
    /// Nothing exists at or beyond the requested start.
    Exhausted,
}

/// Records returned by a range request plus the window they came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleWindow {
    pub records: Vec<ObservationRecord>,
    /// Sequence to resume from on the next request.
    pub next_sequence: Sequence,
    /// Oldest retained sequence at the time of the request.
    pub first_sequence: Sequence,
    pub last_sequence: Sequence,
    pub status: RangeStatus,
}

/// Retained window of the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SequenceInfo {
    pub first_sequence: Sequence,
    pub last_sequence: Sequence,
    pub next_sequence: Sequence,
    pub capacity: usize,
}

/// Outcome of appending a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppendOutcome {
    pub sequence: Sequence,
    /// Sequence of the record overwritten to make room, if the ring was full.
    pub evicted: Option<Sequence>,
}

/// Fixed-capacity ring of recorded deltas, numbered by a global sequence.
///
/// Evicted records are folded into a floor checkpoint so that the state as of
/// any retained sequence can still be rebuilt exactly. With a checkpoint
/// interval configured, a full checkpoint is also kept every `interval`
/// appends to bound replay length.
#[derive(Debug, Clone)]
pub struct SequenceBuffer {
    slots: Vec<Option<ObservationRecord>>,
    next_sequence: Sequence,
    first_sequence: Sequence,
    floor: Checkpoint,
    head: Option<Checkpoint>,
    checkpoints: BTreeMap<Sequence, Checkpoint>,
    checkpoint_interval: Option<u64>,
    max_as_of_depth: Option<u64>,
    first_seen: HashMap<PointId, Sequence>,
}

impl SequenceBuffer {
    /// Creates a buffer without periodic checkpoints.
    pub fn new(capacity: usize) -> Self {
        Self::with_checkpoint_interval(capacity, None)
    }

    pub fn with_checkpoint_interval(capacity: usize, checkpoint_interval: Option<u64>) -> Self {
        assert!(capacity > 0, "sequence buffer capacity must be > 0");
        let checkpoint_interval = checkpoint_interval.filter(|interval| *interval > 0);
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            next_sequence: 1,
            first_sequence: 1,
            floor: Checkpoint::new(),
            head: checkpoint_interval.map(|_| Checkpoint::new()),
            checkpoints: BTreeMap::new(),
            checkpoint_interval,
            max_as_of_depth: None,
            first_seen: HashMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of retained records.
    pub fn len(&self) -> usize {
        (self.next_sequence - self.first_sequence) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn first_sequence(&self) -> Sequence {
        self.first_sequence
    }

    pub fn next_sequence(&self) -> Sequence {
        self.next_sequence
    }

    /// Last assigned sequence, 0 before the first append.
    pub fn last_sequence(&self) -> Sequence {
        self.next_sequence - 1
    }

    pub fn info(&self) -> SequenceInfo {
        SequenceInfo {
            first_sequence: self.first_sequence,
            last_sequence: self.last_sequence(),
            next_sequence: self.next_sequence,
            capacity: self.capacity(),
        }
    }

    /// Limits how far behind the last sequence a reconstruction may reach.
    /// Evicted and never-observed outcomes take precedence over the limit.
    pub fn set_max_as_of_depth(&mut self, limit: Option<u64>) {
        self.max_as_of_depth = limit;
    }

    pub fn max_as_of_depth(&self) -> Option<u64> {
        self.max_as_of_depth
    }

    /// Number of periodic checkpoints currently held.
    pub fn checkpoint_count(&self) -> usize {
        self.checkpoints.len()
    }

    /// Assigns the next sequence to `record` and stores it, overwriting the
    /// oldest record when the ring is full.
    pub fn append(&mut self, mut record: ObservationRecord) -> AppendOutcome {
        let sequence = self.next_sequence;
        record.sequence = sequence;
        let slot = self.slot_index(sequence);

        let evicted = self.slots[slot].take().map(|old| {
            assert_eq!(
                old.sequence, self.first_sequence,
                "ring slot {slot} out of step with the retained window"
            );
            self.floor.fold(&old);
            self.first_sequence = old.sequence + 1;
            self.checkpoints = self.checkpoints.split_off(&self.first_sequence);
            old.sequence
        });

        self.first_seen
            .entry(record.point_id.clone())
            .or_insert(sequence);
        if let Some(head) = self.head.as_mut() {
            head.fold(&record);
            if let Some(interval) = self.checkpoint_interval {
                if sequence % interval == 0 {
                    self.checkpoints.insert(sequence, head.clone());
                }
            }
        }
        self.slots[slot] = Some(record);
        self.next_sequence += 1;

        AppendOutcome { sequence, evicted }
    }

    /// Retained record with the given sequence.
    pub fn get(&self, sequence: Sequence) -> Option<&ObservationRecord> {
        if sequence < self.first_sequence || sequence >= self.next_sequence {
            return None;
        }
        self.slots[self.slot_index(sequence)]
            .as_ref()
            .filter(|record| record.sequence == sequence)
    }

    /// Up to `count` records with `sequence >= from`, in sequence order.
    pub fn range(&self, from: Sequence, count: usize) -> SampleWindow {
        self.range_filtered(from, count, |_| true)
    }

    /// Up to `count` records matching `filter`, scanning forward from `from`.
    pub fn range_filtered<F>(&self, from: Sequence, count: usize, filter: F) -> SampleWindow
    where
        F: Fn(&ObservationRecord) -> bool,
    {
        let start = from.max(self.first_sequence);
        let mut status = if from < self.first_sequence && self.first_sequence > 1 {
            RangeStatus::Clipped {
                requested: from,
                available_from: self.first_sequence,
            }
        } else {
            RangeStatus::Complete
        };
        if start >= self.next_sequence {
            status = RangeStatus::Exhausted;
        }

        let mut records = Vec::new();
        let mut cursor = start;
        while cursor < self.next_sequence && records.len() < count {
            if let Some(record) = self.get(cursor) {
                if filter(record) {
                    records.push(record.clone());
                }
            }
            cursor += 1;
        }

        SampleWindow {
            records,
            next_sequence: cursor,
            first_sequence: self.first_sequence,
            last_sequence: self.last_sequence(),
            status,
        }
    }

    /// State of `point_id` as of `sequence`, `Ok(None)` when the point had not
    /// been observed by then.
    pub fn reconstruct_as_of(
        &self,
        point_id: &PointId,
        sequence: Sequence,
    ) -> Result<Option<CheckpointEntry>, HistoryError> {
        self.check_in_range(sequence)?;
        match self.first_seen.get(point_id) {
            Some(first) if *first <= sequence => {}
            _ => return Ok(None),
        }
        self.check_retained(sequence)?;
        self.check_depth(sequence)?;

        let (base_sequence, base) = self.base_for(sequence);
        let mut entry = base.get(point_id).cloned();
        for record in self.replay(base_sequence, sequence) {
            if &record.point_id != point_id {
                continue;
            }
            match entry.as_mut() {
                Some(entry) => entry.fold(record),
                None => entry = Some(CheckpointEntry::from_record(record)),
            }
        }
        Ok(entry)
    }

    /// State of every point observed by `sequence`.
    pub fn reconstruct_all_as_of(&self, sequence: Sequence) -> Result<Checkpoint, HistoryError> {
        self.check_in_range(sequence)?;
        if sequence == 0 {
            return Ok(Checkpoint::new());
        }
        self.check_retained(sequence)?;
        self.check_depth(sequence)?;
        let (base_sequence, base) = self.base_for(sequence);
        let mut checkpoint = base.clone();
        for record in self.replay(base_sequence, sequence) {
            checkpoint.fold(record);
        }
        Ok(checkpoint)
    }

    fn check_in_range(&self, sequence: Sequence) -> Result<(), HistoryError> {
        if sequence >= self.next_sequence {
            return Err(HistoryError::SequenceOutOfRange {
                requested: sequence,
                next: self.next_sequence,
            });
        }
        Ok(())
    }

    fn check_retained(&self, sequence: Sequence) -> Result<(), HistoryError> {
        if sequence != 0 && sequence < self.first_sequence {
            return Err(HistoryError::SequenceEvicted {
                requested: sequence,
                first_available: self.first_sequence,
            });
        }
        Ok(())
    }

    fn check_depth(&self, sequence: Sequence) -> Result<(), HistoryError> {
        let last = self.last_sequence();
        match self.max_as_of_depth {
            Some(limit) if last - sequence > limit => Err(HistoryError::ReplayDepthExceeded {
                requested: sequence,
                limit,
                last,
            }),
            _ => Ok(()),
        }
    }

    /// Latest checkpoint at or below `sequence`, falling back to the floor.
    fn base_for(&self, sequence: Sequence) -> (Sequence, &Checkpoint) {
        self.checkpoints
            .range(..=sequence)
            .next_back()
            .map(|(at, checkpoint)| (*at, checkpoint))
            .unwrap_or((self.first_sequence - 1, &self.floor))
    }

    /// Retained records in `(after, through]`.
    fn replay(&self, after: Sequence, through: Sequence) -> impl Iterator<Item = &ObservationRecord> {
        (after + 1..=through).filter_map(move |sequence| self.get(sequence))
    }

    fn slot_index(&self, sequence: Sequence) -> usize {
        (sequence % self.slots.len() as u64) as usize
    }
}
