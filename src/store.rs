//! Concurrent observation store.
//!
//! Lock order is point slot or config, then history, then logger. Ingests for
//! different points only contend on the history mutex while their record is
//! appended; "current" readers never touch the history at all.

use crate::config::{ConfigError, ConfigKnobClass, ConfigPatchResult, StoreConfig};
use crate::observability::logging::{JsonLineLogger, LogLevel, LogSink, LoggingError};
use crate::observability::telemetry::{StoreTelemetry, StoreTelemetrySnapshot};
use crate::observation_model::{
    merge, Checkpoint, CheckpointEntry, HistoryError, ObservationValue, PointId, PointSpec,
    SampleWindow, Sequence, SequenceBuffer, SequenceInfo,
};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use thiserror::Error;

const MODULE: &str = "store";

/// Result of ingesting one payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// A record was appended under `sequence`.
    Recorded {
        sequence: Sequence,
        /// Sequence overwritten in the ring to make room.
        evicted: Option<Sequence>,
    },
    /// No net change; nothing was recorded.
    Duplicate,
}

impl IngestOutcome {
    pub fn sequence(&self) -> Option<Sequence> {
        match self {
            IngestOutcome::Recorded { sequence, .. } => Some(*sequence),
            IngestOutcome::Duplicate => None,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, IngestOutcome::Duplicate)
    }
}

/// Errors raised by the store facade.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("point {0} is not registered")]
    UnknownPoint(PointId),
    #[error("point {0} is already registered")]
    PointAlreadyRegistered(PointId),
    #[error(transparent)]
    History(#[from] HistoryError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Logging(#[from] LoggingError),
}

#[derive(Debug)]
struct PointSlot {
    spec: PointSpec,
    current: RwLock<Option<CheckpointEntry>>,
}

/// In-memory store of point observations: current state per point plus a
/// bounded, sequence-numbered history of every change.
#[derive(Debug)]
pub struct ObservationStore {
    points: RwLock<HashMap<PointId, Arc<PointSlot>>>,
    history: Mutex<SequenceBuffer>,
    config: RwLock<StoreConfig>,
    config_version: AtomicU64,
    logger: Mutex<JsonLineLogger>,
    telemetry: StoreTelemetry,
}

impl ObservationStore {
    /// Opens a store and registers the points listed in `config`. Log lines go
    /// to the configured `log_target`.
    pub fn open(config: StoreConfig) -> Result<Self, StoreError> {
        config.validate()?;
        let sink = LogSink::open(&config.log_target, config.log_rotation)?;
        Self::open_with_log_sink(config, sink)
    }

    /// Like [`open`](Self::open) but logs to `sink` regardless of `log_target`.
    pub fn open_with_log_sink(config: StoreConfig, sink: LogSink) -> Result<Self, StoreError> {
        config.validate()?;
        let mut history =
            SequenceBuffer::with_checkpoint_interval(config.buffer_capacity, config.checkpoint_interval);
        history.set_max_as_of_depth(config.max_as_of_depth);
        let logger = JsonLineLogger::new(sink).with_level(config.log_level);
        let points = config.points.clone();
        let store = Self {
            points: RwLock::new(HashMap::new()),
            history: Mutex::new(history),
            config: RwLock::new(config),
            config_version: AtomicU64::new(1),
            logger: Mutex::new(logger),
            telemetry: StoreTelemetry::default(),
        };
        for point in points {
            store.register_point(point)?;
        }
        Ok(store)
    }

    pub fn register_point(&self, spec: PointSpec) -> Result<(), StoreError> {
        let mut points = self.points.write().expect("point registry lock poisoned");
        if points.contains_key(&spec.id) {
            return Err(StoreError::PointAlreadyRegistered(spec.id));
        }
        points.insert(
            spec.id.clone(),
            Arc::new(PointSlot {
                spec,
                current: RwLock::new(None),
            }),
        );
        Ok(())
    }

    /// Registered points ordered by id.
    pub fn points(&self) -> Vec<PointSpec> {
        let points = self.points.read().expect("point registry lock poisoned");
        let mut specs: Vec<PointSpec> = points.values().map(|slot| slot.spec.clone()).collect();
        specs.sort_by(|a, b| a.id.cmp(&b.id));
        specs
    }

    /// Merges a raw payload for `point_id`, recording the change unless it is
    /// a duplicate.
    pub fn ingest(
        &self,
        point_id: &PointId,
        timestamp: &str,
        raw_payload: &str,
    ) -> Result<IngestOutcome, StoreError> {
        let slot = self.slot(point_id)?;
        let mut current = slot.current.write().expect("point state lock poisoned");

        let outcome = merge(
            &slot.spec,
            current.as_ref().map(|entry| &entry.effective_state),
            raw_payload,
        );
        if outcome.is_duplicate() {
            self.telemetry.duplicate_suppressed();
            let sequence = current.as_ref().map_or(0, |entry| entry.sequence);
            self.log(timestamp, LogLevel::Trace, point_id.as_str(), sequence, "duplicate suppressed");
            return Ok(IngestOutcome::Duplicate);
        }

        let mut record = outcome.to_record(0, timestamp, point_id.clone());
        let appended = self
            .history
            .lock()
            .expect("history lock poisoned")
            .append(record.clone());
        record.sequence = appended.sequence;

        match current.as_mut() {
            Some(entry) => entry.update(&record, outcome.effective),
            None => *current = Some(CheckpointEntry::new(&record, outcome.effective)),
        }

        self.telemetry.record_appended();
        self.log(timestamp, LogLevel::Debug, point_id.as_str(), appended.sequence, "record appended");
        if let Some(trigger) = &record.reset_trigger {
            self.telemetry.reset_triggered();
            self.log(
                timestamp,
                LogLevel::Info,
                point_id.as_str(),
                appended.sequence,
                &format!("reset triggered by {trigger}"),
            );
        }
        if let Some(evicted) = appended.evicted {
            self.telemetry.record_evicted();
            self.log(
                timestamp,
                LogLevel::Debug,
                point_id.as_str(),
                appended.sequence,
                &format!("evicted record {evicted} from sequence buffer"),
            );
        }

        Ok(IngestOutcome::Recorded {
            sequence: appended.sequence,
            evicted: appended.evicted,
        })
    }

    /// Effective state of a point, `None` until its first recorded observation.
    pub fn get_current(&self, point_id: &PointId) -> Result<Option<ObservationValue>, StoreError> {
        Ok(self
            .current_entry(point_id)?
            .map(|entry| entry.effective_state))
    }

    /// Current checkpoint entry, including the sequence that produced it.
    pub fn current_entry(&self, point_id: &PointId) -> Result<Option<CheckpointEntry>, StoreError> {
        let slot = self.slot(point_id)?;
        let current = slot.current.read().expect("point state lock poisoned");
        Ok(current.clone())
    }

    /// Current state of every observed point.
    pub fn current_all(&self) -> Checkpoint {
        let slots: Vec<Arc<PointSlot>> = {
            let points = self.points.read().expect("point registry lock poisoned");
            points.values().cloned().collect()
        };
        let mut checkpoint = Checkpoint::new();
        for slot in slots {
            if let Some(entry) = slot.current.read().expect("point state lock poisoned").clone() {
                checkpoint.insert(entry);
            }
        }
        checkpoint
    }

    pub fn range(&self, from: Sequence, count: usize) -> SampleWindow {
        self.history
            .lock()
            .expect("history lock poisoned")
            .range(from, count)
    }

    /// Like [`range`](Self::range) but only returns records of `point_ids`.
    pub fn range_filtered(&self, from: Sequence, count: usize, point_ids: &[PointId]) -> SampleWindow {
        let wanted: BTreeSet<&PointId> = point_ids.iter().collect();
        self.history
            .lock()
            .expect("history lock poisoned")
            .range_filtered(from, count, |record| wanted.contains(&record.point_id))
    }

    /// Effective state of a point as of `sequence`.
    pub fn reconstruct_as_of(
        &self,
        point_id: &PointId,
        sequence: Sequence,
    ) -> Result<Option<ObservationValue>, StoreError> {
        Ok(self
            .entry_as_of(point_id, sequence)?
            .map(|entry| entry.effective_state))
    }

    /// Checkpoint entry of a point as of `sequence`, carrying the sequence,
    /// timestamp and reset trigger of the latest record applied.
    pub fn entry_as_of(
        &self,
        point_id: &PointId,
        sequence: Sequence,
    ) -> Result<Option<CheckpointEntry>, StoreError> {
        self.slot(point_id)?;
        let result = self
            .history
            .lock()
            .expect("history lock poisoned")
            .reconstruct_as_of(point_id, sequence);
        self.observe_history_result(point_id.as_str(), sequence, result)
    }

    /// State of every point as of `sequence`.
    pub fn current_at(&self, sequence: Sequence) -> Result<Checkpoint, StoreError> {
        let result = self
            .history
            .lock()
            .expect("history lock poisoned")
            .reconstruct_all_as_of(sequence);
        self.observe_history_result("", sequence, result)
    }

    pub fn sequence_info(&self) -> SequenceInfo {
        self.history.lock().expect("history lock poisoned").info()
    }

    pub fn telemetry(&self) -> StoreTelemetrySnapshot {
        self.telemetry.snapshot()
    }

    pub fn config(&self) -> StoreConfig {
        self.config.read().expect("config lock poisoned").clone()
    }

    pub fn config_version(&self) -> u64 {
        self.config_version.load(Ordering::Acquire)
    }

    /// Applies hot knobs at runtime; restart-class knobs are rejected.
    pub fn patch_config(&self, patch: &Value) -> Result<ConfigPatchResult, StoreError> {
        let mut config = self.config.write().expect("config lock poisoned");
        let changed_keys = config.patch(patch)?;
        let version = if changed_keys.is_empty() {
            self.config_version.load(Ordering::Acquire)
        } else {
            self.config_version.fetch_add(1, Ordering::AcqRel) + 1
        };
        self.history
            .lock()
            .expect("history lock poisoned")
            .set_max_as_of_depth(config.max_as_of_depth);
        self.logger
            .lock()
            .expect("logger lock poisoned")
            .set_level(config.log_level);
        Ok(ConfigPatchResult {
            version,
            impact: ConfigKnobClass::Hot,
            changed_keys,
        })
    }

    /// Most recent log lines, oldest first.
    pub fn log_lines(&self) -> Vec<String> {
        self.logger
            .lock()
            .expect("logger lock poisoned")
            .recent()
            .cloned()
            .collect()
    }

    fn slot(&self, point_id: &PointId) -> Result<Arc<PointSlot>, StoreError> {
        self.points
            .read()
            .expect("point registry lock poisoned")
            .get(point_id)
            .cloned()
            .ok_or_else(|| StoreError::UnknownPoint(point_id.clone()))
    }

    fn observe_history_result<T>(
        &self,
        point_id: &str,
        sequence: Sequence,
        result: Result<T, HistoryError>,
    ) -> Result<T, StoreError> {
        if let Err(HistoryError::SequenceEvicted { first_available, .. }) = &result {
            self.telemetry.evicted_query();
            let message = format!("as-of query hit evicted history (oldest retained {first_available})");
            self.log("", LogLevel::Warn, point_id, sequence, &message);
        }
        result.map_err(StoreError::from)
    }

    fn log(&self, ts: &str, level: LogLevel, point_id: &str, sequence: Sequence, message: &str) {
        let mut logger = self.logger.lock().expect("logger lock poisoned");
        if logger.enabled(level) {
            let _ = logger.log(ts, level, MODULE, point_id, sequence, message);
        }
    }
}
