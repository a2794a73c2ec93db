//! In-memory observation store for shop-floor data-set measurements.

pub mod app;
pub mod config;
pub mod observability;
pub mod observation_model;
pub mod store;

pub use config::{knob_class, ConfigError, ConfigKnobClass, ConfigPatchResult, StoreConfig};
pub use observability::logging::{
    JsonLineLogger, LogLevel, LogRotationPolicy, LogSink, LogTarget, LoggingError, RotatingFile,
    DEFAULT_LOG_TAIL,
};
pub use observability::telemetry::{
    scrape_metric_names, StoreTelemetry, StoreTelemetrySnapshot, DUPLICATES_SUPPRESSED_TOTAL,
    EVICTED_QUERIES_TOTAL, RECORDS_APPENDED_TOTAL, RECORDS_EVICTED_TOTAL, RESET_TRIGGERS_TOTAL,
};
pub use observation_model::{
    merge, merge_data_set, parse_payload, tokenize, AppendOutcome, Checkpoint, CheckpointEntry,
    Entry, EntrySet, EntrySetChange, HistoryError, MergeDecision, MergeOutcome, ObservationRecord,
    ObservationValue, PointId, PointSpec, RangeStatus, ResetTrigger, SampleWindow, Sequence,
    SequenceBuffer, SequenceInfo, Token, TokenizedPayload, DEFAULT_BUFFER_CAPACITY,
    DEFAULT_CHECKPOINT_INTERVAL,
};
pub use store::{IngestOutcome, ObservationStore, StoreError};
