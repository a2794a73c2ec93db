//! Observation model: payload tokenizing, carry-over merge, per-point
//! checkpoints and the sequence-numbered history they are replayed from.

pub mod checkpoint;
pub mod entry_set;
pub mod merge;
pub mod sequence_buffer;
pub mod tokenizer;
pub mod value;

pub use checkpoint::{Checkpoint, CheckpointEntry};
pub use entry_set::{Entry, EntrySet, EntrySetChange};
pub use merge::{merge, merge_data_set, MergeDecision, MergeOutcome};
pub use sequence_buffer::{
    AppendOutcome, HistoryError, RangeStatus, SampleWindow, SequenceBuffer, SequenceInfo,
    DEFAULT_BUFFER_CAPACITY, DEFAULT_CHECKPOINT_INTERVAL,
};
pub use tokenizer::{parse_payload, tokenize, Token, TokenizedPayload};
pub use value::{ObservationRecord, ObservationValue, PointId, PointSpec, ResetTrigger, Sequence};
