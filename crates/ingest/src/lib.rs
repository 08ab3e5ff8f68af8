//! Data acquisition and orchestration: the upstream reading source, the
//! day-keyed cache, anomaly classifiers, and the two-phase load pipeline
//! that ties them together.

pub mod cache;
pub mod classifier;
pub mod merge;
pub mod orchestrator;
pub mod source;

pub use cache::{CacheStats, DayKey, MemoryCache, ReadingCache};
pub use classifier::{
    AnomalyClassifier, ClassifiedBatch, ClassifyError, HttpClassifier, LocalClassifier,
    MAX_CLASSIFY_BATCH,
};
pub use merge::{merge_flags, patch_from, AnomalyPatch};
pub use orchestrator::{
    Emission, LoadRequest, Orchestrator, PipelineError, PipelineSettings, Snapshot,
};
pub use source::{HttpReadingSource, NodeDateRange, ReadingSource, SourceError};
