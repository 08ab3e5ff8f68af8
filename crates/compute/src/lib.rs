pub mod evaluate;
pub mod interruptions;
pub mod quality;
pub mod sampling;

pub use evaluate::{annotate, evaluate, Evaluation};
pub use interruptions::{
    detect_interruptions, interruption_stats, Interruption, InterruptionStats,
    DEFAULT_MIN_DURATION_SECS, DEFAULT_VOLTAGE_THRESHOLD,
};
pub use quality::{
    classify, ParameterQuality, QualityLevel, QualityMethod, QualityStats, QualityVerdict,
};
pub use sampling::{
    decimate_for_display, plan_for_range, range_warning, sample, Resolution, SamplePlan,
    READINGS_PER_DAY,
};
