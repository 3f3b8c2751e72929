pub mod alerts;
pub mod calculator;
pub mod comparator;
pub mod emitter;
pub mod engine;
pub mod fuzzy;
pub mod hasher;
pub mod matcher;
pub mod message;
pub mod ordering;
pub mod result;
pub mod time;

// Re-export the pieces callers wire together
pub use alerts::{Alert, AlertLevel, AlertManager, Thresholds};
pub use emitter::{BatchSummary, MetricsEmitter};
pub use engine::ComparisonEngine;
pub use fuzzy::FuzzyMatcher;
pub use result::{ComparisonResult, FetchResult, SkipReason};
