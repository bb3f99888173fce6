// src/watch/mod.rs

//! Filesystem watching: the change detectors, the debounce collector and the
//! compiled handler glob patterns.

pub mod collector;
pub mod detector;
pub mod patterns;

pub use collector::{Batch, BatchControl, BatchSink, ChangeSet, Collector, CollectorEvent};
pub use detector::{ChangeDetector, ChangeSource};
pub use patterns::HandlerPatterns;
