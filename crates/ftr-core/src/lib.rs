//! ftr-core
//!
//! Totalizer correction engine for minute-resolution flow-meter batches.
//!
//! Pipeline per tag: COMBINE -> RECTIFY -> DIFFERENCE -> REDISTRIBUTE -> RESETS -> HOURLY
//!
//! - Split 16-bit high/low registers are recombined into one counter
//! - Zero-like and down-then-down samples are carried forward (rectified)
//! - Per-minute consumption is the forward difference of the rectified total
//! - Negative/positive consumption pairs are spread back over the stuck run
//! - Counter wraparounds are annotated with the true volume across the reset
//! - Hourly buckets substitute corrections minute by minute
//!
//! Pure deterministic logic. No IO, no wall-clock. Callers hand in an already
//! aligned [`MinuteFrame`] and persist whatever comes out.

pub mod combine;
pub mod consumption;
pub mod hourly;
pub mod pipeline;
pub mod rectify;
pub mod redistribute;
pub mod report;
pub mod reset;
mod types;

pub use combine::{combine_frame_pairs, combine_words};
pub use consumption::differences;
pub use hourly::{reconcile_frame, reconcile_hourly, HourlyBuckets, HourlyColumns, HourlyFrame};
pub use pipeline::{process_frame, process_tags, EngineConfig, TagError};
pub use rectify::{is_invalid, rectify};
pub use redistribute::{redistribute, Redistribution, RedistributionWindow};
pub use report::{BatchReport, TagFailure, TagReport};
pub use reset::{apply_resets, counter_max_for, detect_resets, CounterResetRecord, ResetPolicy};
pub use types::*;
