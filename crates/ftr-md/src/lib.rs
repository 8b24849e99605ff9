//! ftr-md
//!
//! Minute-data acquisition from a historian tag view.
//!
//! This crate owns the provider abstraction, the HTTP provider and the
//! assembly of per-tag samples into one aligned [`ftr_core::MinuteFrame`].
//! It does **not** correct data or write files; callers (CLI) hand the frame
//! to `ftr-core` and `ftr-io`.

pub mod assemble;
pub mod historian;
pub mod provider;

pub use assemble::{assemble_frame, select_tags};
pub use historian::TagViewProvider;
pub use provider::{
    FetchMinutesRequest, FetchOutcome, MinuteProvider, MinuteSample, ProviderError, TagFetchFailure,
    TagSeries,
};
