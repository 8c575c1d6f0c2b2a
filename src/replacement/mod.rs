//! Replacement tracking: which capture assets the mod layers replace.

mod grouper;
mod overrides;

pub use grouper::{CaptureProgress, Replacement, ReplacementGrouper};
pub use overrides::{collect_overrides, merged_overrides, OverrideSet};
