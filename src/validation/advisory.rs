//! User-facing advisories
//!
//! The validator reports each corrective action through an [`AdvisorySink`]
//! before applying it. Any `FnMut(&Advisory)` closure is a sink.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AdvisoryKind {
    /// A sublayer was moved to restore the strength ordering.
    Reordered,
    /// A capture reference was rewritten to the canonical location.
    ReferenceRewritten,
    /// A capture reference was removed because the file is unreachable.
    ReferenceDropped,
    /// A lock or mute flag was reset.
    FlagsReconciled,
    /// A correction was skipped because the stack is malformed.
    CorrectionSkipped,
}

/// One non-fatal message for the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Advisory {
    pub kind: AdvisoryKind,
    /// Identifier of the layer concerned.
    pub layer: String,
    pub message: String,
}

impl fmt::Display for Advisory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// One-way receiver of advisories.
pub trait AdvisorySink {
    fn advise(&mut self, advisory: &Advisory);
}

impl<F> AdvisorySink for F
where
    F: FnMut(&Advisory),
{
    fn advise(&mut self, advisory: &Advisory) {
        self(advisory)
    }
}

/// Keeps every advisory it receives.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    pub advisories: Vec<Advisory>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, kind: AdvisoryKind) -> usize {
        self.advisories.iter().filter(|a| a.kind == kind).count()
    }

    pub fn clear(&mut self) {
        self.advisories.clear();
    }
}

impl AdvisorySink for RecordingSink {
    fn advise(&mut self, advisory: &Advisory) {
        self.advisories.push(advisory.clone());
    }
}

/// Drops every advisory. The validator logs them regardless.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscardSink;

impl AdvisorySink for DiscardSink {
    fn advise(&mut self, _advisory: &Advisory) {}
}
