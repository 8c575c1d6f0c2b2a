//! Project validation: the correction pass, its advisories and the
//! per-layer permission rules.

mod advisory;
pub mod permissions;
mod validator;

pub use advisory::{Advisory, AdvisoryKind, AdvisorySink, DiscardSink, RecordingSink};
pub use permissions::{check, check_layer, is_allowed, LayerAction};
pub use validator::{PassReport, ProjectValidator};
