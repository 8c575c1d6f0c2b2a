//! ModStack - Layered Scene-Override Composition
//!
//! ModStack keeps a game-asset mod project in shape: a workfile layer on
//! top, the user's mod layer as its strongest sublayer and the exported
//! capture as its weakest, locked sublayer. It also reports which captured
//! assets the mod layers replace.
//!
//! # Architecture
//!
//! - `layers`: layers, roles and the arena-backed layer stack
//! - `capture`: content hashes, the capture hash index and capture discovery
//! - `replacement`: override collection and replacement grouping
//! - `validation`: the correction pass, advisories and layer permissions
//! - `storage`: the storage collaborator and the on-disk layer format
//! - `project` / `context`: opening, saving and driving one document

pub mod capture;
pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod layers;
pub mod logging;
pub mod project;
pub mod replacement;
pub mod storage;
pub mod validation;

pub use config::{Conventions, EngineConfig};
pub use context::DocumentContext;
pub use error::{ErrorClass, ModStackError, Result};
pub use layers::{Layer, LayerId, LayerRole, LayerStack, RoleRegistry};
