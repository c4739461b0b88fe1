//! Admin editing core.
//!
//! Draft/original state, field descriptors, the collection editor, the
//! config save/reset controller, and the workspace that owns them.

mod collection;
mod config;
mod draft;
mod fields;
mod sanitize;
mod workspace;

pub use collection::{CollectionEditor, CollectionView};
pub use config::{ConfigView, SaveOutcome};
pub use fields::EntitySchema;
pub use workspace::{watch_sessions, WorkspaceRegistry};
