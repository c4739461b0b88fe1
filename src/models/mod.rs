//! Content models for the club website.
//!
//! Documents are schema-light JSON objects; these types name where they live
//! and provide the helpers shared by the content service and the editors.

mod content;
mod fallback;
mod site;

pub use content::*;
pub use fallback::*;
pub use site::*;
