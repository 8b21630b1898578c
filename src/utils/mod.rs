//! Shared helpers with no domain state.

pub mod html;
pub mod mime;
pub mod path;
pub mod plural;
