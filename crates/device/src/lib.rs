//! Device capability probing and device placement.

pub mod capability;
pub mod selector;

pub use capability::*;
pub use selector::*;
