//! Repository layer: entity-scoped database operations.
//!
//! Free functions over `&Connection` so they compose inside a caller's
//! transaction (`Transaction` derefs to `Connection`).

mod category_mapping;
mod patient_link;
mod recommendation;
mod report;
mod specialist;

pub use category_mapping::*;
pub use patient_link::*;
pub use recommendation::*;
pub use report::*;
pub use specialist::*;
