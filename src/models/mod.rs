pub mod enums;
pub mod recommendation;
pub mod report;
pub mod specialist;
pub mod structured;

pub use enums::*;
pub use recommendation::*;
pub use report::*;
pub use specialist::*;
pub use structured::*;
