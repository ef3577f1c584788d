//! HTTP surface over the intake pipeline.
//!
//! Upload, retry and review entrypoints plus the registry endpoints an
//! operator needs to resolve `pending_manual_assignment`. Routes are nested
//! under `/api/`.

pub mod endpoints;
pub mod error;
pub mod router;
pub mod server;
pub mod types;

pub use router::api_router;
pub use server::serve;
pub use types::ApiContext;
