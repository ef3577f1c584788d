//! Shared state for the API router.

use std::path::PathBuf;
use std::sync::Arc;

use rusqlite::Connection;

use crate::api::error::ApiError;
use crate::db::sqlite::open_database;
use crate::pipeline::IntakePipeline;

/// Handed to every handler via `State`. Cheap to clone.
#[derive(Clone)]
pub struct ApiContext {
    pub db_path: Arc<PathBuf>,
    pub pipeline: Arc<IntakePipeline>,
}

impl ApiContext {
    pub fn new(db_path: PathBuf, pipeline: IntakePipeline) -> Self {
        Self {
            db_path: Arc::new(db_path),
            pipeline: Arc::new(pipeline),
        }
    }

    /// Run `f` on the blocking pool with a fresh connection.
    ///
    /// Pipeline stages do file I/O, OCR and blocking HTTP, none of which may
    /// run on the async workers.
    pub async fn blocking<T, F>(&self, f: F) -> Result<T, ApiError>
    where
        F: FnOnce(&Connection, &IntakePipeline) -> Result<T, ApiError> + Send + 'static,
        T: Send + 'static,
    {
        let db_path = Arc::clone(&self.db_path);
        let pipeline = Arc::clone(&self.pipeline);
        tokio::task::spawn_blocking(move || {
            let conn = open_database(&db_path)?;
            f(&conn, &pipeline)
        })
        .await?
    }
}
