use async_trait::async_trait;
use vx_core::{ArticleStorage, Error, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

pub mod backends;
pub mod service;

pub use backends::*;
pub use service::ArticleService;

#[async_trait]
pub trait StorageBackend: Send + Sync {
    fn get_error_message() -> &'static str;
    async fn new() -> Result<Self> where Self: Sized;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum StorageKind {
    #[default]
    Memory,
    Sqlite,
}

impl std::fmt::Display for StorageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageKind::Memory => write!(f, "memory"),
            StorageKind::Sqlite => write!(f, "sqlite"),
        }
    }
}

async fn open_default<T: StorageBackend + ArticleStorage + 'static>() -> Result<Arc<dyn ArticleStorage>> {
    let storage = T::new()
        .await
        .map_err(|e| Error::Storage(format!("{} ({})", T::get_error_message(), e)))?;
    Ok(Arc::new(storage))
}

/// Opens the requested backend. `path` only applies to sqlite.
pub async fn create_storage(kind: StorageKind, path: Option<&Path>) -> Result<Arc<dyn ArticleStorage>> {
    let storage = match (kind, path) {
        (StorageKind::Memory, _) => open_default::<MemoryStorage>().await?,
        #[cfg(feature = "sqlite")]
        (StorageKind::Sqlite, Some(path)) => Arc::new(SQLiteStorage::new_with_path(path).await?),
        #[cfg(feature = "sqlite")]
        (StorageKind::Sqlite, None) => open_default::<SQLiteStorage>().await?,
        #[cfg(not(feature = "sqlite"))]
        (StorageKind::Sqlite, _) => {
            return Err(Error::Config("built without the sqlite feature".to_string()))
        }
    };
    info!(backend = %kind, "Storage backend opened");
    Ok(storage)
}

pub mod prelude {
    pub use super::backends::*;
    pub use super::{create_storage, ArticleService, StorageKind};
}
