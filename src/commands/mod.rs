//! CLI commands implementation
//!
//! Every command runs against an [`Engine`], which wires the metadata
//! database, the embedding provider and the process-lifetime vector store.

pub mod context;
pub mod ingest;
pub mod index;
pub mod init;
pub mod search;
pub mod status;

pub use context::*;
pub use index::*;
pub use ingest::*;
pub use init::*;
pub use search::*;
pub use status::*;

use crate::config::Config;
use crate::context::ContextCompactor;
use crate::embed::{create_embedder, Embedder};
use crate::error::{Error, Result};
use crate::index::CodeIndexer;
use crate::ingest::DocumentIngestor;
use crate::meta::MetaDb;
use crate::reconcile::{rehydrate, rehydrate_code, RehydrateReport};
use crate::store::{InMemoryVectorStore, VectorStore};
use std::sync::Arc;

/// Shared handles used by the commands
pub struct Engine {
    pub config: Config,
    pub db: MetaDb,
    pub embedder: Arc<dyn Embedder>,
    pub store: Arc<dyn VectorStore>,
}

impl Engine {
    /// Open an initialized data directory with the configured HTTP embedder
    pub async fn open(config: Config) -> Result<Self> {
        if !config.paths.db_file.exists() {
            return Err(Error::NotInitialized);
        }
        let db = MetaDb::connect(&config).await?;
        let embedder: Arc<dyn Embedder> = Arc::from(create_embedder(&config.embedding)?);
        let store = Arc::new(InMemoryVectorStore::new(config.embedding.dimension));
        Ok(Self::from_parts(config, db, embedder, store))
    }

    pub fn from_parts(
        config: Config,
        db: MetaDb,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
    ) -> Self {
        Self {
            config,
            db,
            embedder,
            store,
        }
    }

    pub fn ingestor(&self) -> Result<DocumentIngestor> {
        DocumentIngestor::new(
            self.db.clone(),
            self.embedder.clone(),
            self.store.clone(),
            &self.config,
        )
    }

    pub fn indexer(&self) -> CodeIndexer {
        CodeIndexer::new(
            self.db.clone(),
            self.embedder.clone(),
            self.store.clone(),
            &self.config,
        )
    }

    pub fn compactor(&self) -> ContextCompactor {
        ContextCompactor::new(self.db.clone(), &self.config)
    }

    /// Re-embed persisted chunks the vector store does not hold yet
    pub async fn sync_vectors(&self) -> Result<RehydrateReport> {
        rehydrate(
            &self.db,
            self.embedder.as_ref(),
            self.store.as_ref(),
            self.config.embedding.batch_size,
        )
        .await
    }

    /// Re-embed only the code chunks a search over `workspace_path` can return
    pub async fn sync_code_vectors(&self, workspace_path: Option<&str>) -> Result<RehydrateReport> {
        rehydrate_code(
            &self.db,
            self.embedder.as_ref(),
            self.store.as_ref(),
            workspace_path,
            self.config.embedding.batch_size,
        )
        .await
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::embed::testing::HashingEmbedder;
    use tempfile::TempDir;

    /// Engine over a temp database with the hashing embedder
    pub async fn test_engine() -> (Engine, TempDir) {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::for_base_dir(Some(tmp.path().to_path_buf()));
        config.embedding.dimension = 128;
        let db = MetaDb::connect(&config).await.unwrap();
        let engine = Engine::from_parts(
            config,
            db,
            Arc::new(HashingEmbedder::new(128)),
            Arc::new(InMemoryVectorStore::new(128)),
        );
        (engine, tmp)
    }
}
