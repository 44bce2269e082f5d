//! Repository pattern for database operations
//!
//! Postgres-backed `MetadataStore` built on SeaORM.

use crate::db::models::*;
use crate::db::{DbPool, MetadataStore};
use crate::errors::Result;
use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set,
};

const CREATE_PAPERS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS papers (
    id           UUID PRIMARY KEY,
    title        TEXT NOT NULL,
    source_url   TEXT NOT NULL,
    filename     TEXT UNIQUE,
    authors      TEXT,
    publish_date TEXT,
    uploaded_at  TIMESTAMPTZ NOT NULL,
    file_size    BIGINT
)
"#;

const CREATE_UPLOADED_AT_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_papers_uploaded_at ON papers (uploaded_at DESC)";

/// Repository for data access operations
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get the read connection
    fn read_conn(&self) -> &DatabaseConnection {
        self.pool.read()
    }

    /// Get the write connection
    fn write_conn(&self) -> &DatabaseConnection {
        self.pool.write()
    }

    /// Create the papers table and its index if missing
    pub async fn ensure_schema(&self) -> Result<()> {
        let conn = self.write_conn();
        conn.execute_unprepared(CREATE_PAPERS_TABLE).await?;
        conn.execute_unprepared(CREATE_UPLOADED_AT_INDEX).await?;
        tracing::info!("Papers schema ready");
        Ok(())
    }
}

#[async_trait]
impl MetadataStore for Repository {
    async fn insert_paper(&self, paper: Paper) -> Result<()> {
        let row = PaperActiveModel {
            id: Set(paper.id),
            title: Set(paper.title),
            source_url: Set(paper.source_url),
            filename: Set(paper.filename),
            authors: Set(paper.authors),
            publish_date: Set(paper.publish_date),
            uploaded_at: Set(paper.uploaded_at),
            file_size: Set(paper.file_size),
        };

        row.insert(self.write_conn()).await?;
        Ok(())
    }

    async fn list_papers(&self) -> Result<Vec<Paper>> {
        PaperEntity::find()
            .order_by_desc(PaperColumn::UploadedAt)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    async fn find_by_filenames(&self, filenames: &[String]) -> Result<Vec<Paper>> {
        if filenames.is_empty() {
            return Ok(Vec::new());
        }

        PaperEntity::find()
            .filter(PaperColumn::Filename.is_in(filenames.iter().cloned()))
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }
}
