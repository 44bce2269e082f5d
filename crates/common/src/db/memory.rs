//! In-memory metadata store
//!
//! Backs the `memory` database backend for local development and serves
//! as the substitute store in tests. Failure switches let tests exercise
//! the pipelines' partial-failure paths.

use crate::db::models::Paper;
use crate::db::MetadataStore;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use sea_orm::DbErr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;

#[derive(Default)]
pub struct MemoryMetadataStore {
    papers: RwLock<Vec<Paper>>,
    fail_inserts: AtomicBool,
    fail_reads: AtomicBool,
    lookups: AtomicUsize,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent insert fail
    pub fn set_fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent list/lookup fail
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Number of batched filename lookups served
    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    /// Number of stored rows
    pub async fn len(&self) -> usize {
        self.papers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.papers.read().await.is_empty()
    }

    fn check_reads(&self) -> Result<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(AppError::Database(DbErr::Custom(
                "metadata store unavailable".to_string(),
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn insert_paper(&self, paper: Paper) -> Result<()> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(AppError::Database(DbErr::Custom(
                "metadata store unavailable".to_string(),
            )));
        }

        let mut papers = self.papers.write().await;
        // Mirrors the UNIQUE constraint on papers.filename
        if paper.filename.is_some() && papers.iter().any(|p| p.filename == paper.filename) {
            return Err(AppError::Database(DbErr::Custom(
                "duplicate key value violates unique constraint on filename".to_string(),
            )));
        }
        papers.push(paper);
        Ok(())
    }

    async fn list_papers(&self) -> Result<Vec<Paper>> {
        self.check_reads()?;
        let mut papers = self.papers.read().await.clone();
        papers.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
        Ok(papers)
    }

    async fn find_by_filenames(&self, filenames: &[String]) -> Result<Vec<Paper>> {
        self.check_reads()?;
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let papers = self.papers.read().await;
        Ok(papers
            .iter()
            .filter(|p| {
                p.filename
                    .as_ref()
                    .map(|f| filenames.contains(f))
                    .unwrap_or(false)
            })
            .cloned()
            .collect())
    }

    async fn ping(&self) -> Result<()> {
        self.check_reads()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use uuid::Uuid;

    fn paper(title: &str, filename: Option<&str>, minutes: i64) -> Paper {
        let base = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        Paper {
            id: Uuid::new_v4(),
            title: title.to_string(),
            source_url: "https://arxiv.org/abs/1706.03762".to_string(),
            filename: filename.map(String::from),
            authors: None,
            publish_date: None,
            uploaded_at: (base + Duration::minutes(minutes)).fixed_offset(),
            file_size: filename.map(|_| 1024),
        }
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let store = MemoryMetadataStore::new();
        store.insert_paper(paper("b", Some("b.pdf"), 5)).await.unwrap();
        store.insert_paper(paper("a", Some("a.pdf"), 1)).await.unwrap();
        store.insert_paper(paper("c", Some("c.pdf"), 9)).await.unwrap();

        let titles: Vec<_> = store
            .list_papers()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.title)
            .collect();
        assert_eq!(titles, vec!["c", "b", "a"]);
    }

    #[tokio::test]
    async fn test_find_by_filenames() {
        let store = MemoryMetadataStore::new();
        store.insert_paper(paper("a", Some("a.pdf"), 1)).await.unwrap();
        store.insert_paper(paper("no file", None, 2)).await.unwrap();

        let found = store
            .find_by_filenames(&["a.pdf".to_string(), "missing.pdf".to_string()])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].title, "a");
        assert_eq!(store.lookup_count(), 1);
    }

    #[tokio::test]
    async fn test_unique_filename() {
        let store = MemoryMetadataStore::new();
        store.insert_paper(paper("a", Some("a.pdf"), 1)).await.unwrap();
        assert!(store.insert_paper(paper("again", Some("a.pdf"), 2)).await.is_err());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_failure_switches() {
        let store = MemoryMetadataStore::new();
        store.set_fail_inserts(true);
        assert!(store.insert_paper(paper("a", Some("a.pdf"), 1)).await.is_err());
        assert!(store.is_empty().await);

        store.set_fail_reads(true);
        assert!(store.list_papers().await.is_err());
        assert!(store.ping().await.is_err());
    }
}
