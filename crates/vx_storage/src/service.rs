//! Read and annotation paths over an [`ArticleStorage`].
//!
//! Errors here are surfaced to the caller unchanged; nothing is retried.

use std::sync::Arc;
use tracing::{info, instrument, warn};
use vx_core::{Article, ArticleDetail, ArticleId, ArticleStorage, Error, NewNote, Result};

#[derive(Clone)]
pub struct ArticleService {
    storage: Arc<dyn ArticleStorage>,
}

impl ArticleService {
    pub fn new(storage: Arc<dyn ArticleStorage>) -> Self {
        Self { storage }
    }

    /// Every stored article, newest first.
    pub async fn list_articles(&self) -> Result<Vec<Article>> {
        self.storage.list_articles().await
    }

    /// One article with its note resolved.
    #[instrument(level = "debug", skip(self))]
    pub async fn get_article(&self, id: ArticleId) -> Result<ArticleDetail> {
        let article = self
            .storage
            .get_article(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("article {}", id)))?;

        let note = match article.note {
            Some(note_id) => {
                let note = self.storage.get_note(note_id).await?;
                if note.is_none() {
                    warn!(article = id, note = note_id, "Article references a missing note");
                }
                note
            }
            None => None,
        };

        Ok(ArticleDetail::new(article, note))
    }

    /// Creates a note and points the article at it, replacing any earlier note.
    ///
    /// The replaced note is left in storage. The two writes are not atomic: if
    /// linking fails the new note stays behind unreferenced and the call can be
    /// retried.
    #[instrument(level = "debug", skip(self, note))]
    pub async fn annotate(&self, id: ArticleId, note: &NewNote) -> Result<ArticleDetail> {
        if self.storage.get_article(id).await?.is_none() {
            return Err(Error::NotFound(format!("article {}", id)));
        }

        let note = self.storage.create_note(note).await?;
        let article = self
            .storage
            .set_article_note(id, note.id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("article {}", id)))?;

        info!(article = id, note = note.id, "Note attached");
        Ok(ArticleDetail::new(article, Some(note)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStorage;
    use vx_core::NewArticle;

    async fn seeded() -> (ArticleService, Arc<MemoryStorage>, Article) {
        let storage = Arc::new(MemoryStorage::new());
        let article = storage
            .create_article(&NewArticle {
                title: "Headline".to_string(),
                link: "https://www.vox.com/headline".to_string(),
                author: None,
                summary: "Click here to read more.".to_string(),
                image: "Image not found".to_string(),
            })
            .await
            .unwrap();
        (ArticleService::new(storage.clone()), storage, article)
    }

    #[tokio::test]
    async fn test_get_missing_article() {
        let (service, _, _) = seeded().await;
        assert!(matches!(service.get_article(404).await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_annotate_then_get() {
        let (service, _, article) = seeded().await;
        let note = NewNote { title: "T".to_string(), body: "B".to_string() };
        let updated = service.annotate(article.id, &note).await.unwrap();
        assert_eq!(updated.note.as_ref().map(|n| n.title.as_str()), Some("T"));

        let fetched = service.get_article(article.id).await.unwrap();
        let note = fetched.note.unwrap();
        assert_eq!(note.title, "T");
        assert_eq!(note.body, "B");
    }

    #[tokio::test]
    async fn test_reannotate_orphans_previous_note() {
        let (service, storage, article) = seeded().await;
        let first = service
            .annotate(article.id, &NewNote { title: "first".into(), body: "1".into() })
            .await
            .unwrap()
            .note
            .unwrap();
        let second = service
            .annotate(article.id, &NewNote { title: "second".into(), body: "2".into() })
            .await
            .unwrap()
            .note
            .unwrap();

        assert_ne!(first.id, second.id);
        assert_eq!(service.get_article(article.id).await.unwrap().note, Some(second));
        assert_eq!(storage.get_note(first.id).await.unwrap(), Some(first));
    }

    #[tokio::test]
    async fn test_annotate_missing_article_creates_no_note() {
        let (service, storage, _) = seeded().await;
        let result = service.annotate(77, &NewNote::default()).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
        assert!(storage.get_note(1).await.unwrap().is_none());
    }
}
