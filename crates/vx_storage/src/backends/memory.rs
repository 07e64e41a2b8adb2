use async_trait::async_trait;
use chrono::Utc;
use vx_core::{
    Article, ArticleId, ArticleStatus, ArticleStorage, NewArticle, NewNote, Note, NoteId, Result,
};
use std::sync::Arc;
use tokio::sync::RwLock;
use crate::StorageBackend;

#[derive(Default)]
pub struct MemoryStore {
    articles: Vec<Article>,
    notes: Vec<Note>,
    last_article_id: ArticleId,
    last_note_id: NoteId,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_article(&mut self, record: &NewArticle) -> Result<Article> {
        record.validate()?;
        self.last_article_id += 1;
        let article = Article {
            id: self.last_article_id,
            title: record.title.clone(),
            link: record.link.clone(),
            author: record.author.clone(),
            summary: record.summary.clone(),
            image: record.image.clone(),
            note: None,
            created_at: Utc::now(),
        };
        self.articles.push(article.clone());
        Ok(article)
    }

    pub fn upsert_article(&mut self, record: &NewArticle) -> Result<(Article, ArticleStatus)> {
        record.validate()?;
        if let Some(existing) = self.articles.iter_mut().find(|a| a.link == record.link) {
            if existing.same_content(record) {
                return Ok((existing.clone(), ArticleStatus::Unchanged));
            }
            existing.title = record.title.clone();
            existing.author = record.author.clone();
            existing.summary = record.summary.clone();
            existing.image = record.image.clone();
            return Ok((existing.clone(), ArticleStatus::Updated));
        }
        let article = self.create_article(record)?;
        Ok((article, ArticleStatus::New))
    }

    pub fn list_articles(&self) -> Vec<Article> {
        let mut articles = self.articles.clone();
        articles.sort_by(|a, b| b.id.cmp(&a.id));
        articles
    }

    pub fn get_article(&self, id: ArticleId) -> Option<Article> {
        self.articles.iter().find(|a| a.id == id).cloned()
    }

    pub fn create_note(&mut self, note: &NewNote) -> Note {
        self.last_note_id += 1;
        let note = Note {
            id: self.last_note_id,
            title: note.title.clone(),
            body: note.body.clone(),
        };
        self.notes.push(note.clone());
        note
    }

    pub fn get_note(&self, id: NoteId) -> Option<Note> {
        self.notes.iter().find(|n| n.id == id).cloned()
    }

    pub fn set_article_note(&mut self, article_id: ArticleId, note_id: NoteId) -> Option<Article> {
        let article = self.articles.iter_mut().find(|a| a.id == article_id)?;
        article.note = Some(note_id);
        Some(article.clone())
    }
}

/// Process-local storage. Everything is lost when the process exits.
pub struct MemoryStorage {
    store: Arc<RwLock<MemoryStore>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(MemoryStore::new())),
        }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    fn get_error_message() -> &'static str {
        "Memory storage should be available"
    }

    async fn new() -> Result<Self> where Self: Sized {
        Ok(MemoryStorage::new())
    }
}

#[async_trait]
impl ArticleStorage for MemoryStorage {
    async fn create_article(&self, article: &NewArticle) -> Result<Article> {
        self.store.write().await.create_article(article)
    }

    async fn upsert_article(&self, article: &NewArticle) -> Result<(Article, ArticleStatus)> {
        self.store.write().await.upsert_article(article)
    }

    async fn list_articles(&self) -> Result<Vec<Article>> {
        Ok(self.store.read().await.list_articles())
    }

    async fn get_article(&self, id: ArticleId) -> Result<Option<Article>> {
        Ok(self.store.read().await.get_article(id))
    }

    async fn create_note(&self, note: &NewNote) -> Result<Note> {
        Ok(self.store.write().await.create_note(note))
    }

    async fn get_note(&self, id: NoteId) -> Result<Option<Note>> {
        Ok(self.store.read().await.get_note(id))
    }

    async fn set_article_note(&self, article_id: ArticleId, note_id: NoteId) -> Result<Option<Article>> {
        Ok(self.store.write().await.set_article_note(article_id, note_id))
    }
}
