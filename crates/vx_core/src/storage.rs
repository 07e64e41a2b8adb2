use async_trait::async_trait;
use crate::types::{Article, ArticleId, ArticleStatus, NewArticle, NewNote, Note, NoteId};
use crate::Result;

#[async_trait]
pub trait ArticleStorage: Send + Sync {
    /// Insert a new article unconditionally
    async fn create_article(&self, article: &NewArticle) -> Result<Article>;

    /// Insert, or refresh the scraped fields of the article sharing the same link
    async fn upsert_article(&self, article: &NewArticle) -> Result<(Article, ArticleStatus)>;

    /// All articles, most recently created first
    async fn list_articles(&self) -> Result<Vec<Article>>;

    async fn get_article(&self, id: ArticleId) -> Result<Option<Article>>;

    async fn create_note(&self, note: &NewNote) -> Result<Note>;

    async fn get_note(&self, id: NoteId) -> Result<Option<Note>>;

    /// Point an article at a note. Returns `None` when the article does not exist.
    async fn set_article_note(&self, article_id: ArticleId, note_id: NoteId) -> Result<Option<Article>>;
}
