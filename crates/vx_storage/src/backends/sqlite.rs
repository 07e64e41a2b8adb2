use async_trait::async_trait;
use chrono::{DateTime, Utc};
use vx_core::{
    Article, ArticleId, ArticleStatus, ArticleStorage, Error, NewArticle, NewNote, Note, NoteId, Result,
};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use tokio::sync::Mutex;
use tracing::debug;
use crate::StorageBackend;

const DEFAULT_DB_PATH: &str = "articles.db";

const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS notes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        body TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS articles (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        link TEXT NOT NULL,
        author TEXT,
        summary TEXT NOT NULL,
        image TEXT NOT NULL,
        note_id INTEGER REFERENCES notes(id),
        created_at TEXT NOT NULL
    )
    "#,
    // Not unique: the insert policy deliberately allows repeated links.
    "CREATE INDEX IF NOT EXISTS idx_articles_link ON articles(link)",
];

fn store_err(context: &str, e: sqlx::Error) -> Error {
    Error::Storage(format!("{}: {}", context, e))
}

fn row_to_article(row: &SqliteRow) -> Result<Article> {
    let created_at: String = row.try_get("created_at").map_err(|e| store_err("Failed to read row", e))?;
    Ok(Article {
        id: row.try_get("id").map_err(|e| store_err("Failed to read row", e))?,
        title: row.try_get("title").map_err(|e| store_err("Failed to read row", e))?,
        link: row.try_get("link").map_err(|e| store_err("Failed to read row", e))?,
        author: row.try_get("author").map_err(|e| store_err("Failed to read row", e))?,
        summary: row.try_get("summary").map_err(|e| store_err("Failed to read row", e))?,
        image: row.try_get("image").map_err(|e| store_err("Failed to read row", e))?,
        note: row.try_get("note_id").map_err(|e| store_err("Failed to read row", e))?,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map_err(|e| Error::Storage(format!("Failed to parse date: {}", e)))?
            .with_timezone(&Utc),
    })
}

fn row_to_note(row: &SqliteRow) -> Result<Note> {
    Ok(Note {
        id: row.try_get("id").map_err(|e| store_err("Failed to read row", e))?,
        title: row.try_get("title").map_err(|e| store_err("Failed to read row", e))?,
        body: row.try_get("body").map_err(|e| store_err("Failed to read row", e))?,
    })
}

async fn upsert_in(conn: &mut SqliteConnection, article: &NewArticle) -> Result<(Article, ArticleStatus)> {
    let existing = sqlx::query("SELECT * FROM articles WHERE link = ? ORDER BY id LIMIT 1")
        .bind(&article.link)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| store_err("Failed to look up article", e))?;

    let result = match existing {
        Some(row) => {
            let existing = row_to_article(&row)?;
            if existing.same_content(article) {
                (existing, ArticleStatus::Unchanged)
            } else {
                let row = sqlx::query(
                    r#"
                    UPDATE articles SET title = ?, author = ?, summary = ?, image = ?
                    WHERE id = ?
                    RETURNING *
                    "#,
                )
                .bind(&article.title)
                .bind(article.author.as_deref())
                .bind(&article.summary)
                .bind(&article.image)
                .bind(existing.id)
                .fetch_one(&mut *conn)
                .await
                .map_err(|e| store_err("Failed to update article", e))?;
                (row_to_article(&row)?, ArticleStatus::Updated)
            }
        }
        None => {
            let row = sqlx::query(
                r#"
                INSERT INTO articles (title, link, author, summary, image, created_at)
                VALUES (?, ?, ?, ?, ?, ?)
                RETURNING *
                "#,
            )
            .bind(&article.title)
            .bind(&article.link)
            .bind(article.author.as_deref())
            .bind(&article.summary)
            .bind(&article.image)
            .bind(Utc::now().to_rfc3339())
            .fetch_one(&mut *conn)
            .await
            .map_err(|e| store_err("Failed to store article", e))?;
            (row_to_article(&row)?, ArticleStatus::New)
        }
    };

    Ok(result)
}

pub struct SQLiteStorage {
    pool: SqlitePool,
    db_path: PathBuf,
    // Serializes upserts within the process; BEGIN IMMEDIATE covers other connections.
    upsert_lock: Mutex<()>,
}

#[async_trait]
impl StorageBackend for SQLiteStorage {
    fn get_error_message() -> &'static str {
        "SQLite database should be available at ./articles.db"
    }

    async fn new() -> Result<Self> {
        Self::new_with_path(Path::new(DEFAULT_DB_PATH)).await
    }
}

impl SQLiteStorage {
    pub async fn new_with_path(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))
            .map_err(|e| store_err("Invalid database path", e))?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| store_err("Failed to connect to database", e))?;

        for (i, migration) in MIGRATIONS.iter().enumerate() {
            sqlx::query(migration)
                .execute(&pool)
                .await
                .map_err(|e| Error::Storage(format!("Failed to run migration {}: {}", i, e)))?;
        }
        debug!(path = %db_path.display(), migrations = MIGRATIONS.len(), "SQLite storage ready");

        Ok(Self {
            pool,
            db_path: db_path.to_path_buf(),
            upsert_lock: Mutex::new(()),
        })
    }

    pub fn get_db_path(&self) -> &Path {
        &self.db_path
    }
}

#[async_trait]
impl ArticleStorage for SQLiteStorage {
    async fn create_article(&self, article: &NewArticle) -> Result<Article> {
        article.validate()?;

        let row = sqlx::query(
            r#"
            INSERT INTO articles (title, link, author, summary, image, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&article.title)
        .bind(&article.link)
        .bind(article.author.as_deref())
        .bind(&article.summary)
        .bind(&article.image)
        .bind(Utc::now().to_rfc3339())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| store_err("Failed to store article", e))?;

        row_to_article(&row)
    }

    async fn upsert_article(&self, article: &NewArticle) -> Result<(Article, ArticleStatus)> {
        article.validate()?;

        let _guard = self.upsert_lock.lock().await;
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| store_err("Failed to acquire connection", e))?;

        // Take the write lock before the read so no other writer slips in between.
        sqlx::query("BEGIN IMMEDIATE")
            .execute(&mut *conn)
            .await
            .map_err(|e| store_err("Failed to begin transaction", e))?;

        match upsert_in(&mut *conn, article).await {
            Ok(result) => {
                sqlx::query("COMMIT")
                    .execute(&mut *conn)
                    .await
                    .map_err(|e| store_err("Failed to commit article", e))?;
                Ok(result)
            }
            Err(e) => {
                if let Err(rollback) = sqlx::query("ROLLBACK").execute(&mut *conn).await {
                    debug!(error = %rollback, "Rollback after failed upsert did not complete");
                }
                Err(e)
            }
        }
    }

    async fn list_articles(&self) -> Result<Vec<Article>> {
        let rows = sqlx::query("SELECT * FROM articles ORDER BY id DESC")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| store_err("Failed to list articles", e))?;

        rows.iter().map(row_to_article).collect()
    }

    async fn get_article(&self, id: ArticleId) -> Result<Option<Article>> {
        let row = sqlx::query("SELECT * FROM articles WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| store_err("Failed to get article", e))?;

        row.as_ref().map(row_to_article).transpose()
    }

    async fn create_note(&self, note: &NewNote) -> Result<Note> {
        let row = sqlx::query("INSERT INTO notes (title, body) VALUES (?, ?) RETURNING *")
            .bind(&note.title)
            .bind(&note.body)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| store_err("Failed to store note", e))?;

        row_to_note(&row)
    }

    async fn get_note(&self, id: NoteId) -> Result<Option<Note>> {
        let row = sqlx::query("SELECT * FROM notes WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| store_err("Failed to get note", e))?;

        row.as_ref().map(row_to_note).transpose()
    }

    async fn set_article_note(&self, article_id: ArticleId, note_id: NoteId) -> Result<Option<Article>> {
        let row = sqlx::query("UPDATE articles SET note_id = ? WHERE id = ? RETURNING *")
            .bind(note_id)
            .bind(article_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| store_err("Failed to link note", e))?;

        row.as_ref().map(row_to_article).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn record(link: &str) -> NewArticle {
        NewArticle {
            title: "Test Article".to_string(),
            link: link.to_string(),
            author: None,
            summary: "Test summary".to_string(),
            image: "https://cdn.example.com/a.jpg".to_string(),
        }
    }

    #[tokio::test]
    async fn test_sqlite_storage() {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("test.db");

        let storage = SQLiteStorage::new_with_path(&db_path).await.unwrap();
        assert_eq!(storage.get_db_path(), db_path.as_path());

        let first = storage.create_article(&record("http://example.com/1")).await.unwrap();
        let second = storage.create_article(&record("http://example.com/2")).await.unwrap();
        assert!(second.id > first.id);
        assert_eq!(first.author, None);

        let articles = storage.list_articles().await.unwrap();
        assert_eq!(articles.iter().map(|a| a.id).collect::<Vec<_>>(), vec![second.id, first.id]);
    }

    #[tokio::test]
    async fn test_sqlite_rejects_invalid_record() {
        let temp_dir = tempdir().unwrap();
        let storage = SQLiteStorage::new_with_path(&temp_dir.path().join("test.db")).await.unwrap();

        let mut invalid = record("http://example.com/1");
        invalid.title = String::new();
        assert!(matches!(storage.create_article(&invalid).await, Err(Error::Validation(_))));
        assert!(storage.list_articles().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sqlite_upsert() {
        let temp_dir = tempdir().unwrap();
        let storage = SQLiteStorage::new_with_path(&temp_dir.path().join("test.db")).await.unwrap();

        let (created, status) = storage.upsert_article(&record("http://example.com/1")).await.unwrap();
        assert_eq!(status, ArticleStatus::New);

        let (_, status) = storage.upsert_article(&record("http://example.com/1")).await.unwrap();
        assert_eq!(status, ArticleStatus::Unchanged);

        let mut changed = record("http://example.com/1");
        changed.author = Some("Jane Doe".to_string());
        let (updated, status) = storage.upsert_article(&changed).await.unwrap();
        assert_eq!(status, ArticleStatus::Updated);
        assert_eq!(updated.id, created.id);
        assert_eq!(updated.author.as_deref(), Some("Jane Doe"));
        assert_eq!(storage.list_articles().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_sqlite_upserts_interleaved_with_note_writes() {
        let temp_dir = tempdir().unwrap();
        let storage = std::sync::Arc::new(
            SQLiteStorage::new_with_path(&temp_dir.path().join("test.db")).await.unwrap(),
        );
        let article = storage.create_article(&record("http://example.com/annotated")).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..40 {
            let upsert_storage = storage.clone();
            handles.push(tokio::spawn(async move {
                let link = format!("http://example.com/{}", i % 10);
                upsert_storage.upsert_article(&record(&link)).await.map(|_| ())
            }));
            let storage = storage.clone();
            handles.push(tokio::spawn(async move {
                let note = storage
                    .create_note(&NewNote { title: format!("T{}", i), body: "B".into() })
                    .await?;
                storage.set_article_note(article.id, note.id).await.map(|_| ())
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        // Ten distinct links plus the annotated article.
        assert_eq!(storage.list_articles().await.unwrap().len(), 11);
        assert!(storage.get_article(article.id).await.unwrap().unwrap().note.is_some());
    }

    #[tokio::test]
    async fn test_sqlite_note_linking() {
        let temp_dir = tempdir().unwrap();
        let storage = SQLiteStorage::new_with_path(&temp_dir.path().join("test.db")).await.unwrap();

        let article = storage.create_article(&record("http://example.com/1")).await.unwrap();
        let first = storage.create_note(&NewNote { title: "T1".into(), body: "B1".into() }).await.unwrap();
        let second = storage.create_note(&NewNote { title: "T2".into(), body: "B2".into() }).await.unwrap();

        storage.set_article_note(article.id, first.id).await.unwrap();
        let linked = storage.set_article_note(article.id, second.id).await.unwrap().unwrap();
        assert_eq!(linked.note, Some(second.id));

        // The replaced note stays stored.
        assert_eq!(storage.get_note(first.id).await.unwrap(), Some(first));
        assert!(storage.set_article_note(article.id + 100, second.id).await.unwrap().is_none());
        assert!(storage.get_article(article.id + 100).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sqlite_reopen_keeps_data() {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("nested").join("test.db");

        {
            let storage = SQLiteStorage::new_with_path(&db_path).await.unwrap();
            storage.create_article(&record("http://example.com/1")).await.unwrap();
        }

        let storage = SQLiteStorage::new_with_path(&db_path).await.unwrap();
        assert_eq!(storage.list_articles().await.unwrap().len(), 1);
    }
}
