use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

pub type ArticleId = i64;
pub type NoteId = i64;

/// A stored article. `note` holds the id of the most recently attached note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub id: ArticleId,
    pub title: String,
    pub link: String,
    pub author: Option<String>,
    pub summary: String,
    pub image: String,
    pub note: Option<NoteId>,
    pub created_at: DateTime<Utc>,
}

impl Article {
    /// True when the scraped fields match `record`; ids, notes and timestamps are ignored.
    pub fn same_content(&self, record: &NewArticle) -> bool {
        self.title == record.title
            && self.link == record.link
            && self.author == record.author
            && self.summary == record.summary
            && self.image == record.image
    }
}

/// A normalized record, ready to be written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewArticle {
    pub title: String,
    pub link: String,
    pub author: Option<String>,
    pub summary: String,
    pub image: String,
}

impl NewArticle {
    /// Checks the fields every backend requires before a write.
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(Error::Validation("article title is required".to_string()));
        }
        if self.link.trim().is_empty() {
            return Err(Error::Validation("article link is required".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewNote {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
}

/// An article with its note resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleDetail {
    pub id: ArticleId,
    pub title: String,
    pub link: String,
    pub author: Option<String>,
    pub summary: String,
    pub image: String,
    pub note: Option<Note>,
    pub created_at: DateTime<Utc>,
}

impl ArticleDetail {
    pub fn new(article: Article, note: Option<Note>) -> Self {
        Self {
            id: article.id,
            title: article.title,
            link: article.link,
            author: article.author,
            summary: article.summary,
            image: article.image,
            note,
            created_at: article.created_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArticleStatus {
    New,
    Updated,
    Unchanged,
}

/// How scraped records are written.
///
/// `Insert` keeps every scrape as new rows, so re-scraping a listing page
/// accumulates duplicates. `Upsert` treats `link` as the natural key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum WritePolicy {
    Insert,
    #[default]
    Upsert,
}
