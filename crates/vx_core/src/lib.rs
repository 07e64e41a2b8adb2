pub mod error;
pub mod storage;
pub mod types;

pub use error::{Error, Result};
pub use storage::ArticleStorage;
pub use types::{
    Article, ArticleDetail, ArticleId, ArticleStatus, NewArticle, NewNote, Note, NoteId, WritePolicy,
};
