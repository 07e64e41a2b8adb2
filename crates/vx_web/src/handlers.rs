use axum::{
    async_trait,
    extract::{FromRequest, Path, Request, State},
    http::header::CONTENT_TYPE,
    Form, Json,
};
use serde_json::{json, Value};
use std::sync::Arc;
use vx_core::{Article, ArticleDetail, ArticleId, Error, NewNote};
use vx_scrapers::ScrapeSummary;
use crate::{ApiError, AppState};

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

fn parse_id(raw: &str) -> std::result::Result<ArticleId, ApiError> {
    raw.parse()
        .map_err(|_| Error::NotFound(format!("article {}", raw)).into())
}

/// Note fields from either a JSON or a url-encoded form body.
pub struct NoteInput(pub NewNote);

#[async_trait]
impl<S> FromRequest<S> for NoteInput
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> std::result::Result<Self, Self::Rejection> {
        let is_form = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map_or(false, |ct| ct.starts_with("application/x-www-form-urlencoded"));

        if is_form {
            let Form(note) = Form::<NewNote>::from_request(req, state)
                .await
                .map_err(|e| ApiError::bad_request(e.body_text()))?;
            Ok(NoteInput(note))
        } else {
            let Json(note) = Json::<NewNote>::from_request(req, state)
                .await
                .map_err(|e| ApiError::bad_request(e.body_text()))?;
            Ok(NoteInput(note))
        }
    }
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn scrape(State(state): State<Arc<AppState>>) -> ApiResult<ScrapeSummary> {
    Ok(Json(state.manager.scrape().await?))
}

pub async fn list_articles(State(state): State<Arc<AppState>>) -> ApiResult<Vec<Article>> {
    Ok(Json(state.service.list_articles().await?))
}

pub async fn get_article(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<ArticleDetail> {
    let id = parse_id(&id)?;
    Ok(Json(state.service.get_article(id).await?))
}

pub async fn annotate_article(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    NoteInput(note): NoteInput,
) -> ApiResult<ArticleDetail> {
    let id = parse_id(&id)?;
    Ok(Json(state.service.annotate(id, &note).await?))
}
