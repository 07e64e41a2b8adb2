use std::sync::Arc;
use vx_scrapers::ScraperManager;
use vx_storage::ArticleService;

pub struct AppState {
    pub service: ArticleService,
    pub manager: Arc<ScraperManager>,
}
