use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use vx_core::{ArticleId, ArticleStatus, ArticleStorage, NewArticle, Result, WritePolicy};

use crate::extract::Extractor;
use crate::fetch::{FetchConfig, Fetcher};
use crate::logging::Logger;
use crate::normalize::Normalizer;
use crate::profile::SiteProfile;

/// What happened to one extracted record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    Stored { id: ArticleId, status: ArticleStatus },
    Skipped { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedRecord {
    pub index: usize,
    pub link: String,
    pub reason: String,
}

/// Per-scrape counts returned to the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScrapeSummary {
    pub source: String,
    pub matched: usize,
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub skips: Vec<SkippedRecord>,
}

impl ScrapeSummary {
    fn record(&mut self, index: usize, link: &str, outcome: RecordOutcome) {
        match outcome {
            RecordOutcome::Stored { status: ArticleStatus::New, .. } => self.created += 1,
            RecordOutcome::Stored { status: ArticleStatus::Updated, .. } => self.updated += 1,
            RecordOutcome::Stored { status: ArticleStatus::Unchanged, .. } => self.unchanged += 1,
            RecordOutcome::Skipped { reason } => {
                self.skipped += 1;
                self.skips.push(SkippedRecord {
                    index,
                    link: link.to_string(),
                    reason,
                });
            }
        }
    }
}

/// Runs fetch, extraction, normalization and storage for one site profile.
pub struct ScraperManager {
    storage: Arc<dyn ArticleStorage>,
    profile: SiteProfile,
    fetcher: Fetcher,
    extractor: Extractor,
    normalizer: Normalizer,
    policy: WritePolicy,
    shutdown: CancellationToken,
    logger: Logger,
}

impl ScraperManager {
    pub fn new(storage: Arc<dyn ArticleStorage>, profile: SiteProfile, fetch: FetchConfig) -> Result<Self> {
        let extractor = Extractor::new(&profile)?;
        let normalizer = Normalizer::new(&profile);
        let logger = Logger::new().with_new_prefixes(format!("[{}]", profile.name));
        Ok(Self {
            storage,
            fetcher: Fetcher::new(fetch)?,
            extractor,
            normalizer,
            profile,
            policy: WritePolicy::default(),
            shutdown: CancellationToken::new(),
            logger,
        })
    }

    pub fn with_policy(mut self, policy: WritePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn profile(&self) -> &SiteProfile {
        &self.profile
    }

    pub fn policy(&self) -> WritePolicy {
        self.policy
    }

    /// Token that aborts any in-flight fetch when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Fetches the profile's source page and stores every teaser on it.
    ///
    /// Only fetch failures are returned as errors; per-record write failures
    /// end up in [`ScrapeSummary::skips`].
    pub async fn scrape(&self) -> Result<ScrapeSummary> {
        self.logger.info(&format!("Fetching {}", self.profile.source_url));
        let html = match self.fetcher.fetch(&self.profile.source_url, &self.shutdown).await {
            Ok(html) => html,
            Err(e) => {
                self.logger.error(&format!("Fetch failed: {}", e));
                return Err(e);
            }
        };
        Ok(self.scrape_document(&html).await)
    }

    /// Extraction and storage over an already fetched document.
    pub async fn scrape_document(&self, html: &str) -> ScrapeSummary {
        let records: Vec<NewArticle> = self
            .extractor
            .extract(html)
            .into_iter()
            .map(|candidate| self.normalizer.normalize(candidate))
            .collect();

        let writes = records.iter().map(|record| self.store(record));
        let outcomes = join_all(writes).await;

        let mut summary = ScrapeSummary {
            source: self.profile.source_url.clone(),
            matched: records.len(),
            ..ScrapeSummary::default()
        };
        for (index, (record, outcome)) in records.iter().zip(outcomes).enumerate() {
            if let RecordOutcome::Skipped { reason } = &outcome {
                self.logger.debug(&format!("Skipped record {} ({}): {}", index, record.link, reason));
            }
            summary.record(index, &record.link, outcome);
        }

        self.logger.info(&format!(
            "Scrape complete: {} matched, {} created, {} updated, {} unchanged, {} skipped",
            summary.matched, summary.created, summary.updated, summary.unchanged, summary.skipped
        ));
        summary
    }

    async fn store(&self, record: &NewArticle) -> RecordOutcome {
        let result = match self.policy {
            WritePolicy::Insert => self
                .storage
                .create_article(record)
                .await
                .map(|article| (article, ArticleStatus::New)),
            WritePolicy::Upsert => self.storage.upsert_article(record).await,
        };
        match result {
            Ok((article, status)) => RecordOutcome::Stored { id: article.id, status },
            Err(e) => RecordOutcome::Skipped { reason: e.to_string() },
        }
    }
}
