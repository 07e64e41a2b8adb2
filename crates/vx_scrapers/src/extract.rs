use scraper::{ElementRef, Html, Selector};
use tracing::{debug, trace};
use vx_core::{Error, Result};

use crate::profile::{Field, LookupPath, SiteProfile};

/// Raw field values of one teaser. `None` means the lookup found nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateRecord {
    pub title: Option<String>,
    pub link: Option<String>,
    pub author: Option<String>,
    pub summary: Option<String>,
    pub image: Option<String>,
}

impl CandidateRecord {
    pub fn get(&self, field: Field) -> Option<&str> {
        match field {
            Field::Title => self.title.as_deref(),
            Field::Link => self.link.as_deref(),
            Field::Author => self.author.as_deref(),
            Field::Summary => self.summary.as_deref(),
            Field::Image => self.image.as_deref(),
        }
    }

    pub fn set(&mut self, field: Field, value: Option<String>) {
        let slot = match field {
            Field::Title => &mut self.title,
            Field::Link => &mut self.link,
            Field::Author => &mut self.author,
            Field::Summary => &mut self.summary,
            Field::Image => &mut self.image,
        };
        *slot = value;
    }
}

fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| Error::Selector(format!("{}: {}", selector, e)))
}

struct CompiledPath {
    steps: Vec<Selector>,
    attr: Option<String>,
}

impl CompiledPath {
    fn compile(path: &LookupPath) -> Result<Self> {
        Ok(Self {
            steps: path.steps.iter().map(|s| parse_selector(s)).collect::<Result<_>>()?,
            attr: path.attr.clone(),
        })
    }

    fn resolve(&self, container: ElementRef<'_>) -> Option<String> {
        let mut current = vec![container];
        for step in &self.steps {
            current = current
                .iter()
                .flat_map(|el| el.children().filter_map(ElementRef::wrap))
                .filter(|child| step.matches(child))
                .collect();
            if current.is_empty() {
                return None;
            }
        }

        let value = match &self.attr {
            Some(name) => current.first()?.value().attr(name)?.trim().to_string(),
            None => current
                .iter()
                .flat_map(|el| el.text())
                .collect::<String>()
                .trim()
                .to_string(),
        };
        (!value.is_empty()).then_some(value)
    }
}

struct CompiledRule {
    field: Field,
    paths: Vec<CompiledPath>,
}

/// Pulls candidate records out of a listing page according to a [`SiteProfile`].
///
/// Extraction never fails on document content: a missing element only empties
/// the field whose path crossed it.
pub struct Extractor {
    container: Selector,
    rules: Vec<CompiledRule>,
}

impl Extractor {
    pub fn new(profile: &SiteProfile) -> Result<Self> {
        profile.validate()?;
        let rules = profile
            .rules
            .iter()
            .map(|rule| {
                Ok(CompiledRule {
                    field: rule.field,
                    paths: rule.paths.iter().map(CompiledPath::compile).collect::<Result<_>>()?,
                })
            })
            .collect::<Result<_>>()?;

        Ok(Self {
            container: parse_selector(&profile.container)?,
            rules,
        })
    }

    pub fn extract(&self, html: &str) -> Vec<CandidateRecord> {
        let document = Html::parse_document(html);
        let records: Vec<CandidateRecord> = document
            .select(&self.container)
            .enumerate()
            .map(|(index, container)| self.extract_one(index, container))
            .collect();
        debug!(count = records.len(), "Extracted candidate records");
        records
    }

    fn extract_one(&self, index: usize, container: ElementRef<'_>) -> CandidateRecord {
        let mut record = CandidateRecord::default();
        for rule in &self.rules {
            let value = rule.paths.iter().find_map(|path| path.resolve(container));
            if value.is_none() {
                trace!(index, field = rule.field.name(), "Field lookup found nothing");
            }
            record.set(rule.field, value);
        }
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::PLACEHOLDER_GIF;

    fn teaser(title: &str, href: &str, extra: &str) -> String {
        format!(
            r#"<div class="c-entry-box--compact c-entry-box--compact--article">
                <a class="c-entry-box--compact__image-wrapper" href="{href}">
                    <picture class="c-picture"><img src="https://cdn.vox.com/{title}.jpg"></picture>
                </a>
                <div class="c-entry-box--compact__body">
                    <h2 class="c-entry-box--compact__title"><a href="{href}">{title}</a></h2>
                    <div class="c-byline">
                        <span class="c-byline-wrapper">
                            <span class="c-byline__item">
                                <a href="/authors/x"><span class="c-byline__author-name">Jane Doe</span></a>
                            </span>
                        </span>
                    </div>
                    {extra}
                </div>
            </div>"#
        )
    }

    fn page(body: &str) -> String {
        format!("<html><body><main>{}</main></body></html>", body)
    }

    fn extractor() -> Extractor {
        Extractor::new(&SiteProfile::vox()).unwrap()
    }

    #[test]
    fn test_extract_full_teaser() {
        let html = page(&teaser("Alpha", "https://www.vox.com/alpha", r#"<p class="p-dek">Alpha dek</p>"#));
        let records = extractor().extract(&html);
        assert_eq!(records.len(), 1);

        let record = &records[0];
        assert_eq!(record.title.as_deref(), Some("Alpha"));
        assert_eq!(record.link.as_deref(), Some("https://www.vox.com/alpha"));
        assert_eq!(record.author.as_deref(), Some("Jane Doe"));
        assert_eq!(record.summary.as_deref(), Some("Alpha dek"));
        assert_eq!(record.image.as_deref(), Some("https://cdn.vox.com/Alpha.jpg"));
    }

    #[test]
    fn test_extract_keeps_document_order() {
        let body = ["One", "Two", "Three"]
            .iter()
            .map(|t| teaser(t, &format!("https://www.vox.com/{}", t), ""))
            .collect::<String>();
        let records = extractor().extract(&page(&body));
        let titles: Vec<_> = records.iter().map(|r| r.title.clone().unwrap()).collect();
        assert_eq!(titles, vec!["One", "Two", "Three"]);
    }

    #[test]
    fn test_extract_no_containers() {
        let html = page(r#"<div class="c-entry-box--compact--video"><h2>Video</h2></div>"#);
        assert!(extractor().extract(&html).is_empty());
        assert!(extractor().extract("").is_empty());
    }

    #[test]
    fn test_missing_byline_only_empties_author() {
        let html = page(
            r#"<div class="c-entry-box--compact--article">
                <a href="https://www.vox.com/no-byline"></a>
                <div><h2>No byline</h2><p class="p-dek">Still here</p></div>
            </div>"#,
        );
        let record = &extractor().extract(&html)[0];
        assert_eq!(record.author, None);
        assert_eq!(record.image, None);
        assert_eq!(record.title.as_deref(), Some("No byline"));
        assert_eq!(record.summary.as_deref(), Some("Still here"));
    }

    #[test]
    fn test_image_falls_back_to_secondary_path() {
        let html = page(&format!(
            r#"<div class="c-entry-box--compact--article">
                <a class="c-entry-box--compact__image-wrapper" href="/x">
                    <div class="c-entry-box--compact__image">
                        <img class="c-dynamic-image" src="{}">
                    </div>
                </a>
                <div><h2>Lazy image</h2></div>
            </div>"#,
            PLACEHOLDER_GIF
        ));
        let record = &extractor().extract(&html)[0];
        assert_eq!(record.image.as_deref(), Some(PLACEHOLDER_GIF));
    }

    #[test]
    fn test_structural_drift_loses_fields_without_error() {
        // Class names renamed upstream: the container still matches, nothing inside does.
        let html = page(
            r#"<div class="c-entry-box--compact--article">
                <section class="card"><h3>Renamed</h3></section>
            </div>"#,
        );
        let records = extractor().extract(&html);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0], CandidateRecord::default());
    }

    #[test]
    fn test_paths_only_follow_direct_children() {
        let html = page(
            r#"<div class="c-entry-box--compact--article">
                <section><div><h2>Too deep</h2></div></section>
            </div>"#,
        );
        assert_eq!(extractor().extract(&html)[0].title, None);
    }

    #[test]
    fn test_invalid_selector_rejected() {
        let mut profile = SiteProfile::vox();
        profile.container = "div[[".to_string();
        assert!(matches!(Extractor::new(&profile), Err(Error::Selector(_))));
    }

    #[test]
    fn test_candidate_get_set() {
        let mut record = CandidateRecord::default();
        record.set(Field::Summary, Some("dek".to_string()));
        assert_eq!(record.get(Field::Summary), Some("dek"));
        assert_eq!(record.get(Field::Title), None);
    }
}
