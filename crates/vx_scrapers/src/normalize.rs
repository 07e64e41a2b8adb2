use url::Url;
use vx_core::NewArticle;

use crate::extract::CandidateRecord;
use crate::profile::{
    Field, SiteProfile, Substitution, IMAGE_NOT_FOUND, NO_IMAGE, PLACEHOLDER_GIF, SUMMARY_PLACEHOLDER,
};

/// Turns candidate records into storable ones.
///
/// `summary` and `image` always come out non-empty, whatever the profile says.
#[derive(Debug, Clone)]
pub struct Normalizer {
    defaults: Vec<(Field, String)>,
    substitutions: Vec<Substitution>,
    base: Option<Url>,
}

impl Normalizer {
    pub fn new(profile: &SiteProfile) -> Self {
        let mut defaults: Vec<(Field, String)> = profile
            .rules
            .iter()
            .filter_map(|rule| rule.default.clone().map(|d| (rule.field, d)))
            .filter(|(_, d)| !d.is_empty())
            .collect();
        for (field, fallback) in [(Field::Summary, SUMMARY_PLACEHOLDER), (Field::Image, NO_IMAGE)] {
            if !defaults.iter().any(|(f, _)| *f == field) {
                defaults.push((field, fallback.to_string()));
            }
        }

        let mut substitutions = profile.substitutions.clone();
        if !substitutions.iter().any(|s| s.field == Field::Image && s.equals == PLACEHOLDER_GIF) {
            substitutions.push(Substitution {
                field: Field::Image,
                equals: PLACEHOLDER_GIF.to_string(),
                replacement: IMAGE_NOT_FOUND.to_string(),
            });
        }

        Self {
            defaults,
            substitutions,
            base: Url::parse(&profile.source_url).ok(),
        }
    }

    pub fn normalize(&self, mut record: CandidateRecord) -> NewArticle {
        for (field, default) in &self.defaults {
            if record.get(*field).map_or(true, str::is_empty) {
                record.set(*field, Some(default.clone()));
            }
        }

        for sub in &self.substitutions {
            if record.get(sub.field) == Some(sub.equals.as_str()) {
                record.set(sub.field, Some(sub.replacement.clone()));
            }
        }

        let link = record.link.unwrap_or_default();
        NewArticle {
            title: record.title.unwrap_or_default(),
            link: self.absolute_link(link),
            author: record.author.filter(|a| !a.is_empty()),
            summary: record.summary.unwrap_or_default(),
            image: record.image.unwrap_or_default(),
        }
    }

    fn absolute_link(&self, link: String) -> String {
        if link.is_empty() || Url::parse(&link).is_ok() {
            return link;
        }
        match self.base.as_ref().and_then(|base| base.join(&link).ok()) {
            Some(url) => url.to_string(),
            None => link,
        }
    }
}
