//! Site profiles: the per-site table of extraction rules.
//!
//! A profile names the teaser container and, for each field, an ordered list
//! of lookup paths. Profiles are plain data, so they can be shipped as JSON
//! and swapped per source without touching the extractor.

use serde::{Deserialize, Serialize};
use std::path::Path;
use vx_core::{Error, Result};

/// The 1x1 transparent GIF Vox serves when a teaser has no real image.
pub const PLACEHOLDER_GIF: &str =
    "data:image/gif;base64,R0lGODlhAQABAIAAAAUEBAAAACwAAAAAAQABAAACAkQBADs";
pub const SUMMARY_PLACEHOLDER: &str = "Click here to read more.";
pub const NO_IMAGE: &str = "No image available";
pub const IMAGE_NOT_FOUND: &str = "Image not found";

pub const VOX_URL: &str = "https://www.vox.com/";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Title,
    Link,
    Author,
    Summary,
    Image,
}

impl Field {
    pub const ALL: [Field; 5] = [Field::Title, Field::Link, Field::Author, Field::Summary, Field::Image];

    pub fn name(self) -> &'static str {
        match self {
            Field::Title => "title",
            Field::Link => "link",
            Field::Author => "author",
            Field::Summary => "summary",
            Field::Image => "image",
        }
    }
}

/// Direct-child steps from the container, then either the text of the final
/// element set or an attribute of its first element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupPath {
    pub steps: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attr: Option<String>,
}

impl LookupPath {
    pub fn text(steps: &[&str]) -> Self {
        Self {
            steps: steps.iter().map(|s| s.to_string()).collect(),
            attr: None,
        }
    }

    pub fn attr(steps: &[&str], attr: &str) -> Self {
        Self {
            steps: steps.iter().map(|s| s.to_string()).collect(),
            attr: Some(attr.to_string()),
        }
    }
}

/// Paths are tried in order; the first non-empty value wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRule {
    pub field: Field,
    pub paths: Vec<LookupPath>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

/// Replaces a known bogus value with a sentinel after extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Substitution {
    pub field: Field,
    pub equals: String,
    pub replacement: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteProfile {
    pub name: String,
    pub source_url: String,
    pub container: String,
    pub rules: Vec<FieldRule>,
    #[serde(default)]
    pub substitutions: Vec<Substitution>,
}

impl SiteProfile {
    /// Compact article teasers on the Vox front page.
    pub fn vox() -> Self {
        let image_wrapper = "a.c-entry-box--compact__image-wrapper";
        Self {
            name: "vox".to_string(),
            source_url: VOX_URL.to_string(),
            container: "div.c-entry-box--compact--article".to_string(),
            rules: vec![
                FieldRule {
                    field: Field::Title,
                    paths: vec![LookupPath::text(&["div", "h2"])],
                    default: None,
                },
                FieldRule {
                    field: Field::Link,
                    paths: vec![LookupPath::attr(&["a"], "href")],
                    default: None,
                },
                FieldRule {
                    field: Field::Author,
                    paths: vec![LookupPath::text(&[
                        "div.c-entry-box--compact__body",
                        "div.c-byline",
                        "span.c-byline-wrapper",
                        "span.c-byline__item",
                        "a",
                        "span.c-byline__author-name",
                    ])],
                    default: None,
                },
                FieldRule {
                    field: Field::Summary,
                    paths: vec![LookupPath::text(&["div", "p.p-dek"])],
                    default: Some(SUMMARY_PLACEHOLDER.to_string()),
                },
                FieldRule {
                    field: Field::Image,
                    paths: vec![
                        LookupPath::attr(&[image_wrapper, "picture.c-picture", "img"], "src"),
                        LookupPath::attr(
                            &[image_wrapper, "div.c-entry-box--compact__image", "img.c-dynamic-image"],
                            "src",
                        ),
                    ],
                    default: Some(NO_IMAGE.to_string()),
                },
            ],
            substitutions: vec![Substitution {
                field: Field::Image,
                equals: PLACEHOLDER_GIF.to_string(),
                replacement: IMAGE_NOT_FOUND.to_string(),
            }],
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let profile: SiteProfile = serde_json::from_str(json)?;
        profile.validate()?;
        Ok(profile)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn with_source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = url.into();
        self
    }

    /// Sets (or clears) the default used when no author is found.
    pub fn with_author_default(mut self, sentinel: Option<String>) -> Self {
        match self.rules.iter_mut().find(|r| r.field == Field::Author) {
            Some(rule) => rule.default = sentinel,
            None => self.rules.push(FieldRule {
                field: Field::Author,
                paths: vec![],
                default: sentinel,
            }),
        }
        self
    }

    pub fn rule(&self, field: Field) -> Option<&FieldRule> {
        self.rules.iter().find(|r| r.field == field)
    }

    /// Structural checks; selectors are checked when the extractor compiles them.
    pub fn validate(&self) -> Result<()> {
        if self.container.trim().is_empty() {
            return Err(Error::Config(format!("profile {}: empty container selector", self.name)));
        }
        for field in Field::ALL {
            if self.rules.iter().filter(|r| r.field == field).count() > 1 {
                return Err(Error::Config(format!(
                    "profile {}: more than one rule for {}",
                    self.name,
                    field.name()
                )));
            }
        }
        for rule in &self.rules {
            if rule.paths.iter().any(|p| p.steps.is_empty()) {
                return Err(Error::Config(format!(
                    "profile {}: {} has a lookup path without steps",
                    self.name,
                    rule.field.name()
                )));
            }
        }
        Ok(())
    }
}

impl Default for SiteProfile {
    fn default() -> Self {
        Self::vox()
    }
}
