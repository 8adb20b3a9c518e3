//! Field Extractor — pulls role, company and hiring contact out of a job posting page.
//!
//! Each field is an ordered list of lookup strategies. The first strategy that yields
//! non-empty text wins. A field where every strategy comes back empty is recorded as the
//! empty string: absence is a normal outcome, never an error.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::extraction::document::{compile_selectors, PageDocument};
use crate::extraction::skill_miner::SkillMiner;
use crate::models::records::ProfileRecord;

/// Top-card title selectors, newest layout first.
const ROLE_SELECTORS: &[&str] = &[
    ".job-details-jobs-unified-top-card__job-title h1",
    ".job-details-jobs-unified-top-card__job-title",
    ".jobs-unified-top-card__job-title",
    ".top-card-layout__title",
    ".topcard__title",
    ".text-body-medium",
];

const COMPANY_SELECTORS: &[&str] = &[
    ".job-details-jobs-unified-top-card__company-name a",
    ".job-details-jobs-unified-top-card__company-name",
    ".jobs-unified-top-card__company-name",
    ".topcard__org-name-link",
    ".top-card-layout__second-subline a",
    ".pv-text-details__right-panel-item-text",
];

const CONTACT_SELECTORS: &[&str] = &[
    ".hirer-card__hirer-information strong",
    ".jobs-poster__name",
    "h1.text-heading-xlarge",
];

// "Acme hiring Senior Engineer in Berlin, Germany | LinkedIn"
static HIRING_TITLE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^\s*(?P<company>.+?) hiring (?P<role>.+?)(?: in [^|]+)?\s*\|\s*LinkedIn\s*$").ok()
});

static TITLE_SELECTORS: LazyLock<Vec<scraper::Selector>> =
    LazyLock::new(|| compile_selectors(&["title"]));

/// A single lookup: document in, text out (or nothing).
pub type Strategy = Box<dyn Fn(&PageDocument) -> Option<String> + Send + Sync>;

/// An ordered list of strategies for one field.
#[derive(Default)]
pub struct FieldLocator {
    strategies: Vec<Strategy>,
}

impl FieldLocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one selector strategy per CSS selector, preserving order.
    pub fn with_selectors(mut self, css: &[&str]) -> Self {
        for selector in compile_selectors(css) {
            self.strategies
                .push(Box::new(move |doc: &PageDocument| doc.first_text(&selector)));
        }
        self
    }

    pub fn with_strategy<F>(mut self, strategy: F) -> Self
    where
        F: Fn(&PageDocument) -> Option<String> + Send + Sync + 'static,
    {
        self.strategies.push(Box::new(strategy));
        self
    }

    /// Runs strategies in order; the first non-empty trimmed result wins.
    pub fn locate(&self, doc: &PageDocument) -> Option<String> {
        self.strategies.iter().find_map(|strategy| {
            strategy(doc)
                .map(|text| text.trim().to_string())
                .filter(|text| !text.is_empty())
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Found,
    NotFound,
}

impl Confidence {
    fn of(found: bool) -> Self {
        if found {
            Confidence::Found
        } else {
            Confidence::NotFound
        }
    }
}

/// Per-field found/not-found report accompanying an extracted record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldConfidence {
    pub full_name: Confidence,
    pub role: Confidence,
    pub company: Confidence,
    pub skills: Confidence,
}

impl FieldConfidence {
    /// Derives confidence from a record: a field counts as found when it is non-empty.
    pub fn of_profile(profile: &ProfileRecord) -> Self {
        Self {
            full_name: Confidence::of(!profile.full_name.is_empty()),
            role: Confidence::of(!profile.role.is_empty()),
            company: Confidence::of(!profile.company.is_empty()),
            skills: Confidence::of(!profile.skills.is_empty()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub profile: ProfileRecord,
    pub confidence: FieldConfidence,
}

pub struct FieldExtractor {
    full_name: FieldLocator,
    role: FieldLocator,
    company: FieldLocator,
    skills: SkillMiner,
}

impl Default for FieldExtractor {
    fn default() -> Self {
        Self::new(
            FieldLocator::new().with_selectors(CONTACT_SELECTORS),
            FieldLocator::new()
                .with_selectors(ROLE_SELECTORS)
                .with_strategy(|doc| hiring_title_part(doc, "role")),
            FieldLocator::new()
                .with_selectors(COMPANY_SELECTORS)
                .with_strategy(|doc| hiring_title_part(doc, "company")),
            SkillMiner::default(),
        )
    }
}

impl FieldExtractor {
    pub fn new(
        full_name: FieldLocator,
        role: FieldLocator,
        company: FieldLocator,
        skills: SkillMiner,
    ) -> Self {
        Self {
            full_name,
            role,
            company,
            skills,
        }
    }

    pub fn extract(&self, doc: &PageDocument) -> ProfileRecord {
        self.extract_with_confidence(doc).profile
    }

    pub fn extract_with_confidence(&self, doc: &PageDocument) -> Extraction {
        let profile = ProfileRecord {
            full_name: self.full_name.locate(doc).unwrap_or_default(),
            role: self.role.locate(doc).unwrap_or_default(),
            company: self.company.locate(doc).unwrap_or_default(),
            skills: self.skills.mine(doc),
            source_url: doc.url().to_string(),
        };
        let confidence = FieldConfidence::of_profile(&profile);

        tracing::debug!(
            "Extracted {}: role={:?} company={:?} skills={}",
            doc.url(),
            confidence.role,
            confidence.company,
            profile.skills.len()
        );

        Extraction {
            profile,
            confidence,
        }
    }
}

/// Falls back to the document title, which names both company and role on posting pages.
fn hiring_title_part(doc: &PageDocument, part: &str) -> Option<String> {
    let pattern = HIRING_TITLE.as_ref()?;
    let title = TITLE_SELECTORS.first().and_then(|s| doc.first_text(s))?;
    pattern
        .captures(&title)
        .and_then(|caps| caps.name(part))
        .map(|m| m.as_str().trim().to_string())
}
