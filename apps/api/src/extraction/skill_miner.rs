//! Skill Miner — derives a bounded, de-duplicated skill list from a job posting.
//!
//! Strategy order:
//! 1. A dedicated skills region (first matching selector wins); its text-bearing children are
//!    taken in document order.
//! 2. When no region exists or it yields nothing, the description block is scanned against a
//!    fixed set of technology-name patterns.
//!
//! Every returned entry is 3–49 characters long and the list never exceeds 10 entries.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Selector};

use crate::extraction::document::{compile_selectors, element_text, PageDocument};
use crate::models::records::{MAX_SKILLS, MAX_SKILL_LEN, MIN_SKILL_LEN};

const SKILLS_REGION_SELECTORS: &[&str] = &[
    ".job-details-skill-match-status-list",
    ".job-details-how-you-match__skills-item-subtitle",
    ".jobs-ppc-criteria__list",
    "[data-test-job-skills]",
];

const DESCRIPTION_SELECTORS: &[&str] = &[
    "#job-details",
    ".jobs-description__content",
    ".jobs-box__html-content",
    ".description__text",
    ".show-more-less-html__markup",
];

/// Canonical skill name and the case-insensitive pattern that detects it in free text.
const KNOWN_TECHNOLOGIES: &[(&str, &str)] = &[
    ("JavaScript", r"\bjavascript\b"),
    ("TypeScript", r"\btypescript\b"),
    ("Python", r"\bpython\b"),
    ("Java", r"\bjava\b"),
    ("Rust", r"\brust\b"),
    ("Golang", r"\bgolang\b"),
    ("C++", r"(?:^|[^a-z0-9])c\+\+"),
    ("Ruby", r"\bruby\b"),
    ("Kotlin", r"\bkotlin\b"),
    ("Swift", r"\bswift\b"),
    ("Scala", r"\bscala\b"),
    ("React", r"\breact(?:\.js|js)?\b"),
    ("Angular", r"\bangular\b"),
    ("Vue.js", r"\bvue(?:\.js)?\b"),
    ("Node.js", r"\bnode(?:\.js|js)\b"),
    ("Django", r"\bdjango\b"),
    ("Spring", r"\bspring(?: boot)?\b"),
    ("SQL", r"\bsql\b"),
    ("PostgreSQL", r"\bpostgres(?:ql)?\b"),
    ("MySQL", r"\bmysql\b"),
    ("MongoDB", r"\bmongo(?:db)?\b"),
    ("Redis", r"\bredis\b"),
    ("Kafka", r"\bkafka\b"),
    ("GraphQL", r"\bgraphql\b"),
    ("AWS", r"\baws\b|\bamazon web services\b"),
    ("Azure", r"\bazure\b"),
    ("GCP", r"\bgcp\b|\bgoogle cloud\b"),
    ("Docker", r"\bdocker\b"),
    ("Kubernetes", r"\bkubernetes\b|\bk8s\b"),
    ("Terraform", r"\bterraform\b"),
    ("Linux", r"\blinux\b"),
    ("CI/CD", r"\bci/cd\b"),
    ("Machine Learning", r"\bmachine learning\b"),
    ("PyTorch", r"\bpytorch\b"),
    ("TensorFlow", r"\btensorflow\b"),
];

static TECHNOLOGY_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    KNOWN_TECHNOLOGIES
        .iter()
        .filter_map(|(name, pattern)| {
            Regex::new(&format!("(?i){pattern}"))
                .ok()
                .map(|re| (*name, re))
        })
        .collect()
});

static CHILD_ITEMS: LazyLock<Vec<Selector>> = LazyLock::new(|| compile_selectors(&["li"]));

pub struct SkillMiner {
    regions: Vec<Selector>,
    descriptions: Vec<Selector>,
}

impl Default for SkillMiner {
    fn default() -> Self {
        Self::new(SKILLS_REGION_SELECTORS, DESCRIPTION_SELECTORS)
    }
}

impl SkillMiner {
    pub fn new(regions: &[&str], descriptions: &[&str]) -> Self {
        Self {
            regions: compile_selectors(regions),
            descriptions: compile_selectors(descriptions),
        }
    }

    pub fn mine(&self, doc: &PageDocument) -> Vec<String> {
        let from_region = self
            .regions
            .iter()
            .find_map(|selector| doc.first(selector))
            .map(region_skills)
            .unwrap_or_default();

        if !from_region.is_empty() {
            return from_region;
        }

        self.descriptions
            .iter()
            .find_map(|selector| doc.first_text(selector))
            .map(|text| match_known_technologies(&text))
            .unwrap_or_default()
    }
}

/// Collects skill entries from a region's list items, or its direct element children
/// when the region is not a list.
fn region_skills(region: ElementRef<'_>) -> Vec<String> {
    let items: Vec<ElementRef<'_>> = match CHILD_ITEMS.first() {
        Some(li) if region.select(li).next().is_some() => region.select(li).collect(),
        _ => region.children().filter_map(ElementRef::wrap).collect(),
    };

    let mut collector = SkillCollector::default();
    for item in items {
        if collector.is_full() {
            break;
        }
        collector.push(element_text(item));
    }
    collector.into_skills()
}

/// Scans free text for known technology names, ordered by first occurrence.
pub fn match_known_technologies(text: &str) -> Vec<String> {
    let mut hits: Vec<(usize, &str)> = TECHNOLOGY_PATTERNS
        .iter()
        .filter_map(|(name, re)| re.find(text).map(|m| (m.start(), *name)))
        .collect();
    hits.sort_by_key(|(position, _)| *position);

    let mut collector = SkillCollector::default();
    for (_, name) in hits {
        if collector.is_full() {
            break;
        }
        collector.push(name.to_string());
    }
    collector.into_skills()
}

/// Enforces the length window, case-insensitive de-duplication and the size cap.
#[derive(Default)]
struct SkillCollector {
    seen: HashSet<String>,
    skills: Vec<String>,
}

impl SkillCollector {
    fn is_full(&self) -> bool {
        self.skills.len() >= MAX_SKILLS
    }

    fn push(&mut self, candidate: String) {
        let candidate = candidate.trim().to_string();
        let len = candidate.chars().count();
        if self.is_full() || !(MIN_SKILL_LEN..=MAX_SKILL_LEN).contains(&len) {
            return;
        }
        if self.seen.insert(candidate.to_lowercase()) {
            self.skills.push(candidate);
        }
    }

    fn into_skills(self) -> Vec<String> {
        self.skills
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::document::PageSnapshot;

    fn doc(html: &str) -> PageDocument {
        PageDocument::parse(&PageSnapshot::new("https://example.com/job", html))
    }

    fn assert_bounds(skills: &[String]) {
        assert!(skills.len() <= MAX_SKILLS);
        let mut seen = HashSet::new();
        for skill in skills {
            let len = skill.chars().count();
            assert!((MIN_SKILL_LEN..=MAX_SKILL_LEN).contains(&len), "bad length: {skill}");
            assert!(seen.insert(skill.to_lowercase()), "duplicate: {skill}");
        }
    }

    #[test]
    fn test_region_filters_noise_and_duplicates() {
        let long = "x".repeat(50);
        let html = format!(
            r#"<ul class="job-details-skill-match-status-list">
                <li>Rust</li><li>Go</li><li>rust</li><li>{long}</li><li>  PostgreSQL </li>
            </ul>"#
        );
        let skills = SkillMiner::default().mine(&doc(&html));
        assert_eq!(skills, vec!["Rust", "PostgreSQL"]);
        assert_bounds(&skills);
    }

    #[test]
    fn test_region_caps_at_ten_entries() {
        let items: String = (0..15).map(|i| format!("<li>Skill {i}</li>")).collect();
        let html = format!(r#"<ul class="job-details-skill-match-status-list">{items}</ul>"#);
        let skills = SkillMiner::default().mine(&doc(&html));
        assert_eq!(skills.len(), 10);
        assert_eq!(skills[0], "Skill 0");
        assert_eq!(skills[9], "Skill 9");
    }

    #[test]
    fn test_region_without_list_uses_direct_children() {
        let html = r#"<div data-test-job-skills><span>Terraform</span><span>AWS</span><span>Ansible</span></div>"#;
        let skills = SkillMiner::default().mine(&doc(html));
        assert_eq!(skills, vec!["Terraform", "AWS", "Ansible"]);
    }

    #[test]
    fn test_falls_back_to_description_patterns() {
        let html = r#"
            <div id="job-details">
              We build services in Rust and TypeScript on Kubernetes, backed by Postgres.
              Experience with AWS and docker is a plus. More rust please.
            </div>"#;
        let skills = SkillMiner::default().mine(&doc(html));
        assert_eq!(
            skills,
            vec!["Rust", "TypeScript", "Kubernetes", "PostgreSQL", "AWS", "Docker"]
        );
        assert_bounds(&skills);
    }

    #[test]
    fn test_empty_region_falls_back_to_description() {
        let html = r#"
            <ul class="job-details-skill-match-status-list"><li>Go</li></ul>
            <div class="jobs-description__content">Python and Django shop.</div>"#;
        let skills = SkillMiner::default().mine(&doc(html));
        assert_eq!(skills, vec!["Python", "Django"]);
    }

    #[test]
    fn test_no_sources_yields_empty() {
        assert!(SkillMiner::default().mine(&doc("<p>nothing here</p>")).is_empty());
    }

    #[test]
    fn test_pattern_scan_caps_at_ten() {
        let text = "JavaScript TypeScript Python Java Rust Golang Ruby Kotlin Swift Scala React Docker";
        let skills = match_known_technologies(text);
        assert_eq!(skills.len(), 10);
        assert_eq!(skills[0], "JavaScript");
        assert_bounds(&skills);
    }

    #[test]
    fn test_java_does_not_match_javascript() {
        assert_eq!(match_known_technologies("Senior JavaScript developer"), vec!["JavaScript"]);
    }

    #[test]
    fn test_cpp_pattern() {
        assert_eq!(match_known_technologies("Modern C++ and Linux"), vec!["C++", "Linux"]);
    }
}
