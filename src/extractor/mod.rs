//! Rule-driven HTML extraction engine
//!
//! Interprets a site's [`ExtractionRules`] against a parsed document and
//! produces structured job records without any site-specific code. The
//! engine is pure with respect to its inputs: the same document and rules
//! always yield the same output sequence.
//!
//! Candidates whose detail URL cannot be resolved are dropped before they
//! are counted anywhere; a job without a detail URL cannot be deduplicated
//! or referenced.

use std::sync::OnceLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::error::ExtractError;
use crate::models::{CrawledJob, ExtractionRules, FieldKind, FieldRule, UrlRuleKind};

fn digit_run() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+").expect("digit pattern is valid"))
}

/// Extraction engine for one site's rules
pub struct Extractor {
    rules: ExtractionRules,
}

impl Extractor {
    pub fn new(rules: ExtractionRules) -> Self {
        Self { rules }
    }

    /// Extract all job candidates from a listing page
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::InvalidListSelector`] when the configured
    /// job-list selector is not valid CSS. Field-level selector problems are
    /// never fatal; they behave as a non-match.
    pub fn extract_jobs(
        &self,
        document: &Html,
        base_url: &str,
    ) -> Result<Vec<CrawledJob>, ExtractError> {
        let list_selector = Selector::parse(&self.rules.job_list_selector)
            .map_err(|_| ExtractError::InvalidListSelector(self.rules.job_list_selector.clone()))?;

        let jobs = document
            .select(&list_selector)
            .filter_map(|container| self.extract_job(container, base_url))
            .collect();

        Ok(jobs)
    }

    /// Extract a single job from a listing container
    ///
    /// Returns `None` when no detail URL resolves.
    fn extract_job(&self, container: ElementRef<'_>, base_url: &str) -> Option<CrawledJob> {
        let detail_url = self.extract_detail_url(container, base_url)?;

        let mut job = CrawledJob {
            detail_url,
            raw_html: container.inner_html(),
            ..Default::default()
        };

        for (name, rule) in &self.rules.fields {
            let raw = extract_field(container, rule);
            let value = apply_transformations(raw, &rule.transformations);

            match name.as_str() {
                "title" => job.title = value,
                "description" => job.description = value,
                "requirements" => job.requirements = value,
                "company" => job.company = value,
                "location" => job.location = value,
                "city" => job.city = value,
                "country" => job.country = value,
                "job_type" => job.job_type = value,
                "location_type" => job.location_type = value,
                "salary_min" => job.salary_min = parse_salary(&value),
                "salary_max" => job.salary_max = parse_salary(&value),
                "currency" => job.currency = value,
                "external_id" => job.external_id = value,
                "application_url" => {
                    if !value.is_empty() {
                        job.application_url = Some(value);
                    }
                }
                "application_email" => {
                    if !value.is_empty() {
                        job.application_email = Some(value);
                    }
                }
                "expires_at" => job.expires_at = parse_date(&value),
                // Unknown logical field names are ignored
                _ => {}
            }
        }

        Some(job)
    }

    /// Resolve the detail-page URL for one listing container
    fn extract_detail_url(&self, container: ElementRef<'_>, base_url: &str) -> Option<String> {
        let rule = &self.rules.job_detail_url;
        let selector = Selector::parse(&rule.selector).ok()?;
        let link = container.select(&selector).next()?;

        let attribute = if rule.attribute.is_empty() {
            "href"
        } else {
            rule.attribute.as_str()
        };
        let href = link.value().attr(attribute)?.trim();
        if href.is_empty() {
            return None;
        }

        match rule.kind {
            UrlRuleKind::Relative => {
                if href.starts_with("http") {
                    Some(href.to_string())
                } else {
                    let base = if rule.base_url.is_empty() {
                        base_url
                    } else {
                        rule.base_url.as_str()
                    };
                    resolve_against(base, href)
                }
            }
            UrlRuleKind::Absolute | UrlRuleKind::Attribute | UrlRuleKind::Href => {
                Some(href.to_string())
            }
        }
    }
}

fn resolve_against(base: &str, href: &str) -> Option<String> {
    let base = Url::parse(base).ok()?;
    base.join(href).ok().map(|u| u.to_string())
}

/// Extract one field value per its rule; empty extraction falls back to the
/// rule's default value when the field is not required
fn extract_field(container: ElementRef<'_>, rule: &FieldRule) -> String {
    let Ok(selector) = Selector::parse(&rule.selector) else {
        return fallback(rule);
    };
    let Some(element) = container.select(&selector).next() else {
        return fallback(rule);
    };

    let value = match rule.kind {
        FieldKind::Text => element_text(element),
        FieldKind::Html => element.inner_html().trim().to_string(),
        FieldKind::Attribute => element
            .value()
            .attr(&rule.attribute)
            .unwrap_or_default()
            .to_string(),
        FieldKind::Regex => {
            if rule.regex_pattern.is_empty() {
                String::new()
            } else {
                match Regex::new(&rule.regex_pattern) {
                    Ok(re) => re
                        .captures(&element_text(element))
                        .and_then(|c| c.get(1))
                        .map(|m| m.as_str().to_string())
                        .unwrap_or_default(),
                    Err(_) => String::new(),
                }
            }
        }
    };

    if value.is_empty() {
        fallback(rule)
    } else {
        value
    }
}

fn fallback(rule: &FieldRule) -> String {
    if rule.required {
        String::new()
    } else {
        rule.default_value.clone()
    }
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Apply the ordered transformation list to a string value
fn apply_transformations(value: String, transformations: &[String]) -> String {
    let mut result = value;
    for transform in transformations {
        result = match transform.as_str() {
            "trim" => result.trim().to_string(),
            "lowercase" => result.to_lowercase(),
            "uppercase" => result.to_uppercase(),
            "strip_html" => strip_html(&result),
            "remove_commas" => result.replace(',', ""),
            // parse_int / parse_date are handled by the typed field slots
            _ => result,
        };
    }
    result
}

/// Remove markup, keeping the concatenated text content
fn strip_html(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    fragment
        .root_element()
        .text()
        .collect::<String>()
        .trim()
        .to_string()
}

/// Parse the first run of digits after stripping thousands separators and
/// whitespace; non-numeric input yields no value rather than zero
fn parse_salary(value: &str) -> Option<i64> {
    let cleaned: String = value.chars().filter(|c| *c != ',' && *c != ' ').collect();
    let run = digit_run().find(&cleaned)?;
    run.as_str().parse().ok()
}

/// Expiry-date parsing extension point: RFC3339 first, then plain dates
fn parse_date(value: &str) -> Option<chrono::DateTime<chrono::Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(t) = chrono::DateTime::parse_from_rfc3339(value) {
        return Some(t.with_timezone(&chrono::Utc));
    }
    chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|t| chrono::DateTime::from_naive_utc_and_offset(t, chrono::Utc))
}
