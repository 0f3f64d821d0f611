//! Page enumeration strategies
//!
//! Turns a site's [`PaginationConfig`] into the ordered sequence of page
//! URLs to visit. For link-follow pagination the initial sequence is just
//! the base URL; further pages are discovered one at a time from each
//! fetched document by the crawl engine.

use scraper::{Html, Selector};
use url::Url;

use crate::error::PaginationError;
use crate::models::PaginationConfig;

/// Paginator for one site's configuration
pub struct Paginator {
    config: PaginationConfig,
}

impl Paginator {
    pub fn new(config: PaginationConfig) -> Self {
        Self { config }
    }

    /// Whether this site discovers pages by following "next" links
    pub fn is_link_follow(&self) -> bool {
        matches!(self.config, PaginationConfig::LinkFollow { .. })
    }

    /// Generate the initial ordered list of page URLs
    ///
    /// # Errors
    ///
    /// Returns [`PaginationError::InvalidBaseUrl`] when the base URL (or API
    /// endpoint) cannot be parsed; this aborts the whole crawl run.
    pub fn page_urls(&self, base_url: &str) -> Result<Vec<String>, PaginationError> {
        match &self.config {
            PaginationConfig::SinglePage | PaginationConfig::LinkFollow { .. } => {
                Ok(vec![base_url.to_string()])
            }
            PaginationConfig::QueryParam {
                param_name,
                start_page,
                increment,
                max_pages,
            } => {
                let base = parse_url(base_url)?;
                Ok(page_numbers(*start_page, *increment, *max_pages)
                    .map(|page| with_query_param(&base, param_name, page, None))
                    .collect())
            }
            PaginationConfig::UrlPattern {
                pattern,
                start_page,
                increment,
                max_pages,
            } => {
                let base = parse_url(base_url)?;
                let mut base_path = base.path().to_string();
                if !base_path.ends_with('/') {
                    base_path.push('/');
                }
                Ok(page_numbers(*start_page, *increment, *max_pages)
                    .map(|page| {
                        let substituted = pattern.replace("{page}", &page.to_string());
                        let mut url = base.clone();
                        url.set_path(&format!(
                            "{base_path}{}",
                            substituted.trim_start_matches('/')
                        ));
                        url.to_string()
                    })
                    .collect())
            }
            PaginationConfig::Api {
                endpoint,
                page_param,
                page_size,
                start_page,
                increment,
                max_pages,
            } => {
                let base = parse_url(endpoint)?;
                Ok(page_numbers(*start_page, *increment, *max_pages)
                    .map(|page| with_query_param(&base, page_param, page, *page_size))
                    .collect())
            }
        }
    }

    /// Whether the just-fetched document contains a next-page link
    ///
    /// Always false for non-link-follow configurations.
    pub fn has_next_page(&self, document: &Html) -> bool {
        let PaginationConfig::LinkFollow { next_page_selector } = &self.config else {
            return false;
        };
        if next_page_selector.is_empty() {
            return false;
        }
        let Ok(selector) = Selector::parse(next_page_selector) else {
            return false;
        };
        document.select(&selector).next().is_some()
    }

    /// Extract the next page URL from the document
    ///
    /// Relative references resolve against the *current* page URL, not the
    /// site base.
    ///
    /// # Errors
    ///
    /// Fails for non-link-follow configurations, unparseable selectors, and
    /// missing or href-less links.
    pub fn next_page_url(
        &self,
        document: &Html,
        current_url: &str,
    ) -> Result<String, PaginationError> {
        let PaginationConfig::LinkFollow { next_page_selector } = &self.config else {
            return Err(PaginationError::NotLinkFollow);
        };

        let selector = Selector::parse(next_page_selector)
            .map_err(|_| PaginationError::InvalidNextPageSelector(next_page_selector.clone()))?;

        let link = document
            .select(&selector)
            .next()
            .ok_or(PaginationError::NextLinkNotFound)?;
        let href = link
            .value()
            .attr("href")
            .ok_or(PaginationError::NextLinkNotFound)?;

        if href.starts_with("http") {
            return Ok(href.to_string());
        }

        let current = parse_url(current_url)?;
        current
            .join(href)
            .map(|u| u.to_string())
            .map_err(|_| PaginationError::InvalidBaseUrl(href.to_string()))
    }
}

fn parse_url(raw: &str) -> Result<Url, PaginationError> {
    Url::parse(raw).map_err(|_| PaginationError::InvalidBaseUrl(raw.to_string()))
}

fn page_numbers(start: i64, increment: i64, max_pages: usize) -> impl Iterator<Item = i64> {
    (0..max_pages as i64).map(move |i| start + i * increment)
}

/// Return `base` with the page parameter set (replacing any existing value)
/// and an optional `page_size` parameter
fn with_query_param(base: &Url, param: &str, page: i64, page_size: Option<u32>) -> String {
    let mut url = base.clone();
    let kept: Vec<(String, String)> = base
        .query_pairs()
        .filter(|(k, _)| k != param && (page_size.is_none() || k != "page_size"))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    {
        let mut pairs = url.query_pairs_mut();
        pairs.clear();
        for (k, v) in &kept {
            pairs.append_pair(k, v);
        }
        pairs.append_pair(param, &page.to_string());
        if let Some(size) = page_size {
            pairs.append_pair("page_size", &size.to_string());
        }
    }

    url.to_string()
}
