//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::collections::BTreeMap;

use chrono::Utc;
use jobharvest::models::{
    CrawlSite, ExtractionRules, FieldRule, JobUrlRule, PaginationConfig, UrlRuleKind,
};

pub fn text_field(selector: &str) -> FieldRule {
    FieldRule {
        selector: selector.to_string(),
        ..Default::default()
    }
}

/// Rules matching the markup produced by [`listing_page`]
pub fn listing_rules() -> ExtractionRules {
    let mut fields = BTreeMap::new();
    fields.insert("title".to_string(), text_field("h2.title"));
    fields.insert("company".to_string(), text_field("span.company"));
    fields.insert("location".to_string(), text_field("span.location"));

    ExtractionRules {
        job_list_selector: "div.job".to_string(),
        job_detail_url: JobUrlRule {
            kind: UrlRuleKind::Relative,
            selector: "a.apply".to_string(),
            ..Default::default()
        },
        fields,
    }
}

pub fn site(base_url: &str, pagination: PaginationConfig) -> CrawlSite {
    let now = Utc::now();
    CrawlSite {
        id: "site-1".to_string(),
        name: "Test Board".to_string(),
        base_url: base_url.to_string(),
        backend_startup_id: "startup-1".to_string(),
        active: true,
        schedule: "0 0 * * * *".to_string(),
        last_crawled_at: None,
        next_crawl_at: None,
        crawl_interval: String::new(),
        pagination_config: pagination,
        extraction_rules: listing_rules(),
        deduplication_key: Default::default(),
        request_delay: 0,
        user_agent: String::new(),
        created_at: now,
        updated_at: now,
    }
}

/// Render a listing page with one container per (title, href) pair
pub fn listing_page(jobs: &[(&str, &str)]) -> String {
    let mut body = String::from("<html><body>");
    for (title, href) in jobs {
        body.push_str(&format!(
            r#"<div class="job"><h2 class="title">{title}</h2><span class="company">Acme</span><span class="location">Berlin</span><a class="apply" href="{href}">Apply</a></div>"#
        ));
    }
    body.push_str("</body></html>");
    body
}
