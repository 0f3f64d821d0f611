//! Crawl engine integration tests against a mock job board

mod common;

use std::sync::Arc;

use jobharvest::crawler::{CrawlEngine, HttpFetcher};
use jobharvest::models::PaginationConfig;
use jobharvest::storage::{JobRepository, SqliteJobRepository};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn engine(jobs: Arc<SqliteJobRepository>) -> CrawlEngine {
    CrawlEngine::new(Arc::new(HttpFetcher::new().unwrap()), jobs)
}

#[tokio::test]
async fn query_param_crawl_collects_all_pages() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/jobs"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(common::listing_page(&[
            ("Backend Engineer", "/jobs/1"),
            ("Data Engineer", "/jobs/2"),
        ])))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/jobs"))
        .and(query_param("page", "2"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(common::listing_page(&[("Platform Engineer", "/jobs/3")])),
        )
        .mount(&server)
        .await;

    let site = common::site(
        &format!("{}/jobs", server.uri()),
        PaginationConfig::QueryParam {
            param_name: "page".to_string(),
            start_page: 1,
            increment: 1,
            max_pages: 2,
        },
    );

    let jobs = Arc::new(SqliteJobRepository::in_memory().unwrap());
    let result = engine(jobs.clone())
        .crawl(&site, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.pages_crawled, 2);
    assert_eq!(result.jobs_found, 3);
    assert_eq!(result.jobs_saved, 3);
    assert_eq!(result.jobs_skipped, 0);
    assert!(result.errors.is_empty(), "unexpected: {:?}", result.errors);

    let saved = jobs.find_by_site("site-1").await.unwrap();
    assert_eq!(saved.len(), 3);
    assert!(saved.iter().all(|j| j.detail_url.starts_with(&server.uri())));
    assert!(saved.iter().all(|j| !j.synced));
    assert!(saved.iter().all(|j| !j.deduplication_hash.is_empty()));
}

#[tokio::test]
async fn second_crawl_skips_known_listings() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/jobs"))
        .respond_with(ResponseTemplate::new(200).set_body_string(common::listing_page(&[
            ("Backend Engineer", "/jobs/1"),
            ("Data Engineer", "/jobs/2"),
        ])))
        .mount(&server)
        .await;

    let site = common::site(
        &format!("{}/jobs", server.uri()),
        PaginationConfig::SinglePage,
    );

    let jobs = Arc::new(SqliteJobRepository::in_memory().unwrap());
    let engine = engine(jobs.clone());

    let first = engine.crawl(&site, &CancellationToken::new()).await.unwrap();
    assert_eq!(first.jobs_saved, 2);

    let second = engine.crawl(&site, &CancellationToken::new()).await.unwrap();
    assert_eq!(second.jobs_found, 2);
    assert_eq!(second.jobs_saved, 0);
    assert_eq!(second.jobs_skipped, 2);

    assert_eq!(jobs.find_by_site("site-1").await.unwrap().len(), 2);
}

#[tokio::test]
async fn listing_without_detail_link_is_dropped() {
    let server = MockServer::start().await;

    // Third container has no apply link at all
    let mut page = common::listing_page(&[
        ("Backend Engineer", "/jobs/1"),
        ("Data Engineer", "/jobs/2"),
    ]);
    page = page.replace(
        "</body>",
        r#"<div class="job"><h2 class="title">Ghost Listing</h2></div></body>"#,
    );

    Mock::given(method("GET"))
        .and(path("/jobs"))
        .respond_with(ResponseTemplate::new(200).set_body_string(page))
        .mount(&server)
        .await;

    let site = common::site(
        &format!("{}/jobs", server.uri()),
        PaginationConfig::SinglePage,
    );

    let jobs = Arc::new(SqliteJobRepository::in_memory().unwrap());
    let result = engine(jobs)
        .crawl(&site, &CancellationToken::new())
        .await
        .unwrap();

    // The unlinkable listing never shows up in any counter
    assert_eq!(result.jobs_found, 2);
    assert_eq!(result.jobs_saved, 2);
    assert_eq!(result.jobs_skipped, 0);
    assert!(result.errors.is_empty());
}

#[tokio::test]
async fn link_follow_walks_next_links_and_breaks_cycles() {
    let server = MockServer::start().await;

    let mut page_one = common::listing_page(&[("Backend Engineer", "/jobs/1")]);
    page_one = page_one.replace("</body>", r#"<a class="next" href="/page2">Next</a></body>"#);

    // Second page points back at the first; the crawl must not loop
    let mut page_two = common::listing_page(&[("Data Engineer", "/jobs/2")]);
    page_two = page_two.replace("</body>", r#"<a class="next" href="/page1">Next</a></body>"#);

    Mock::given(method("GET"))
        .and(path("/page1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(page_one))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/page2"))
        .respond_with(ResponseTemplate::new(200).set_body_string(page_two))
        .mount(&server)
        .await;

    let site = common::site(
        &format!("{}/page1", server.uri()),
        PaginationConfig::LinkFollow {
            next_page_selector: "a.next".to_string(),
        },
    );

    let jobs = Arc::new(SqliteJobRepository::in_memory().unwrap());
    let result = engine(jobs)
        .crawl(&site, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.pages_crawled, 2);
    assert_eq!(result.jobs_found, 2);
    assert_eq!(result.jobs_saved, 2);
}

#[tokio::test]
async fn fetch_failure_is_recorded_not_fatal() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/jobs"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/jobs"))
        .and(query_param("page", "2"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(common::listing_page(&[("Backend Engineer", "/jobs/1")])),
        )
        .mount(&server)
        .await;

    let site = common::site(
        &format!("{}/jobs", server.uri()),
        PaginationConfig::QueryParam {
            param_name: "page".to_string(),
            start_page: 1,
            increment: 1,
            max_pages: 2,
        },
    );

    let jobs = Arc::new(SqliteJobRepository::in_memory().unwrap());
    let result = engine(jobs)
        .crawl(&site, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.pages_crawled, 2);
    assert_eq!(result.jobs_found, 1);
    assert_eq!(result.jobs_saved, 1);
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].contains("failed to fetch"));
}

#[tokio::test]
async fn cancelled_crawl_reports_partial_results() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(common::listing_page(&[("Backend Engineer", "/jobs/1")])),
        )
        .mount(&server)
        .await;

    let site = common::site(
        &format!("{}/jobs", server.uri()),
        PaginationConfig::SinglePage,
    );

    let cancel = CancellationToken::new();
    cancel.cancel();

    let jobs = Arc::new(SqliteJobRepository::in_memory().unwrap());
    let result = engine(jobs).crawl(&site, &cancel).await.unwrap();

    assert_eq!(result.pages_crawled, 0);
    assert_eq!(result.jobs_found, 0);
}
