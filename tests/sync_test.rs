//! Sync service integration tests against a mock downstream API

mod common;

use std::sync::Arc;

use jobharvest::models::{CrawledJob, PaginationConfig};
use jobharvest::storage::{
    JobRepository, SiteRepository, SqliteJobRepository, SqliteSiteRepository,
};
use jobharvest::sync::SyncService;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn seed_backlog(jobs: &SqliteJobRepository, count: usize) {
    for i in 0..count {
        let job = CrawledJob {
            id: format!("job-{i}"),
            site_id: "site-1".to_string(),
            detail_url: format!("https://jobs.example.com/{i}"),
            title: format!("Engineer {i}"),
            job_type: "full-time".to_string(),
            location_type: "remote".to_string(),
            currency: "EUR".to_string(),
            synced: false,
            ..Default::default()
        };
        jobs.create(&job).await.unwrap();
    }
}

async fn fixture() -> (Arc<SqliteJobRepository>, Arc<SqliteSiteRepository>) {
    let jobs = Arc::new(SqliteJobRepository::in_memory().unwrap());
    let sites = Arc::new(SqliteSiteRepository::in_memory().unwrap());
    let site = common::site("https://jobs.example.com", PaginationConfig::SinglePage);
    sites.create(&site).await.unwrap();
    (jobs, sites)
}

#[tokio::test]
async fn sync_marks_each_accepted_record() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/token/jobs"))
        .and(header("authorization", "Bearer token-1"))
        .respond_with(ResponseTemplate::new(201))
        .expect(3)
        .mount(&server)
        .await;

    let (jobs, sites) = fixture().await;
    seed_backlog(&jobs, 3).await;

    let service = SyncService::new(server.uri(), "token-1", jobs.clone(), sites).unwrap();
    let result = service.sync_jobs().await.unwrap();

    assert_eq!(result.success_count, 3);
    assert_eq!(result.failure_count, 0);
    assert!(result.errors.is_empty());

    assert_eq!(jobs.count_unsynced().await.unwrap(), 0);
    let job = jobs.find_by_id("job-0").await.unwrap();
    assert!(job.synced);
    assert!(job.synced_at.is_some());
}

#[tokio::test]
async fn rejected_record_stays_unsynced() {
    let server = MockServer::start().await;

    // The second record is rejected; more specific mock mounts first
    Mock::given(method("POST"))
        .and(path("/api/v1/token/jobs"))
        .and(body_partial_json(json!({"title": "Engineer 1"})))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/v1/token/jobs"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;

    let (jobs, sites) = fixture().await;
    seed_backlog(&jobs, 3).await;

    let service = SyncService::new(server.uri(), "token-1", jobs.clone(), sites).unwrap();
    let result = service.sync_jobs().await.unwrap();

    assert_eq!(result.success_count, 2);
    assert_eq!(result.failure_count, 1);
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].contains("job-1"));
    assert!(result.errors[0].contains("500"));

    // The rejected record is picked up again on the next pass
    assert_eq!(jobs.count_unsynced().await.unwrap(), 1);
    assert!(!jobs.find_by_id("job-1").await.unwrap().synced);
}

#[tokio::test]
async fn batching_drains_the_full_backlog() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/token/jobs"))
        .respond_with(ResponseTemplate::new(201))
        .expect(5)
        .mount(&server)
        .await;

    let (jobs, sites) = fixture().await;
    seed_backlog(&jobs, 5).await;

    let service = SyncService::new(server.uri(), "token-1", jobs.clone(), sites)
        .unwrap()
        .with_batch_size(2);
    let result = service.sync_jobs().await.unwrap();

    assert_eq!(result.success_count, 5);
    assert_eq!(jobs.count_unsynced().await.unwrap(), 0);
}

#[tokio::test]
async fn payload_carries_normalized_vocabulary() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/token/jobs"))
        .and(body_partial_json(json!({
            "startup_id": "startup-1",
            "title": "Engineer 0",
            "job_type": "full_time",
            "location_type": "remote",
            "currency": "EUR",
        })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let (jobs, sites) = fixture().await;
    seed_backlog(&jobs, 1).await;

    let service = SyncService::new(server.uri(), "token-1", jobs, sites).unwrap();
    let result = service.sync_jobs().await.unwrap();

    assert_eq!(result.success_count, 1);
    assert_eq!(result.failure_count, 0);
}

#[tokio::test]
async fn empty_backlog_is_a_no_op() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let (jobs, sites) = fixture().await;
    let service = SyncService::new(server.uri(), "token-1", jobs, sites).unwrap();
    let result = service.sync_jobs().await.unwrap();

    assert_eq!(result.success_count, 0);
    assert_eq!(result.failure_count, 0);
}
