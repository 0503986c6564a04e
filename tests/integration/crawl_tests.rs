//! End-to-end crawls through the coordinator

use crate::load_test_config;
use frontier_crawl::crawler::{Coordinator, Outcome, StopReason};
use frontier_crawl::output::{format_final_report, load_statistics};
use frontier_crawl::state::JobStatus;
use frontier_crawl::storage::{SqliteStorage, Storage};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TWO_SOURCES: &str = r#"
[[source]]
name = "wiki"
target = 2
priority = 1
[source.seed]
strategy = "paginated"
api-url = "{uri}/w/api.php"
url-base = "{uri}/wiki/"
[source.seed.params]
aplimit = "500"

[[source]]
name = "site"
target = 3
follows-links = true
link-domain = "127.0.0.1"
[source.seed]
strategy = "static"
urls = ["{uri}/site/"]
"#;

async fn mount_wiki(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/w/api.php"))
        .and(query_param("list", "allpages"))
        .and(query_param("aplimit", "500"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "query": { "allpages": [ { "title": "Page One" }, { "title": "Page Two" } ] }
        })))
        .mount(server)
        .await;

    for title in ["Page_One", "Page_Two"] {
        Mock::given(method("GET"))
            .and(path(format!("/wiki/{}", title)))
            .respond_with(ResponseTemplate::new(200).set_body_string(format!("<h1>{}</h1>", title)))
            .expect(1)
            .mount(server)
            .await;
    }
}

async fn mount_site(server: &MockServer) {
    let uri = server.uri();

    Mock::given(method("GET"))
        .and(path("/site/"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html")
                .set_body_string(format!(
                    r##"<html><body>
                    <a href="a.html">A</a>
                    <a href="{uri}/site/b.html#top">B</a>
                    <a href="mailto:owner@example.com">mail</a>
                    <a href="https://example.org/elsewhere">offsite</a>
                    </body></html>"##,
                    uri = uri
                )),
        )
        .expect(1)
        .mount(server)
        .await;

    for page in ["/site/a.html", "/site/b.html"] {
        Mock::given(method("GET"))
            .and(path(page))
            .respond_with(ResponseTemplate::new(200).set_body_string(format!("<p>{}</p>", page)))
            .expect(1)
            .mount(server)
            .await;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_full_crawl_two_sources() {
    let server = MockServer::start().await;
    mount_wiki(&server).await;
    mount_site(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("corpus.db");
    let config = load_test_config(&db, &server.uri(), "", TWO_SOURCES);

    let report = Coordinator::new(config.clone())
        .unwrap()
        .without_interrupt_handler()
        .run()
        .await
        .unwrap();

    assert_eq!(report.reason, StopReason::TargetReached);
    assert_eq!(report.documents_added, 5);
    assert_eq!(report.workers.len(), 2);
    assert_eq!(report.totals.get("wiki", Outcome::New), 2);
    assert_eq!(report.totals.get("site", Outcome::New), 3);
    assert_eq!(report.totals.get("site", Outcome::Links), 2);

    let storage = SqliteStorage::new(&db).unwrap();
    let stats = load_statistics(&storage).unwrap();
    assert_eq!(stats.documents("wiki"), 2);
    assert_eq!(stats.documents("site"), 3);
    assert_eq!(stats.jobs(JobStatus::Done), 5);
    assert_eq!(stats.total_jobs, 5);

    let b = storage
        .get_document(&format!("{}/site/b.html", server.uri()))
        .unwrap()
        .unwrap();
    assert_eq!(b.source, "site");
    assert!(b.content_hash.is_some());

    let text = format_final_report(&report, &stats, &config);
    assert!(text.contains("wiki: 2/2 (100.0%)"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_restart_resumes_without_reseeding() {
    let server = MockServer::start().await;
    mount_site(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("corpus.db");

    // First run stops as soon as the site index is stored
    let only_site = r#"
[[source]]
name = "site"
target = 1
follows-links = true
link-domain = "127.0.0.1"
[source.seed]
strategy = "static"
urls = ["{uri}/site/"]
"#;
    let config = load_test_config(&db, &server.uri(), "quota-deferral-secs = 0", only_site);
    let first = Coordinator::new(config)
        .unwrap()
        .without_interrupt_handler()
        .run()
        .await
        .unwrap();
    assert_eq!(first.reason, StopReason::TargetReached);

    // Raising the target lets the second run finish the discovered links
    let config = load_test_config(
        &db,
        &server.uri(),
        "quota-deferral-secs = 0",
        &only_site.replace("target = 1", "target = 3"),
    );
    let second = Coordinator::new(config)
        .unwrap()
        .without_interrupt_handler()
        .run()
        .await
        .unwrap();
    assert_eq!(second.reason, StopReason::TargetReached);

    let storage = SqliteStorage::new(&db).unwrap();
    assert_eq!(storage.count_documents(Some("site")).unwrap(), 3);
    assert_eq!(storage.count_jobs(Some("site"), None).unwrap(), 3);
    // The index page mock expects exactly one request across both runs
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_failing_page_reaches_error_and_run_ends() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("corpus.db");
    let mut config = load_test_config(
        &db,
        &server.uri(),
        "retry-delay-secs = 0",
        r#"
[[source]]
name = "site"
target = 1
[source.seed]
strategy = "static"
urls = ["{uri}/broken"]
"#,
    );
    config.crawler.max_retries = 1;

    let report = Coordinator::new(config)
        .unwrap()
        .without_interrupt_handler()
        .run()
        .await
        .unwrap();

    assert_eq!(report.reason, StopReason::FrontierExhausted);
    assert_eq!(report.totals.total(Outcome::Retry), 1);
    assert_eq!(report.totals.total(Outcome::Error), 1);

    let storage = SqliteStorage::new(&db).unwrap();
    let job = storage
        .get_job(&format!("{}/broken", server.uri()))
        .unwrap()
        .unwrap();
    assert_eq!(job.status, JobStatus::Error);
    assert_eq!(job.attempts, 2);
    assert_eq!(job.error.as_deref(), Some("HTTP 500"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_lagging_source_is_seeded_again() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/w/api.php"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "query": { "allpages": [ { "title": "Flaky" } ] }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/wiki/Flaky"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/fast"))
        .respond_with(ResponseTemplate::new(200).set_body_string("fast"))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("corpus.db");
    let config = load_test_config(
        &db,
        &server.uri(),
        "",
        r#"
[[source]]
name = "fast"
target = 1
[source.seed]
strategy = "static"
urls = ["{uri}/fast"]

[[source]]
name = "slow"
target = 5
[source.seed]
strategy = "paginated"
api-url = "{uri}/w/api.php"
url-base = "{uri}/wiki/"
"#,
    );

    let coordinator = Coordinator::new(config).unwrap().without_interrupt_handler();
    let stop = coordinator.stop_signal();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(800)).await;
        stop.raise();
    });

    let report = coordinator.run().await.unwrap();
    assert_eq!(report.reason, StopReason::Interrupted);

    // Initial seed plus exactly one supplemental pass
    let listing_calls = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path() == "/w/api.php")
        .count();
    assert_eq!(listing_calls, 2);
}
