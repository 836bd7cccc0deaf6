//! Integration tests for the crawlers
//!
//! These tests use wiremock to stand in for the catalog API and a temporary
//! SQLite file for storage, exercising full crawl cycles end-to-end.

use catalog_crawler::catalog::{ApiProblem, CatalogClient};
use catalog_crawler::config::{ApiConfig, Config, CrawlerConfig, DatabaseConfig, UserAgentConfig};
use catalog_crawler::crawler::{run_crawl, BatchOutcome, CrawlTarget, ProblemCrawler, SourceCrawler};
use catalog_crawler::storage::{CatalogTable, RunStatus, SqliteStorage, Storage};
use serde_json::{json, Value};
use std::path::Path;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration pointing at `base_url` with no politeness delays
fn create_test_config(base_url: &str, db_path: &Path) -> Config {
    Config {
        api: ApiConfig {
            base_url: base_url.to_string(),
            max_retries: 2,
            base_delay_ms: 1,
            request_timeout_secs: 5,
        },
        user_agent: UserAgentConfig {
            crawler_name: "TestBot".to_string(),
            crawler_version: "1.0.0".to_string(),
            contact_url: "https://example.com/contact".to_string(),
            contact_email: "test@example.com".to_string(),
        },
        crawler: CrawlerConfig {
            page_delay_ms: 0,
            unit_delay_ms: 0,
            failure_cooldown_ms: 0,
            tag_batch_size: 2,
            tag_batch_delay_ms: 0,
        },
        database: DatabaseConfig {
            path: db_path.to_string_lossy().into_owned(),
            transaction_timeout_ms: 5000,
        },
    }
}

struct TestEnv {
    server: MockServer,
    config: Config,
    client: CatalogClient,
    storage: SqliteStorage,
    _dir: TempDir,
}

async fn setup() -> TestEnv {
    let server = MockServer::start().await;
    let dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = dir.path().join("catalog.db");
    let config = create_test_config(&server.uri(), &db_path);
    let client = CatalogClient::new(&config.api, &config.user_agent).expect("Failed to build client");
    let storage = SqliteStorage::new(&db_path).expect("Failed to open DB");

    TestEnv {
        server,
        config,
        client,
        storage,
        _dir: dir,
    }
}

fn tag_json(key: &str) -> Value {
    json!({
        "key": key,
        "isMeta": false,
        "displayNames": [{ "language": "ko", "name": format!("{}-ko", key) }]
    })
}

fn problem_json(id: i64, tags: &[&str]) -> Value {
    json!({
        "problemId": id,
        "titleKo": format!("문제 {}", id),
        "titles": [{ "language": "en", "title": format!("Problem {}", id) }],
        "level": 5,
        "acceptedUserCount": 100,
        "averageTries": 2.5,
        "tags": tags.iter().map(|t| tag_json(t)).collect::<Vec<_>>(),
        "classes": [{ "class": 3 }]
    })
}

fn page_json(items: Vec<Value>) -> Value {
    json!({ "count": items.len(), "items": items })
}

async fn mount_search_page(server: &MockServer, query: &str, page: u32, items: Vec<Value>) {
    Mock::given(method("GET"))
        .and(path("/search/problem"))
        .and(query_param("query", query))
        .and(query_param("page", page.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_json(items)))
        .mount(server)
        .await;
}

fn group_json(id: i64, parent: i64) -> Value {
    json!({
        "contestGroupId": id,
        "contestGroupName": format!("g{}", id),
        "contestGroupFullName": format!("Group {}", id),
        "contestGroupProblemCount": 10,
        "contestGroupAvailableProblemCount": 9,
        "contestGroupOpenProblemCount": 8,
        "parentContestGroupId": parent
    })
}

async fn mount_group(server: &MockServer, id: i64, body: Value) {
    Mock::given(method("GET"))
        .and(path("/problem/contest/group"))
        .and(query_param("contestGroupId", id.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

async fn mount_contest(server: &MockServer, id: i64, group_id: i64, problem_ids: &[i64]) {
    let problems: Vec<Value> = problem_ids
        .iter()
        .map(|p| json!({ "problemId": p, "titleKo": format!("문제 {}", p) }))
        .collect();
    Mock::given(method("GET"))
        .and(path("/problem/contest"))
        .and(query_param("contestId", id.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "contest": { "contestId": id, "contestName": format!("Contest {}", id), "contestGroupId": group_id },
            "problems": problems
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_level_pagination_stops_on_empty_page() {
    let mut env = setup().await;

    mount_search_page(
        &env.server,
        "*5",
        1,
        vec![problem_json(1001, &[]), problem_json(1002, &[])],
    )
    .await;
    mount_search_page(&env.server, "*5", 2, vec![]).await;

    let stats = {
        let mut crawler = ProblemCrawler::new(&env.client, &mut env.storage, &env.config);
        crawler.crawl_problems_by_level(5).await;
        crawler.into_stats()
    };

    assert_eq!(stats.pages_fetched, 1);
    assert_eq!(stats.problems_saved, 2);
    assert_eq!(env.storage.count_rows(CatalogTable::Problems).unwrap(), 2);
    // Level passes never write class memberships, whatever the catalog reports
    assert_eq!(env.storage.count_rows(CatalogTable::ProblemClasses).unwrap(), 0);

    let problem = env.storage.get_problem(1002).unwrap().unwrap();
    assert_eq!(problem.title_en.as_deref(), Some("Problem 1002"));
    assert_eq!(problem.level, 5);

    let requests = env.server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2, "pagination should stop after page 2");
}

#[tokio::test]
async fn test_single_problem_refresh() {
    let mut env = setup().await;

    Mock::given(method("GET"))
        .and(path("/problem/show"))
        .and(query_param("problemId", "1000"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "problemId": 1000,
            "titleKo": "A+B",
            "titles": [],
            "level": 1,
            "acceptedUserCount": 200000,
            "tags": [{ "key": "math", "isMeta": false, "displayNames": [{ "language": "ko", "name": "수학" }] }],
            "classes": [{ "class": 1 }]
        })))
        .expect(1)
        .mount(&env.server)
        .await;

    {
        let mut crawler = ProblemCrawler::new(&env.client, &mut env.storage, &env.config);
        crawler.crawl_single_problem(1000).await.expect("Refresh failed");
    }

    assert_eq!(env.storage.count_rows(CatalogTable::Problems).unwrap(), 1);
    assert_eq!(env.storage.count_rows(CatalogTable::Tags).unwrap(), 1);
    assert_eq!(env.storage.count_rows(CatalogTable::ProblemTags).unwrap(), 1);
    assert_eq!(env.storage.count_rows(CatalogTable::ProblemClasses).unwrap(), 0);

    let tag = env.storage.get_tag("math").unwrap().unwrap();
    assert_eq!(tag.name_ko, "수학");
    assert_eq!(tag.name_en, None);

    let problem = env.storage.get_problem(1000).unwrap().unwrap();
    assert_eq!(problem.title_en, None);
    assert_eq!(problem.average_tries, 0.0);
}

#[tokio::test]
async fn test_repeated_class_pass_is_idempotent() {
    let mut env = setup().await;

    mount_search_page(
        &env.server,
        "c/2",
        1,
        vec![
            problem_json(1000, &["math", "implementation", "greedy"]),
            problem_json(1001, &["math"]),
        ],
    )
    .await;
    mount_search_page(&env.server, "c/2", 2, vec![]).await;

    let mut snapshots = Vec::new();
    for _ in 0..2 {
        {
            let mut crawler = ProblemCrawler::new(&env.client, &mut env.storage, &env.config);
            crawler.crawl_problems_by_class(2).await;
        }
        let counts: Vec<u64> = CatalogTable::ALL
            .iter()
            .map(|t| env.storage.count_rows(*t).unwrap())
            .collect();
        snapshots.push((counts, env.storage.get_problem(1000).unwrap()));
    }

    assert_eq!(snapshots[0], snapshots[1]);
    assert_eq!(env.storage.count_rows(CatalogTable::Tags).unwrap(), 3);
    assert_eq!(env.storage.count_rows(CatalogTable::ProblemTags).unwrap(), 4);
    assert_eq!(env.storage.count_rows(CatalogTable::Classes).unwrap(), 1);
    assert_eq!(env.storage.get_problem_classes(1001).unwrap(), vec![2]);
    assert_eq!(
        env.storage.get_problem_tags(1000).unwrap(),
        vec!["greedy", "implementation", "math"]
    );
}

#[tokio::test]
async fn test_rate_limited_page_is_retried() {
    let mut env = setup().await;

    Mock::given(method("GET"))
        .and(path("/search/problem"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .expect(1)
        .mount(&env.server)
        .await;
    mount_search_page(&env.server, "*7", 1, vec![problem_json(3000, &[])]).await;
    mount_search_page(&env.server, "*7", 2, vec![]).await;

    let stats = {
        let mut crawler = ProblemCrawler::new(&env.client, &mut env.storage, &env.config);
        crawler.crawl_problems_by_level(7).await;
        crawler.into_stats()
    };

    assert_eq!(stats.units_aborted, 0);
    assert!(env.storage.get_problem(3000).unwrap().is_some());
}

#[tokio::test]
async fn test_failed_unit_does_not_abort_crawl_all() {
    let mut env = setup().await;

    Mock::given(method("GET"))
        .and(path("/search/problem"))
        .and(query_param("query", "c/1"))
        .respond_with(ResponseTemplate::new(429))
        .expect(2)
        .mount(&env.server)
        .await;
    mount_search_page(&env.server, "*5", 1, vec![problem_json(1001, &["math"])]).await;
    Mock::given(method("GET"))
        .and(path("/search/problem"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_json(vec![])))
        .mount(&env.server)
        .await;

    let stats = {
        let mut crawler = ProblemCrawler::new(&env.client, &mut env.storage, &env.config);
        crawler.crawl_all().await;
        crawler.into_stats()
    };

    assert_eq!(stats.units_aborted, 1);
    assert_eq!(stats.problems_saved, 1);
    assert!(env.storage.get_problem(1001).unwrap().is_some());
}

#[tokio::test]
async fn test_source_tree_traversal() {
    let mut env = setup().await;

    mount_group(
        &env.server,
        0,
        json!({
            "contestGroup": { "contestGroupId": 0 },
            "childGroups": [group_json(10, 0), group_json(12, 0)],
            "childContests": []
        }),
    )
    .await;
    mount_group(
        &env.server,
        10,
        json!({
            "contestGroup": group_json(10, 0),
            "childGroups": [group_json(11, 10)],
            "childContests": [{ "contestId": 100, "contestName": "Contest 100", "contestGroupId": 10 }]
        }),
    )
    .await;
    mount_group(
        &env.server,
        11,
        json!({
            "contestGroup": group_json(11, 10),
            "childGroups": [],
            "childContests": [
                { "contestId": 101, "contestName": "Contest 101" },
                { "contestId": 100, "contestName": "Contest 100" }
            ]
        }),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/problem/contest/group"))
        .and(query_param("contestGroupId", "12"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&env.server)
        .await;
    mount_contest(&env.server, 100, 10, &[2000, 2001]).await;
    mount_contest(&env.server, 101, 99, &[2001]).await;

    let stats = {
        let mut crawler = SourceCrawler::new(&env.client, &mut env.storage, &env.config);
        crawler.crawl_all().await.expect("Source crawl failed");
        crawler.into_stats()
    };

    assert_eq!(stats.groups_saved, 2);
    assert_eq!(stats.groups_failed, 1);
    assert_eq!(stats.contests_saved, 2);

    // The synthetic root is never stored; 12 exists from eager creation
    assert!(env.storage.get_source(0).unwrap().is_none());
    assert_eq!(env.storage.count_rows(CatalogTable::Sources).unwrap(), 3);
    assert_eq!(env.storage.get_source(10).unwrap().unwrap().parent_id, None);
    assert_eq!(env.storage.get_source(11).unwrap().unwrap().parent_id, Some(10));

    let contest = env.storage.get_contest(101).unwrap().unwrap();
    assert_eq!(contest.source_id, 99);
    assert_eq!(env.storage.get_contest_problems(100).unwrap(), vec![2000, 2001]);
    assert_eq!(env.storage.get_problem_sources(2001).unwrap(), vec![10]);
    assert_eq!(env.storage.count_rows(CatalogTable::ProblemContests).unwrap(), 3);

    let stub = env.storage.get_problem(2000).unwrap().unwrap();
    assert_eq!(stub.title_ko, "문제 2000");
}

#[tokio::test]
async fn test_failed_problem_does_not_stop_batch() {
    let mut env = setup().await;
    env.config.database.transaction_timeout_ms = 5;
    env.config.crawler.tag_batch_size = 1;
    env.config.crawler.tag_batch_delay_ms = 30;

    // Problem 1 sleeps between its two tag sub-batches and runs past the
    // transaction timeout; problem 2 has no tags and commits at once.
    let problems: Vec<ApiProblem> = vec![
        serde_json::from_value(problem_json(1, &["math", "dp"])).unwrap(),
        serde_json::from_value(problem_json(2, &[])).unwrap(),
    ];

    let (outcome, stats) = {
        let mut crawler = ProblemCrawler::new(&env.client, &mut env.storage, &env.config);
        let outcome = crawler.process_problem_batch(&problems, None).await;
        (outcome, crawler.into_stats())
    };

    assert_eq!(outcome, BatchOutcome { saved: 1, failed: 1 });
    assert_eq!(stats.problems_failed, 1);
    assert_eq!(stats.problems_saved, 1);
    assert!(env.storage.get_problem(1).unwrap().is_none());
    assert!(env.storage.get_problem(2).unwrap().is_some());
    assert!(env.storage.get_tag("math").unwrap().is_none());
}

#[tokio::test]
async fn test_failed_contest_problem_is_skipped() {
    let mut env = setup().await;
    mount_contest(&env.server, 100, 0, &[2000, 9999, 2001]).await;

    let conn = rusqlite::Connection::open(&env.config.database.path).expect("Failed to open DB");
    conn.execute_batch(
        "CREATE TRIGGER reject_problem_9999 BEFORE INSERT ON problem_contests
         WHEN NEW.problem_id = 9999
         BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
    )
    .expect("Failed to create trigger");
    drop(conn);

    let stats = {
        let mut crawler = SourceCrawler::new(&env.client, &mut env.storage, &env.config);
        crawler.crawl_contest(100).await.expect("Contest crawl failed");
        crawler.into_stats()
    };

    assert_eq!(stats.contests_saved, 1);
    assert_eq!(stats.contest_problems_failed, 1);
    assert_eq!(env.storage.get_contest_problems(100).unwrap(), vec![2000, 2001]);
    // The stub and its join row share one transaction
    assert!(env.storage.get_problem(9999).unwrap().is_none());
}

#[tokio::test]
async fn test_group_under_two_parents_is_crawled_once() {
    let mut env = setup().await;

    mount_group(
        &env.server,
        0,
        json!({
            "contestGroup": { "contestGroupId": 0 },
            "childGroups": [group_json(10, 0), group_json(11, 0)],
            "childContests": []
        }),
    )
    .await;
    mount_group(
        &env.server,
        10,
        json!({ "contestGroup": group_json(10, 0), "childGroups": [group_json(30, 10)], "childContests": [] }),
    )
    .await;
    mount_group(
        &env.server,
        11,
        json!({ "contestGroup": group_json(11, 0), "childGroups": [group_json(30, 11)], "childContests": [] }),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/problem/contest/group"))
        .and(query_param("contestGroupId", "30"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "contestGroup": group_json(30, 10),
            "childGroups": [],
            "childContests": []
        })))
        .expect(1)
        .mount(&env.server)
        .await;

    let stats = {
        let mut crawler = SourceCrawler::new(&env.client, &mut env.storage, &env.config);
        crawler.crawl_all().await.expect("Source crawl failed");
        crawler.into_stats()
    };

    assert_eq!(stats.groups_saved, 3);
    assert_eq!(env.server.received_requests().await.unwrap().len(), 4);
    assert_eq!(env.storage.get_source(30).unwrap().unwrap().parent_id, Some(10));
}

#[tokio::test]
async fn test_root_failure_is_returned() {
    let mut env = setup().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&env.server)
        .await;

    let mut crawler = SourceCrawler::new(&env.client, &mut env.storage, &env.config);
    assert!(crawler.crawl_all().await.is_err());
}

#[tokio::test]
async fn test_parent_link_heals_on_later_pass() {
    let mut env = setup().await;

    mount_group(
        &env.server,
        20,
        json!({ "contestGroup": group_json(20, 21), "childGroups": [], "childContests": [] }),
    )
    .await;
    mount_group(
        &env.server,
        21,
        json!({ "contestGroup": group_json(21, 0), "childGroups": [], "childContests": [] }),
    )
    .await;

    {
        let mut crawler = SourceCrawler::new(&env.client, &mut env.storage, &env.config);
        crawler.crawl_single_source(20).await.expect("First refresh failed");
        assert_eq!(crawler.stats().parent_links_deferred, 1);
    }
    assert_eq!(env.storage.get_source(20).unwrap().unwrap().parent_id, None);

    {
        let mut crawler = SourceCrawler::new(&env.client, &mut env.storage, &env.config);
        crawler.crawl_single_source(21).await.expect("Parent refresh failed");
        crawler.crawl_single_source(20).await.expect("Second refresh failed");
    }
    assert_eq!(env.storage.get_source(20).unwrap().unwrap().parent_id, Some(21));
}

#[tokio::test]
async fn test_run_crawl_records_runs() {
    let env = setup().await;
    mount_contest(&env.server, 100, 0, &[2000]).await;

    let stats = run_crawl(&env.config, "hash-1", CrawlTarget::Contest(100))
        .await
        .expect("Contest crawl failed");
    assert_eq!(stats.contests_saved, 1);

    let result = run_crawl(&env.config, "hash-1", CrawlTarget::Contest(404)).await;
    assert!(result.is_err());

    let storage = SqliteStorage::new(Path::new(&env.config.database.path)).expect("Failed to open DB");
    let latest = storage.get_latest_run().unwrap().unwrap();
    assert_eq!(latest.kind, "contest");
    assert_eq!(latest.target, Some(404));
    assert_eq!(latest.status, RunStatus::Failed);
    assert!(latest.error_message.is_some());

    let first = storage.get_run(latest.id - 1).unwrap();
    assert_eq!(first.status, RunStatus::Completed);
    assert_eq!(first.config_hash, "hash-1");
    assert!(first.finished_at.is_some());
    assert!(storage.get_problem(2000).unwrap().is_some());
}
