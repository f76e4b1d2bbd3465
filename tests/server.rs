use std::sync::Arc;

use chrono::Duration;
use query_latency_bench::query::{default_cases, QueryCase};
use query_latency_bench::server::create_router;
use query_latency_bench::store::{MemoryStore, Mutation, Store, Value, USER_PARTIAL};
use query_latency_bench::timing::{CapturedLines, LineSink, Severity, TimingRecord};
use query_latency_bench::AppState;

struct TestServer {
    base: String,
    timing: CapturedLines,
}

async fn serve(store: Arc<dyn Store>, query_cases: Vec<QueryCase>, log_row_scanned: bool) -> TestServer {
    let (sink, timing) = LineSink::memory();
    let state = Arc::new(AppState {
        store,
        query_cases,
        time_zone: chrono_tz::Asia::Taipei,
        timing: sink,
        log_row_scanned,
    });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, create_router(state)).await.unwrap();
    });

    TestServer {
        base: format!("http://{addr}"),
        timing,
    }
}

/// Two rows inside every default window, with acceptance 1 and 2.
async fn seeded_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    let mut mutations = Vec::new();
    for case in default_cases() {
        for accepted in [1i64, 2] {
            mutations.push(Mutation::insert_or_update(
                USER_PARTIAL,
                &["uuid", "registerFrom", "policyAcceptance", "registerTime"],
                vec![
                    Value::Text(format!("{}-{accepted}", case.register_from)),
                    Value::Int(case.register_from),
                    Value::Int(accepted),
                    Value::Timestamp(case.start + Duration::seconds(1)),
                ],
            ));
        }
    }
    store.apply(mutations).await.unwrap();
    store
}

async fn start_test(base: &str, uuid: Option<&str>) -> reqwest::Response {
    let mut req = reqwest::Client::new().get(format!("{base}/startTest"));
    if let Some(uuid) = uuid {
        req = req.header("X-Client-Uuid", uuid);
    }
    req.send().await.unwrap()
}

#[tokio::test]
async fn successful_query_logs_one_timing_record() {
    let server = serve(seeded_store().await, default_cases(), true).await;

    let res = start_test(&server.base, Some("c0ffee00-0000-4000-8000-000000000001")).await;
    assert_eq!(res.status(), 200);
    assert!(res.headers().contains_key("x-response-time-us"));

    let summary: String = res.json().await.unwrap();
    let lines = server.timing.lines();
    assert_eq!(lines.len(), 1);

    let record: TimingRecord = serde_json::from_str(&lines[0]).unwrap();
    assert_eq!(record.uuid, "c0ffee00-0000-4000-8000-000000000001");
    assert_eq!(record.severity, Some(Severity::Warning));
    let query_us: u64 = record.api_call_response.parse().unwrap();
    let total_us: u64 = record.api_process_elapsed.parse().unwrap();
    assert!(query_us <= total_us);
    assert!(lines[0].contains(&format!(r#""api_call_response":"{query_us}""#)));
    assert!(record.request_received.ends_with("+0800 CST"));

    let expected = match record.row_scanned.as_deref() {
        Some("10w") => 5,
        Some("1w") => 1,
        Some("100") => 2,
        other => panic!("unexpected row_scanned {other:?}"),
    };
    assert_eq!(
        summary,
        format!("registerFrom: {expected}, policyAcceptance_sum: 3\n")
    );
}

#[tokio::test]
async fn empty_window_for_key_two_is_not_an_error() {
    let only_small: Vec<QueryCase> = default_cases()
        .into_iter()
        .filter(|c| c.register_from == 2)
        .collect();
    let server = serve(Arc::new(MemoryStore::new()), only_small, true).await;

    let res = start_test(&server.base, Some("empty-window")).await;
    assert_eq!(res.status(), 200);
    let summary: String = res.json().await.unwrap();
    assert_eq!(summary, "");

    let record: TimingRecord = serde_json::from_str(&server.timing.lines()[0]).unwrap();
    assert_eq!(record.row_scanned.as_deref(), Some("100"));
}

#[tokio::test]
async fn cursor_error_becomes_500_without_timing_record() {
    let store = seeded_store().await;
    store.fail_cursor_after(0);
    let server = serve(store, default_cases(), true).await;

    let res = start_test(&server.base, Some("doomed")).await;
    assert_eq!(res.status(), 500);

    let body: serde_json::Value = res.json().await.unwrap();
    let error = body["error"].as_str().unwrap();
    assert!(error.starts_with("Error:"), "{error}");
    assert!(error.contains("cursor aborted"), "{error}");
    assert!(server.timing.lines().is_empty());
}

#[tokio::test]
async fn missing_correlation_header_is_rejected() {
    let store = seeded_store().await;
    let server = serve(store, default_cases(), true).await;

    let res = start_test(&server.base, None).await;
    assert_eq!(res.status(), 400);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "missing X-Client-Uuid header");
    assert!(server.timing.lines().is_empty());
}

#[tokio::test]
async fn row_scanned_can_be_left_out() {
    let server = serve(seeded_store().await, default_cases(), false).await;

    let res = start_test(&server.base, Some("no-rows-field")).await;
    assert_eq!(res.status(), 200);

    let line = &server.timing.lines()[0];
    assert!(!line.contains("row_scanned"), "{line}");
}

#[tokio::test]
async fn concurrent_requests_each_get_their_own_record() {
    let server = serve(seeded_store().await, default_cases(), true).await;

    let mut handles = Vec::new();
    for i in 0..20 {
        let base = server.base.clone();
        handles.push(tokio::spawn(async move {
            start_test(&base, Some(&format!("req-{i}"))).await.status()
        }));
    }
    for h in handles {
        assert_eq!(h.await.unwrap(), 200);
    }

    let mut uuids: Vec<String> = server
        .timing
        .lines()
        .iter()
        .map(|l| serde_json::from_str::<TimingRecord>(l).unwrap().uuid)
        .collect();
    uuids.sort();
    uuids.dedup();
    assert_eq!(uuids.len(), 20);
}

#[tokio::test]
async fn healthz_answers_ok() {
    let server = serve(Arc::new(MemoryStore::new()), default_cases(), true).await;
    let res = reqwest::get(format!("{}/healthz", server.base)).await.unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), "ok");
}
