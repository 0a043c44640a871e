//! End-to-end agent-check tests over real TCP.

use std::io::Write;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

mod common;

#[tokio::test]
async fn thresholds_in_synchronous_mode() {
    let file = tempfile::NamedTempFile::new().unwrap();
    let path = file.path().display().to_string();

    let agent = common::start_agent(&format!(
        r#"
        [[plugins]]
        name = "queue"
        plugin = "file"
        thresholds = [ {{ up = "<7000" }}, {{ drain = ">7000" }} ]

        [plugins.params]
        file_path = "{path}"
        "#
    ))
    .await;

    std::fs::write(&path, "5000\n").unwrap();
    assert_eq!(common::read_agent_token(agent.addr).await, "up\n");

    std::fs::write(&path, "8000\n").unwrap();
    assert_eq!(common::read_agent_token(agent.addr).await, "drain\n");

    agent.coordinator.trigger().await;
    agent.handle.await.unwrap();
}

#[tokio::test]
async fn patterns_fall_back_to_default_response() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    let path = file.path().display().to_string();
    write!(file, "system healthy").unwrap();
    file.flush().unwrap();

    let agent = common::start_agent(&format!(
        r#"
        [[plugins]]
        name = "status"
        plugin = "file"
        default_response = "maint"
        patterns = [ {{ ready = ".*healthy.*" }} ]

        [plugins.params]
        file_path = "{path}"
        "#
    ))
    .await;

    assert_eq!(common::read_agent_token(agent.addr).await, "ready\n");

    std::fs::write(&path, "system degraded").unwrap();
    assert_eq!(common::read_agent_token(agent.addr).await, "maint\n");

    agent.coordinator.trigger().await;
    agent.handle.await.unwrap();
}

#[tokio::test]
async fn noop_default_sends_empty_line() {
    let agent = common::start_agent(
        r#"
        [[plugins]]
        name = "pinned"
        plugin = "static"
        default_response = "noop"
        thresholds = [ { up = "<0" } ]

        [plugins.params]
        value = 10
        "#,
    )
    .await;

    assert_eq!(common::read_agent_token(agent.addr).await, "\n");

    agent.coordinator.trigger().await;
    agent.handle.await.unwrap();
}

#[tokio::test]
async fn http_json_source_with_percentage_and_pattern() {
    let backend = common::start_programmable_backend(|| async {
        (200, r#"{"status": "ok", "msg-rate": 3500}"#.to_string())
    })
    .await;

    let agent = common::start_agent(&format!(
        r#"
        [[plugins]]
        name = "rabbit"
        plugin = "http"
        patterns_metric = "r['status']"
        patterns = [ {{ ready = "ok" }} ]
        thresholds_metric = "r['msg-rate']"
        thresholds = [ {{ pct = 7000, min_threshold_response = 5 }} ]

        [plugins.params]
        url = "http://{backend}/stats"
        is_json = true
        "#
    ))
    .await;

    assert_eq!(common::read_agent_token(agent.addr).await, "ready 50%\n");

    agent.coordinator.trigger().await;
    agent.handle.await.unwrap();
}

#[tokio::test]
async fn http_failure_keeps_previous_response() {
    let calls = Arc::new(AtomicU32::new(0));
    let c = calls.clone();
    let backend = common::start_programmable_backend(move || {
        let c = c.clone();
        async move {
            if c.fetch_add(1, Ordering::SeqCst) == 0 {
                (200, "100".to_string())
            } else {
                (503, "unavailable".to_string())
            }
        }
    })
    .await;

    let agent = common::start_agent(&format!(
        r#"
        [[plugins]]
        name = "api"
        plugin = "http"
        default_response = "down"
        thresholds = [ {{ up = "<7000" }} ]

        [plugins.params]
        url = "http://{backend}/load"
        "#
    ))
    .await;

    assert_eq!(common::read_agent_token(agent.addr).await, "up\n");
    assert_eq!(common::read_agent_token(agent.addr).await, "up\n");
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    agent.coordinator.trigger().await;
    agent.handle.await.unwrap();
}

#[tokio::test]
async fn periodic_sampling_serves_cached_state() {
    let file = tempfile::NamedTempFile::new().unwrap();
    let path = file.path().display().to_string();
    std::fs::write(&path, "5000").unwrap();

    let agent = common::start_agent(&format!(
        r#"
        [[plugins]]
        name = "queue"
        plugin = "file"
        interval = 60
        thresholds = [ {{ up = "<7000" }}, {{ drain = ">7000" }} ]

        [plugins.params]
        file_path = "{path}"
        "#
    ))
    .await;

    // Give the first cycle time to land.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(common::read_agent_token(agent.addr).await, "up\n");

    // The next cycle is a minute away, so the cached token is served.
    std::fs::write(&path, "8000").unwrap();
    assert_eq!(common::read_agent_token(agent.addr).await, "up\n");

    agent.coordinator.trigger().await;
    agent.handle.await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_checks_each_get_one_line() {
    let agent = common::start_agent(
        r#"
        [[plugins]]
        name = "pinned"
        plugin = "static"
        thresholds = [ { pct = 100 } ]

        [plugins.params]
        value = 25
        "#,
    )
    .await;

    let addr = agent.addr;
    let checks: Vec<_> = (0..50)
        .map(|_| tokio::spawn(common::read_agent_token(addr)))
        .collect();

    for check in checks {
        assert_eq!(check.await.unwrap(), "75%\n");
    }

    agent.coordinator.trigger().await;
    agent.handle.await.unwrap();
}
