//! HTTP handler tests, called directly without a listener.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::fs;
use std::sync::Arc;

use axum::{
    extract::State,
    http::{header::CONTENT_TYPE, StatusCode},
    response::{IntoResponse, Response},
};

use scrapeline_core::{Collector, Counter, MetricsError, MetricMap, CollectHook};
use scrapeline_exporter::{app_state::AppState, config, ops};

fn state(yaml: &str) -> AppState {
    AppState::new(config::load_from_str(yaml).unwrap()).unwrap()
}

fn plain_state() -> AppState {
    state("version: 1\nexporter:\n  process_metrics: false\n")
}

async fn body_text(resp: Response) -> String {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn root_and_health() {
    let resp = ops::root().await.into_response();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_text(resp).await, "OK\n");

    let resp = ops::healthz().await.into_response();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_text(resp).await, "ok");
}

#[tokio::test]
async fn readyz_flips_when_draining() {
    let s = plain_state();
    let resp = ops::readyz(State(s.clone())).await.into_response();
    assert_eq!(resp.status(), StatusCode::OK);

    s.set_draining();
    let resp = ops::readyz(State(s.clone())).await.into_response();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body_text(resp).await, "draining");
}

#[tokio::test]
async fn metrics_renders_application_and_self_metrics() {
    let s = plain_state();
    let jobs = Counter::new("jobs_total", "Jobs processed.", &["queue"]).unwrap();
    s.registry().register_metric(Arc::clone(jobs.metric())).unwrap();
    jobs.add(3.0, &["mail"]).unwrap();

    let resp = ops::metrics(State(s.clone())).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers().get(CONTENT_TYPE).unwrap(),
        ops::METRICS_CONTENT_TYPE
    );
    let text = body_text(resp).await;
    assert!(text.contains("# TYPE jobs_total counter\njobs_total{queue=\"mail\"} 3.000000\n"));
    assert!(text.contains("# TYPE scrapeline_scrapes_total counter\n"));
    assert!(!text.contains("process_max_fds"));

    // the first scrape is counted by the second
    let text = body_text(ops::metrics(State(s.clone())).await).await;
    assert!(text.contains("scrapeline_scrapes_total{outcome=\"ok\"} 1.000000\n"));
}

struct Broken;

impl CollectHook for Broken {
    fn collect<'a>(&self, _: &'a MetricMap) -> scrapeline_core::Result<&'a MetricMap> {
        Err(MetricsError::Collect("backend down".into()))
    }
}

#[tokio::test]
async fn render_failure_is_500_with_empty_body() {
    let s = plain_state();
    let live = s.registry().registry().unwrap();
    live.register_collector(Arc::new(Collector::with_hook("broken", Broken)))
        .unwrap();

    let resp = ops::metrics(State(s.clone())).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_text(resp).await, "");

    live.unregister_collector("broken").unwrap();
    let text = body_text(ops::metrics(State(s.clone())).await).await;
    assert!(text.contains("scrapeline_scrapes_total{outcome=\"error\"} 1.000000\n"));
}

#[tokio::test]
async fn metrics_after_shutdown_is_500() {
    let s = plain_state();
    s.shutdown().unwrap();
    let resp = ops::metrics(State(s)).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn process_collector_reads_configured_files() {
    let dir = std::env::temp_dir().join(format!("scrapeline-ops-{}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(dir.join("fd")).unwrap();
    fs::write(dir.join("fd").join("0"), "").unwrap();
    fs::write(
        dir.join("limits"),
        "Limit                     Soft Limit           Hard Limit           Units\n\
         Max open files            2048                 4096                 files\n\
         Max address space         unlimited            unlimited            bytes\n",
    )
    .unwrap();

    let p = |name: &str| dir.join(name).to_string_lossy().into_owned();
    let yaml = format!(
        "version: 1\nprocess:\n  limits_path: \"{}\"\n  stat_path: \"{}\"\n  fd_dir: \"{}\"\n  boot_stat_path: \"{}\"\n",
        p("limits"),
        p("missing_stat"),
        p("fd"),
        p("missing_boot"),
    );
    let s = state(&yaml);

    let text = body_text(ops::metrics(State(s.clone())).await).await;
    assert!(text.contains("process_max_fds 2048.000000\n"));
    assert!(text.contains("process_virtual_memory_max_bytes -1.000000\n"));
    assert!(text.contains("process_open_fds 1.000000\n"));
    assert!(text.contains("# TYPE process_cpu_seconds_total gauge\n"));
    let _ = fs::remove_dir_all(&dir);
}
