use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use billing_core::{async_trait, BillingError, CostLineItem, CostReport, CostSource};
use billing_exporter::{router, static_registry, AppState};
use billing_metrics::{BillingCollector, MetricSelection};
use http_body_util::BodyExt;
use std::sync::Arc;
use tower::util::ServiceExt;

struct FixedSource {
    fail: bool,
}

#[async_trait]
impl CostSource for FixedSource {
    async fn fetch(&self, _metrics: &[String]) -> billing_core::Result<CostReport> {
        if self.fail {
            return Err(BillingError::Service {
                status: 403,
                code: "AccessDeniedException".to_string(),
                message: "not authorized".to_string(),
            });
        }

        Ok(CostReport::single_bucket([
            ("BlendedCost", CostLineItem::new("12.34", "USD")),
            ("UsageQuantity", CostLineItem::new("100", "N/A")),
        ]))
    }
}

fn build_app(filter: &str, fail: bool, telemetry_path: &str) -> axum::Router {
    let collector = BillingCollector::new(
        MetricSelection::parse(filter).expect("selection"),
        Arc::new(FixedSource { fail }),
    )
    .expect("collector");
    let registry = static_registry("0.0.0-test").expect("registry");
    let state = AppState::new(Arc::new(collector), registry, telemetry_path).expect("state");
    router(state)
}

async fn get(app: axum::Router, uri: &str) -> (StatusCode, String, String) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).expect("request"))
        .await
        .expect("response");

    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("")
        .to_string();
    let body = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();

    (status, content_type, String::from_utf8_lossy(&body).to_string())
}

#[tokio::test]
async fn serves_landing_page() {
    let app = build_app("", false, "/metrics");

    let (status, content_type, body) = get(app, "/").await;

    assert_eq!(status, StatusCode::OK);
    assert!(content_type.contains("text/html"));
    assert!(body.contains("<title>AWS Billing Exporter</title>"));
    assert!(body.contains("<a href='/metrics'>Metrics</a>"));
}

#[tokio::test]
async fn serves_billing_metrics() {
    let app = build_app("2", false, "/metrics");

    let (status, content_type, body) = get(app, "/metrics").await;

    assert_eq!(status, StatusCode::OK);
    assert!(content_type.starts_with("text/plain; version=0.0.4"));
    assert!(body.contains(r#"aws_billing_server_blended_cost{type="BlendedCost",unit="USD"} 12.34"#));
    assert!(!body.contains("aws_billing_server_usage_quantity"));
    assert!(body.contains("aws_billing_up 1"));
    assert!(body.contains("# HELP aws_billing_up Was the last scrape of aws billing successful."));
    assert!(body.contains("aws_billing_exporter_total_scrapes 1"));
    assert!(body.lines().any(|line| line.starts_with("aws_billing_exporter_build_info{")
        && line.contains(r#"version="0.0.0-test""#)
        && line.contains("revision=")
        && line.ends_with(" 1")));
}

#[tokio::test]
async fn reports_down_when_billing_api_fails() {
    let app = build_app("", true, "/metrics");

    let (status, _, body) = get(app, "/metrics").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("aws_billing_up 0"));
    assert!(body.contains("aws_billing_exporter_total_scrapes 1"));
    assert!(!body.contains("aws_billing_server_"));
}

#[tokio::test]
async fn counts_each_scrape() {
    let app = build_app("", false, "/metrics");

    let (_, _, first) = get(app.clone(), "/metrics").await;
    let (_, _, second) = get(app, "/metrics").await;

    assert!(first.contains("aws_billing_exporter_total_scrapes 1"));
    assert!(second.contains("aws_billing_exporter_total_scrapes 2"));
    assert!(second.contains(r#"aws_billing_server_usage_quantity{type="UsageQuantity",unit="N/A"} 100"#));
}

#[tokio::test]
async fn honours_custom_telemetry_path() {
    let app = build_app("", false, "/billing");

    let (status, _, body) = get(app.clone(), "/billing").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("aws_billing_up 1"));

    let (status, _, _) = get(app.clone(), "/metrics").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, _, landing) = get(app, "/").await;
    assert!(landing.contains("<a href='/billing'>Metrics</a>"));
}
