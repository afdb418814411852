//! HTTP API against in-memory sources.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tower::ServiceExt;

use time_fold_explorer::config::Settings;
use time_fold_explorer::http::{HttpServer, X_REQUEST_ID};
use time_fold_explorer::lifecycle::{bootstrap, Services};
use time_fold_explorer::loaders::LoaderCatalog;

mod common;

use common::{MemorySource, CONFIG_PATH};

const CONFIG: &str = r#"
[sales]
label = "**Store Sales**"
description = "Daily sales.\nOne row per day."
path = "local:///data/sales.csv"
index = "ts"
aggregations = { amount = "sum" }

[dummy]
path = "generated"
index = "ts"
loader = "gen"
loader_kwargs = { periods = 24 }
"#;

const SALES: &str = "ts,amount\n2019-05-11 00:00:00,20\n2019-05-12 00:00:00,19\n2019-05-13 00:00:00,23\n";

async fn services() -> (Services, Arc<MemorySource>) {
    let source = MemorySource::new();
    source.put(CONFIG_PATH, CONFIG);
    source.put("local:///data/sales.csv", SALES);

    let mut settings = Settings::default();
    settings.datasets.config_path = CONFIG_PATH.to_string();
    settings.datasets.require_datasets = true;

    let catalog = LoaderCatalog::builtin(source.clone());
    let services = bootstrap(settings, &catalog, source.clone()).await.unwrap();
    (services, source)
}

/// Serve on an ephemeral port; dropping the sender stops the server.
async fn spawn_server(services: &Services) -> (String, oneshot::Sender<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel::<()>();
    let server = HttpServer::new(services);
    tokio::spawn(async move {
        let _ = server
            .run(listener, async {
                let _ = rx.await;
            })
            .await;
    });
    (format!("http://{}", addr), tx)
}

fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_dataset_endpoint_over_tcp() {
    let (services, source) = services().await;
    let (base, _stop) = spawn_server(&services).await;
    let client = client();
    let reads_before = source.reads();

    let response = client
        .get(format!("{}/datasets/sales?step=2&n_splits=4&bogus=1", base))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK.as_u16());
    assert!(response.headers().contains_key(X_REQUEST_ID));

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["name"], "sales");
    assert_eq!(body["loader"], "file");
    assert_eq!(body["rows"], 3);
    assert_eq!(body["columns"], serde_json::json!(["amount"]));
    assert_eq!(body["defaults"]["n_splits"], 4);
    assert_eq!(body["params"]["discarded"], serde_json::json!(["bogus"]));

    let again: Value = client
        .get(format!("{}/datasets/sales", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(again["rows"], 3);
    assert_eq!(source.reads() - reads_before, 1, "second request served from cache");
}

#[tokio::test]
async fn test_unknown_dataset_is_404() {
    let (services, _) = services().await;
    let (base, _stop) = spawn_server(&services).await;

    let response = client()
        .get(format!("{}/datasets/missing", base))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND.as_u16());
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("missing"));
}

#[tokio::test]
async fn test_loader_failure_is_502() {
    let (services, source) = services().await;
    source.put("local:///data/sales.csv", "ts,amount\n2019-05-11,1\n2019-05-11,2\n");
    let (base, _stop) = spawn_server(&services).await;

    let response = client()
        .get(format!("{}/datasets/sales", base))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY.as_u16());
}

#[tokio::test]
async fn test_health_and_listing() {
    let (services, _) = services().await;
    let router = HttpServer::new(&services).router();

    let health = router
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(health.status(), StatusCode::OK);
    let body = axum::body::to_bytes(health.into_body(), usize::MAX).await.unwrap();
    let health: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["datasets"], 2);
    assert_eq!(health["generation"], 1);

    let listing = router
        .oneshot(Request::builder().uri("/datasets").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let body = axum::body::to_bytes(listing.into_body(), usize::MAX).await.unwrap();
    let listing: Value = serde_json::from_slice(&body).unwrap();
    let names: Vec<&str> = listing["datasets"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["sales", "dummy"], "listed in declaration order");
    assert_eq!(listing["datasets"][0]["summary"], "Daily sales.");
}

#[tokio::test]
async fn test_params_select_dataset_by_label() {
    let (services, _) = services().await;
    let router = HttpServer::new(&services).router();

    let response = router
        .oneshot(
            Request::builder()
                .uri("/params?data=store%20sales&gen_seed=7&expand_limits=false")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let params: Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(params["selected_dataset"], "sales");
    assert_eq!(params["params"]["buckets"]["gen"]["seed"], "7");
    assert_eq!(params["defaults"]["expand_limits"], false);
}

#[tokio::test]
async fn test_params_select_dataset_by_position() {
    let (services, _) = services().await;
    let router = HttpServer::new(&services).router();

    for (data, expected) in [("0", "sales"), ("1", "dummy")] {
        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/params?data={}", data))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let params: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(params["selected_dataset"], expected, "data={}", data);
    }
}
