// Copyright 2026 Shoplens Contributors
// SPDX-License-Identifier: Apache-2.0

//! End-to-end searches against mocked storefront feeds and image CDNs.

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use serde_json::json;
use shoplens_runtime::acquisition::fakestore::FakeStoreClient;
use shoplens_runtime::acquisition::http_client::HttpClient;
use shoplens_runtime::progress::ProgressTracker;
use shoplens_runtime::renderer::NoopRenderer;
use shoplens_runtime::retry::RetryPolicy;
use shoplens_runtime::target::Target;
use shoplens_runtime::{
    CrawlError, CrawlStrategy, Orchestrator, RuntimeConfig, SearchEngine, SearchError,
    SearchRequest,
};
use shoplens_vision::HistogramModel;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn png(rgb: [u8; 3]) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(48, 48, Rgb(rgb)));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

fn config() -> RuntimeConfig {
    RuntimeConfig {
        retry: RetryPolicy::new(3, Duration::ZERO),
        catalog_timeout_ms: 5_000,
        ..RuntimeConfig::default()
    }
}

fn engine(config: &RuntimeConfig, image_timeout_ms: u64) -> SearchEngine {
    let orchestrator = Orchestrator::with_defaults(config, Arc::new(NoopRenderer));
    SearchEngine::new(
        Arc::new(orchestrator),
        Box::new(HistogramModel::new()),
        Arc::new(HttpClient::new(image_timeout_ms)),
        config,
    )
}

async fn mount_image(server: &MockServer, route: &str, body: Vec<u8>) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/png")
                .set_body_bytes(body),
        )
        .mount(server)
        .await;
}

fn shirts_feed(server: &MockServer) -> serde_json::Value {
    json!({
        "products": [
            {
                "title": "Blue Shirt",
                "handle": "blue-shirt",
                "variants": [{"price": "12.00"}],
                "images": [{"src": format!("{}/img/blue.png", server.uri())}]
            },
            {
                "title": "Red Shirt",
                "handle": "red-shirt",
                "variants": [{"price": "10.00"}],
                "images": [{"src": format!("{}/img/red.png", server.uri())}]
            }
        ]
    })
}

#[tokio::test]
async fn test_shopify_search_ranks_closest_image_first() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/collections/shirts/products.json"))
        .and(query_param("limit", "50"))
        .respond_with(ResponseTemplate::new(200).set_body_json(shirts_feed(&server)))
        .expect(1)
        .mount(&server)
        .await;
    mount_image(&server, "/img/red.png", png([220, 20, 20])).await;
    mount_image(&server, "/img/blue.png", png([20, 20, 220])).await;

    let cfg = config();
    let engine = engine(&cfg, 5_000);
    let tracker = ProgressTracker::new();
    let request = SearchRequest::new(
        png([235, 15, 15]),
        format!("{}/collections/shirts", server.uri()),
    )
    .top_x(2);

    let response = engine.search(&request, &tracker).await.unwrap();

    let names: Vec<_> = response
        .results
        .iter()
        .map(|m| m.product.name.as_str())
        .collect();
    assert_eq!(names, vec!["Red Shirt", "Blue Shirt"]);
    assert_eq!(response.matches_returned, 2);
    assert_eq!(response.total_products_searched, 2);
    assert!(response.results[0].score > response.results[1].score);
    assert_eq!(response.results[0].product.price.as_deref(), Some("$10.00"));
    assert_eq!(
        response.results[0].product.link,
        format!("{}/products/red-shirt", server.uri())
    );

    let last = tracker.snapshot();
    assert!(last.done);
    assert_eq!(last.count, 2);
}

#[tokio::test]
async fn test_timed_out_image_is_skipped_after_three_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/collections/shirts/products.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(shirts_feed(&server)))
        .mount(&server)
        .await;
    mount_image(&server, "/img/red.png", png([220, 20, 20])).await;
    Mock::given(method("GET"))
        .and(path("/img/blue.png"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(png([20, 20, 220]))
                .set_delay(Duration::from_secs(2)),
        )
        .expect(3)
        .mount(&server)
        .await;

    let cfg = config();
    let engine = engine(&cfg, 150);
    let request = SearchRequest::new(
        png([235, 15, 15]),
        format!("{}/collections/shirts", server.uri()),
    );

    let response = engine.search(&request, &ProgressTracker::new()).await.unwrap();

    assert_eq!(response.matches_returned, 1);
    assert_eq!(response.products_skipped, 1);
    assert_eq!(response.results[0].product.name, "Red Shirt");
}

#[tokio::test]
async fn test_invalid_query_image_rejected_before_crawling() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"products": []})))
        .expect(0)
        .mount(&server)
        .await;

    let cfg = config();
    let engine = engine(&cfg, 1_000);
    let request = SearchRequest::new(
        b"GIF89a-truncated".to_vec(),
        format!("{}/collections/shirts", server.uri()),
    );

    let tracker = ProgressTracker::new();
    let err = engine.search(&request, &tracker).await.unwrap_err();
    assert!(matches!(err, SearchError::InvalidImage(_)));

    let last = tracker.snapshot();
    assert!(last.done);
    assert!(last.message.starts_with("Error:"));
}

#[tokio::test]
async fn test_feed_error_yields_empty_results() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/collections/shirts/products.json"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let cfg = config();
    let engine = engine(&cfg, 1_000);
    let tracker = ProgressTracker::new();
    let request = SearchRequest::new(
        png([1, 2, 3]),
        format!("{}/collections/shirts", server.uri()),
    );

    let response = engine.search(&request, &tracker).await.unwrap();
    assert!(response.results.is_empty());
    assert_eq!(response.total_products_searched, 0);
    assert!(tracker.is_done());
}

#[tokio::test]
async fn test_malformed_feed_is_a_payload_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/collections/shirts/products.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let orchestrator = Orchestrator::with_defaults(&config(), Arc::new(NoopRenderer));
    let err = orchestrator
        .try_crawl(
            &format!("{}/collections/shirts", server.uri()),
            None,
            &ProgressTracker::new(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CrawlError::Payload { .. }));
}

#[tokio::test]
async fn test_three_item_category_feed() {
    let server = MockServer::start().await;
    let items: Vec<_> = (1..=3)
        .map(|id| {
            json!({
                "id": id,
                "title": format!("Item {id}"),
                "price": 9.5 + id as f64,
                "image": format!("{}/img/{id}.jpg", server.uri())
            })
        })
        .collect();
    Mock::given(method("GET"))
        .and(path("/products/category/jewelery"))
        .respond_with(ResponseTemplate::new(200).set_body_json(items))
        .expect(1)
        .mount(&server)
        .await;

    let client = FakeStoreClient::new(HttpClient::new(5_000))
        .with_domains(vec!["127.0.0.1".to_string()]);
    let target = Target::parse(&format!("{}/products/category/jewelery", server.uri())).unwrap();
    assert!(client.matches(&target));

    let result = client
        .crawl(&target, None, &ProgressTracker::new())
        .await
        .unwrap();

    assert_eq!(result.products.len(), 3);
    assert_eq!(result.unique_count, 3);
    assert!(result.products.iter().all(|p| !p.image_url.is_empty()));
    assert_eq!(
        result.products[2].link,
        format!("{}/products/3", server.uri())
    );
}
