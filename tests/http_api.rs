//! End-to-end tests over a real listener.

use flashpaste::config::Config;
use flashpaste::StoreConfig;
use reqwest::StatusCode;
use serde_json::{json, Value};
use tokio::net::TcpListener;

const T0: u64 = 1_704_067_200_000;

async fn spawn_app(config: Config) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = flashpaste::app(&config);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn test_config() -> Config {
    Config {
        test_mode: true,
        ..Config::default()
    }
}

async fn create(client: &reqwest::Client, base: &str, body: Value) -> String {
    let res = client
        .post(format!("{}/api/pastes", base))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: Value = res.json().await.unwrap();
    body["id"].as_str().unwrap().to_string()
}

async fn read_at(client: &reqwest::Client, base: &str, id: &str, now_ms: u64) -> reqwest::Response {
    client
        .get(format!("{}/api/pastes/{}", base, id))
        .header("x-test-now-ms", now_ms.to_string())
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_healthz() {
    let base = spawn_app(test_config()).await;
    let res = reqwest::get(format!("{}/healthz", base)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.json::<Value>().await.unwrap(), json!({ "ok": true }));
}

#[tokio::test]
async fn test_create_returns_id_and_url() {
    let base = spawn_app(test_config()).await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/api/pastes", base))
        .json(&json!({ "content": "hello" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);

    let body: Value = res.json().await.unwrap();
    let id = body["id"].as_str().unwrap();
    let url = body["url"].as_str().unwrap();
    assert!(!id.is_empty());
    assert!(url.starts_with("https://127.0.0.1:"));
    assert!(url.ends_with(&format!("/p/{}", id)));
}

#[tokio::test]
async fn test_public_url_and_forwarded_proto() {
    let base = spawn_app(Config {
        public_url: Some("https://paste.example".into()),
        ..test_config()
    })
    .await;
    let client = reqwest::Client::new();
    let body: Value = client
        .post(format!("{}/api/pastes", base))
        .json(&json!({ "content": "x" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(
        body["url"],
        format!("https://paste.example/p/{}", body["id"].as_str().unwrap())
    );

    let base = spawn_app(test_config()).await;
    let body: Value = client
        .post(format!("{}/api/pastes", base))
        .header("x-forwarded-proto", "http")
        .json(&json!({ "content": "x" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(body["url"].as_str().unwrap().starts_with("http://"));
}

#[tokio::test]
async fn test_unlimited_paste_reads_forever() {
    let base = spawn_app(test_config()).await;
    let client = reqwest::Client::new();
    let id = create(&client, &base, json!({ "content": "  keep me  " })).await;

    for now in [T0, T0 * 2] {
        let res = read_at(&client, &base, &id, now).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(
            res.json::<Value>().await.unwrap(),
            json!({ "content": "keep me", "remaining_views": null, "expires_at": null })
        );
    }
}

#[tokio::test]
async fn test_validation_errors() {
    let base = spawn_app(test_config()).await;
    let client = reqwest::Client::new();

    let cases: Vec<(String, &str)> = vec![
        ("{not json".into(), "Invalid JSON"),
        ("[1,2]".into(), "Missing or invalid body"),
        ("{}".into(), "Missing or invalid body"),
        (
            json!({ "content": "   " }).to_string(),
            "content is required and must be a non-empty string",
        ),
        (
            json!({ "content": 42 }).to_string(),
            "content is required and must be a non-empty string",
        ),
        (
            json!({ "content": "x", "ttl_seconds": 0 }).to_string(),
            "ttl_seconds must be an integer >= 1",
        ),
        (
            json!({ "content": "x", "ttl_seconds": 1.5 }).to_string(),
            "ttl_seconds must be an integer >= 1",
        ),
        (
            json!({ "content": "x", "max_views": -1 }).to_string(),
            "max_views must be an integer >= 1",
        ),
        (
            json!({ "content": "x", "max_views": "3" }).to_string(),
            "max_views must be an integer >= 1",
        ),
        (
            json!({ "content": "x".repeat(512 * 1024 + 1) }).to_string(),
            "content must be at most 512 KB",
        ),
    ];

    for (body, message) in cases {
        let res = client
            .post(format!("{}/api/pastes", base))
            .header("content-type", "application/json")
            .body(body.clone())
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST, "body: {:.40}", body);
        assert_eq!(res.json::<Value>().await.unwrap(), json!({ "error": message }));
    }
}

#[tokio::test]
async fn test_body_over_router_limit_is_a_validation_error() {
    let base = spawn_app(test_config()).await;
    let client = reqwest::Client::new();
    let body = json!({ "content": "x".repeat(9 * 1024 * 1024) }).to_string();

    let res = client
        .post(format!("{}/api/pastes", base))
        .header("content-type", "application/json")
        .body(body)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        res.json::<Value>().await.unwrap(),
        json!({ "error": "content must be at most 512 KB" })
    );
}

#[tokio::test]
async fn test_huge_ttl_is_accepted() {
    let base = spawn_app(Config::default()).await;
    let client = reqwest::Client::new();
    let id = create(
        &client,
        &base,
        json!({ "content": "x", "ttl_seconds": 10_000_000_000_000_000_000u64 }),
    )
    .await;

    let res = client
        .get(format!("{}/api/pastes/{}", base, id))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["content"], "x");
    assert!(body["expires_at"].is_string());
}

#[tokio::test]
async fn test_content_at_limit_is_accepted() {
    let base = spawn_app(test_config()).await;
    let client = reqwest::Client::new();
    let content = "x".repeat(512 * 1024);
    let id = create(&client, &base, json!({ "content": content })).await;

    let body: Value = read_at(&client, &base, &id, T0).await.json().await.unwrap();
    assert_eq!(body["content"].as_str().unwrap().len(), 512 * 1024);
}

#[tokio::test]
async fn test_ttl_expiry_with_test_clock() {
    let base = spawn_app(test_config()).await;
    let client = reqwest::Client::new();
    let id = create(&client, &base, json!({ "content": "brief", "ttl_seconds": 60 })).await;

    // Creation uses the real clock, so probe relative to the reported expiry.
    let res = read_at(&client, &base, &id, T0).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    let expires_at = body["expires_at"].as_str().unwrap().to_string();
    assert!(expires_at.ends_with('Z'));

    let expiry_ms = chrono::DateTime::parse_from_rfc3339(&expires_at)
        .unwrap()
        .timestamp_millis() as u64;

    assert_eq!(
        read_at(&client, &base, &id, expiry_ms - 1).await.status(),
        StatusCode::OK
    );
    let res = read_at(&client, &base, &id, expiry_ms).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        res.json::<Value>().await.unwrap(),
        json!({ "error": "Paste not found" })
    );
}

#[tokio::test]
async fn test_clock_header_ignored_outside_test_mode() {
    let base = spawn_app(Config::default()).await;
    let client = reqwest::Client::new();
    let id = create(&client, &base, json!({ "content": "x", "ttl_seconds": 60 })).await;

    let far_future = T0 * 10;
    assert_eq!(
        read_at(&client, &base, &id, far_future).await.status(),
        StatusCode::OK
    );
}

#[tokio::test]
async fn test_view_limit() {
    let base = spawn_app(test_config()).await;
    let client = reqwest::Client::new();
    let id = create(&client, &base, json!({ "content": "twice", "max_views": 2 })).await;

    let first: Value = read_at(&client, &base, &id, T0).await.json().await.unwrap();
    assert_eq!(first["remaining_views"], 1);
    let second: Value = read_at(&client, &base, &id, T0).await.json().await.unwrap();
    assert_eq!(second["remaining_views"], 0);

    let third = read_at(&client, &base, &id, T0).await;
    assert_eq!(third.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_not_found_shapes_are_identical() {
    let base = spawn_app(test_config()).await;
    let client = reqwest::Client::new();

    let exhausted = create(&client, &base, json!({ "content": "x", "max_views": 1 })).await;
    read_at(&client, &base, &exhausted, T0).await;
    let expired = create(&client, &base, json!({ "content": "x", "ttl_seconds": 1 })).await;

    let mut bodies = Vec::new();
    for id in [exhausted.as_str(), expired.as_str(), "never-existed"] {
        let res = read_at(&client, &base, id, T0 * 10).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        bodies.push(res.text().await.unwrap());
    }
    assert!(bodies.windows(2).all(|pair| pair[0] == pair[1]));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_reads_respect_limit() {
    let base = spawn_app(test_config()).await;
    let client = reqwest::Client::new();
    let id = create(&client, &base, json!({ "content": "race", "max_views": 3 })).await;

    let tasks: Vec<_> = (0..20)
        .map(|_| {
            let client = client.clone();
            let base = base.clone();
            let id = id.clone();
            tokio::spawn(async move { read_at(&client, &base, &id, T0).await.status() })
        })
        .collect();

    let mut ok = 0;
    for task in tasks {
        if task.await.unwrap() == StatusCode::OK {
            ok += 1;
        }
    }
    assert_eq!(ok, 3);
}

#[tokio::test]
async fn test_html_page_escapes_and_consumes_view() {
    let base = spawn_app(test_config()).await;
    let client = reqwest::Client::new();
    let id = create(
        &client,
        &base,
        json!({ "content": "<b>bold</b> & more", "max_views": 2 }),
    )
    .await;

    let res = client.get(format!("{}/p/{}", base, id)).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("text/html"));
    let html = res.text().await.unwrap();
    assert!(html.contains("&lt;b&gt;bold&lt;"));
    assert!(!html.contains("<b>bold</b>"));

    // The page took one view, the API takes the last.
    let body: Value = read_at(&client, &base, &id, T0).await.json().await.unwrap();
    assert_eq!(body["remaining_views"], 0);

    let res = client.get(format!("{}/p/{}", base, id)).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert!(res.text().await.unwrap().contains("Paste not found"));
}

#[tokio::test]
async fn test_html_page_honours_test_clock() {
    let base = spawn_app(test_config()).await;
    let client = reqwest::Client::new();
    let id = create(&client, &base, json!({ "content": "x", "ttl_seconds": 5 })).await;

    let res = client
        .get(format!("{}/p/{}", base, id))
        .header("x-test-now-ms", (T0 * 10).to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_index_page() {
    let base = spawn_app(test_config()).await;
    let res = reqwest::get(format!("{}/", base)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let html = res.text().await.unwrap();
    assert!(html.contains("<form"));
    assert!(html.contains("/api/pastes"));
}

#[tokio::test]
async fn test_unconfigured_store() {
    let base = spawn_app(Config {
        store: StoreConfig::Unconfigured,
        ..test_config()
    })
    .await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/api/pastes", base))
        .json(&json!({ "content": "x" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(
        res.json::<Value>().await.unwrap(),
        json!({ "error": "Storage unavailable" })
    );

    // Validation still runs first.
    let res = client
        .post(format!("{}/api/pastes", base))
        .json(&json!({ "content": "" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    assert_eq!(
        read_at(&client, &base, "anything", T0).await.status(),
        StatusCode::NOT_FOUND
    );

    let res = reqwest::get(format!("{}/healthz", base)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.json::<Value>().await.unwrap(), json!({ "ok": false }));
}
