//! HTTP API tests against a live server on a free port.

use serde_json::{json, Value};
use tempfile::TempDir;

use quilt_search::config::Config;
use quilt_search::{engine, migrate, server};

fn test_config_with_port(tmp: &TempDir, port: u16) -> Config {
    let db_path = tmp.path().join("data").join("quilt.sqlite");
    std::fs::create_dir_all(db_path.parent().unwrap()).unwrap();

    let config_content = format!(
        r#"[db]
path = "{}"

[embedding]
provider = "disabled"

[server]
bind = "127.0.0.1:{}"
"#,
        db_path.display(),
        port
    );
    toml::from_str(&config_content).unwrap()
}

fn find_free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

async fn wait_for_server(port: u16) {
    let client = reqwest::Client::new();
    let url = format!("http://127.0.0.1:{}/health", port);
    for _ in 0..50 {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        if let Ok(resp) = client.get(&url).send().await {
            if resp.status().is_success() {
                return;
            }
        }
    }
    panic!("Server did not become ready within 5 seconds");
}

async fn start_server() -> (TempDir, String, tokio::task::JoinHandle<()>) {
    let (tmp, _cfg, base, handle) = start_server_with_config().await;
    (tmp, base, handle)
}

async fn start_server_with_config() -> (TempDir, Config, String, tokio::task::JoinHandle<()>) {
    let port = find_free_port();
    let tmp = TempDir::new().unwrap();
    let cfg = test_config_with_port(&tmp, port);

    migrate::run_migrations(&cfg).await.unwrap();

    let server_cfg = cfg.clone();
    let handle = tokio::spawn(async move {
        server::run_server(&server_cfg).await.ok();
    });
    wait_for_server(port).await;

    (tmp, cfg, format!("http://127.0.0.1:{}", port), handle)
}

async fn add(client: &reqwest::Client, base: &str, body: Value) -> reqwest::Response {
    client
        .post(format!("{}/documents", base))
        .json(&body)
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_health() {
    let (_tmp, base, handle) = start_server().await;

    let resp = reqwest::get(format!("{}/health", base)).await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));

    handle.abort();
}

#[tokio::test]
async fn test_add_then_search() {
    let (_tmp, base, handle) = start_server().await;
    let client = reqwest::Client::new();

    let resp = add(
        &client,
        &base,
        json!({
            "content": "Machine learning is a subset of artificial intelligence.",
            "metadata": { "category": "AI" }
        }),
    )
    .await;
    assert_eq!(resp.status(), 201);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["id"], 1);

    let resp = add(
        &client,
        &base,
        json!({ "content": "Sourdough bread needs a long, slow rise." }),
    )
    .await;
    assert_eq!(resp.status(), 201);

    let resp = client
        .get(format!("{}/search", base))
        .query(&[("q", "machine learning"), ("explain", "true")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["path"], "lexical-fallback");
    assert_eq!(body["store_unavailable"], false);

    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["id"], 1);
    assert_eq!(results[0]["metadata"]["category"], "AI");
    assert!(results[0]["explain"]["tfidf"].as_f64().unwrap() > 0.0);

    handle.abort();
}

#[tokio::test]
async fn test_search_without_explain_omits_breakdown() {
    let (_tmp, base, handle) = start_server().await;
    let client = reqwest::Client::new();

    add(&client, &base, json!({ "content": "Rust borrow checker rules." })).await;

    let body: Value = client
        .get(format!("{}/search?q=borrow", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert!(results[0].get("explain").is_none());

    handle.abort();
}

#[tokio::test]
async fn test_search_blank_query_returns_empty() {
    let (_tmp, base, handle) = start_server().await;
    let client = reqwest::Client::new();

    add(&client, &base, json!({ "content": "Anything at all." })).await;

    let body: Value = client
        .get(format!("{}/search?q=", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(body["results"].as_array().unwrap().is_empty());

    handle.abort();
}

#[tokio::test]
async fn test_search_unknown_mode_is_bad_request() {
    let (_tmp, base, handle) = start_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("{}/search?q=test&mode=fuzzy", base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "bad_request");

    handle.abort();
}

#[tokio::test]
async fn test_add_rejects_bad_input() {
    let (_tmp, base, handle) = start_server().await;
    let client = reqwest::Client::new();

    let resp = add(&client, &base, json!({ "content": "  " })).await;
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "bad_request");

    let resp = add(
        &client,
        &base,
        json!({ "content": "Valid text.", "metadata": "not an object" }),
    )
    .await;
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "bad_request");

    let resp = client
        .post(format!("{}/documents", base))
        .header("content-type", "application/json")
        .body("{ not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    handle.abort();
}

#[tokio::test]
async fn test_list_and_stats() {
    let (_tmp, base, handle) = start_server().await;
    let client = reqwest::Client::new();

    for content in ["First entry.", "Second entry.", "Third entry."] {
        add(&client, &base, json!({ "content": content })).await;
    }

    let body: Value = client
        .get(format!("{}/documents?offset=1&limit=1", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let docs = body["documents"].as_array().unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0]["id"], 2);
    assert_eq!(docs[0]["has_embedding"], false);

    let body: Value = client
        .get(format!("{}/stats", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["document_count"], 3);
    assert_eq!(body["indexed_document_count"], 3);
    assert_eq!(body["indexed_with_embedding_count"], 0);

    handle.abort();
}

/// A second process writing to the same database, like `quilt add` while
/// `quilt serve` runs.
#[tokio::test]
async fn test_server_sees_documents_written_by_another_process() {
    let (_tmp, cfg, base, handle) = start_server_with_config().await;
    let client = reqwest::Client::new();

    add(&client, &base, json!({ "content": "alpha notes on migration" })).await;

    let writer = engine::open_engine(&cfg).await.unwrap();
    writer
        .add_document("zebra migration patterns zebra", None)
        .await
        .unwrap();

    let body: Value = client
        .get(format!("{}/search?q=zebra&explain=true", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["id"], 2);
    assert!(results[0]["explain"]["tfidf"].as_f64().unwrap() > 0.0);

    let body: Value = client
        .get(format!("{}/stats", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["document_count"], 2);
    assert_eq!(body["indexed_document_count"], 2);

    handle.abort();
}

#[tokio::test]
async fn test_reindex_route() {
    let (_tmp, cfg, base, handle) = start_server_with_config().await;
    let client = reqwest::Client::new();

    let writer = engine::open_engine(&cfg).await.unwrap();
    writer.add_document("written behind the server", None).await.unwrap();

    let resp = client
        .post(format!("{}/reindex", base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["documents"], 1);

    handle.abort();
}
