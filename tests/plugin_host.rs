mod common;

use bento_ops::host::PluginInstance;
use bento_ops::services::concurrency::ConcurrencyLedger;
use bento_ops::services::credentials::Credentials;
use bento_ops::services::logger::Logger;
use bento_ops::services::settings::Settings;
use common::{credentials, fast_settings, ledger, MockResponse, MockServer, ENV_LOCK};
use serde_json::{json, Value};
use std::time::Duration;

fn plugin(settings: &Settings, ledger: &ConcurrencyLedger) -> PluginInstance {
    PluginInstance::new(Logger::silent("test"), settings, credentials(), ledger, None).unwrap()
}

#[tokio::test]
async fn create_subscriber_returns_success_envelope() {
    let server = MockServer::with_fallback(MockResponse::json(200, json!({"results": 1, "failed": 0}))).await;
    let ledger = ledger();
    let plugin = plugin(&fast_settings(&server.base_url()), &ledger);

    let out = plugin
        .execute(
            "create_subscriber",
            vec![json!({
                "email": " Ada@Example.com ",
                "firstName": "Ada",
                "tags": "customer, vip",
                "fields": {"plan": "pro"}
            })],
            false,
        )
        .await
        .unwrap();

    assert_eq!(out.len(), 1);
    assert_eq!(out[0]["success"], true);
    assert_eq!(out[0]["email"], "ada@example.com");
    assert_eq!(out[0]["apiResponse"], json!({"results": 1, "failed": 0}));

    let request = &server.requests()[0];
    assert_eq!(request.path(), "/api/v1/batch/subscribers");
    let subscriber = &request.json()["subscribers"][0];
    assert_eq!(subscriber["email"], "ada@example.com");
    assert_eq!(subscriber["first_name"], "Ada");
    assert_eq!(subscriber["tags"], "customer,vip");
    assert_eq!(subscriber["plan"], "pro");
}

#[tokio::test]
async fn upstream_failure_becomes_redacted_failure_envelope() {
    let server = MockServer::with_fallback(MockResponse::json(404, json!({"error": "no such subscriber"}))).await;
    let ledger = ledger();
    let plugin = plugin(&fast_settings(&server.base_url()), &ledger);

    let out = plugin
        .execute("get_subscriber", vec![json!({"email": "ghost@example.com"})], false)
        .await
        .unwrap();

    let envelope = &out[0];
    assert_eq!(envelope["success"], false);
    assert_eq!(envelope["errorType"], "NotFound");
    assert_eq!(envelope["error"], "The requested resource was not found.");
    assert_eq!(envelope["email"], "[REDACTED_EMAIL]");
    assert!(!envelope.to_string().contains("ghost@example.com"));
    assert_eq!(server.request_count(), 1);
}

#[tokio::test]
async fn validation_failures_never_reach_the_network() {
    let server = MockServer::start().await;
    let ledger = ledger();
    let plugin = plugin(&fast_settings(&server.base_url()), &ledger);

    let out = plugin
        .execute(
            "send_email",
            vec![json!({
                "to": "reader@example.com",
                "from": "news@example.com",
                "subject": "Hi",
                "htmlBody": "<p>Hello</p><script>steal()</script>"
            })],
            false,
        )
        .await
        .unwrap();

    assert_eq!(out[0]["success"], false);
    assert_eq!(out[0]["errorType"], "ValidationError");
    assert_eq!(server.request_count(), 0);
}

#[tokio::test]
async fn mixed_batch_keeps_input_order() {
    let server = MockServer::with_fallback(MockResponse::json(200, json!({"gender": "female"}))).await;
    let ledger = ledger();
    let plugin = plugin(&fast_settings(&server.base_url()), &ledger);

    let out = plugin
        .execute(
            "guess_gender",
            vec![json!({"name": "Grace"}), json!(42), json!({"name": ""}), json!({"name": "Ada"})],
            true,
        )
        .await
        .unwrap();

    assert_eq!(out.len(), 4);
    assert_eq!(out[0]["success"], true);
    assert_eq!(out[0]["name"], "Grace");
    assert_eq!(out[1], json!({"error": "Item 1 must be a JSON object"}));
    assert_eq!(out[2]["errorType"], "ValidationError");
    assert_eq!(out[3]["name"], "Ada");

    let mut names: Vec<Value> = server.requests().iter().map(|r| r.json()["name"].clone()).collect();
    names.sort_by_key(|v| v.to_string());
    assert_eq!(names, vec![json!("Ada"), json!("Grace")]);
}

#[tokio::test]
async fn unknown_operation_aborts_without_continue_on_fail() {
    let server = MockServer::start().await;
    let ledger = ledger();
    let plugin = plugin(&fast_settings(&server.base_url()), &ledger);

    let err = plugin
        .execute("purge_list", vec![json!({})], false)
        .await
        .unwrap_err();
    assert!(err.message.contains("Unknown plugin operation: purge_list"));

    let out = plugin.execute("purge_list", vec![json!({})], true).await.unwrap();
    assert!(out[0]["error"].as_str().unwrap().contains("purge_list"));
    assert_eq!(server.request_count(), 0);
}

#[tokio::test]
async fn schema_mismatch_is_a_host_fault() {
    let server = MockServer::start().await;
    let ledger = ledger();
    let plugin = plugin(&fast_settings(&server.base_url()), &ledger);

    let err = plugin
        .execute("track_event", vec![json!({"eventType": ["a"], "email": "a@b.co"})], false)
        .await
        .unwrap_err();
    assert_eq!(err.message, "Invalid parameters for track_event");
    assert_eq!(server.request_count(), 0);
}

#[tokio::test]
async fn instances_sharing_credentials_share_the_slot_budget() {
    let server = MockServer::with_fallback(
        MockResponse::json(200, json!({})).with_delay(Duration::from_millis(250)),
    )
    .await;
    let ledger = ledger();
    let settings = fast_settings(&server.base_url());
    let first = plugin(&settings, &ledger);
    let second = plugin(&settings, &ledger);

    let items: Vec<Value> = (0..4).map(|_| json!({})).collect();
    let (a, b) = tokio::join!(
        first.execute("get_site_stats", items.clone(), false),
        second.execute("get_site_stats", items, false),
    );

    assert!(a.unwrap().iter().all(|e| e["success"] == true));
    assert!(b.unwrap().iter().all(|e| e["success"] == true));
    assert_eq!(server.request_count(), 8);
    assert_eq!(server.peak_in_flight(), 5);
    assert_eq!(ledger.len(), 1);
}

#[tokio::test]
async fn credentials_can_come_from_the_environment() {
    let _guard = ENV_LOCK.lock().await;
    let server = MockServer::start().await;
    std::env::set_var("BENTO_PUBLISHABLE_KEY", "pk_env");
    std::env::set_var("BENTO_SECRET_KEY", "sk_env");
    std::env::set_var("BENTO_SITE_UUID", "site-env");
    let credentials = Credentials::from_env();
    std::env::remove_var("BENTO_PUBLISHABLE_KEY");
    std::env::remove_var("BENTO_SECRET_KEY");
    std::env::remove_var("BENTO_SITE_UUID");

    let ledger = ledger();
    let plugin = PluginInstance::new(
        Logger::silent("test"),
        &fast_settings(&server.base_url()),
        credentials,
        &ledger,
        Some("env-instance"),
    )
    .unwrap();
    let out = plugin
        .execute("geolocate_ip", vec![json!({"ip": "203.0.113.9"})], false)
        .await
        .unwrap();

    assert_eq!(out[0]["success"], true);
    let request = &server.requests()[0];
    assert_eq!(request.query("site_uuid").as_deref(), Some("site-env"));
    assert_eq!(request.query("ip").as_deref(), Some("203.0.113.9"));
    assert_eq!(ledger.gate_for("env-instance").limit(), 5);
}
