//! HTTP tests against a server bound to an ephemeral port.

use std::time::Duration;

use database::models::{OrderRow, Restaurant};
use database::{order, restaurant, Database};
use print_core::{ChangeOp, RelayEvent};
use print_server::{app, AppState};
use relay::Relay;
use reqwest::StatusCode;
use serde_json::{json, Value};

struct TestServer {
    base_url: String,
    state: AppState,
    http: reqwest::Client,
}

impl TestServer {
    async fn start() -> Self {
        let db = Database::connect_with_pool_size("sqlite::memory:", 1).await.unwrap();
        db.migrate().await.unwrap();
        let state = AppState::new(db, Relay::default());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let router = app(state.clone());
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self {
            base_url: format!("http://{}", addr),
            state,
            http: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn seed_restaurant(&self, id: &str) {
        let r = Restaurant {
            id: id.to_string(),
            name: "Cantina Central".to_string(),
            phone: Some("11 5555-0000".to_string()),
            address: None,
            cnpj: None,
            logo_url: None,
        };
        restaurant::create_restaurant(self.state.db.pool(), &r).await.unwrap();
    }

    async fn seed_order(&self, restaurant_id: &str, id: &str, order_type: &str) {
        let row = OrderRow {
            id: id.to_string(),
            restaurant_id: restaurant_id.to_string(),
            order_number: Some(17),
            order_type: Some(order_type.to_string()),
            customer_name: Some("Ana".to_string()),
            total: Some(30.0),
            notes: None,
            delivery_address: None,
            delivery_phone: None,
            delivery_fee: None,
            table_number: None,
            waiter_name: None,
            print_status: "none".to_string(),
            print_event: None,
            printed_at: None,
            print_count: 0,
            created_at: 1_000,
        };
        order::create_order(self.state.db.pool(), &row, &[]).await.unwrap();
    }

    async fn post(&self, path: &str, body: Value) -> (StatusCode, Value) {
        let response = self.http.post(self.url(path)).json(&body).send().await.unwrap();
        let status = response.status();
        (status, response.json().await.unwrap_or(Value::Null))
    }

    async fn get(&self, path: &str) -> (StatusCode, Value) {
        let response = self.http.get(self.url(path)).send().await.unwrap();
        let status = response.status();
        (status, response.json().await.unwrap_or(Value::Null))
    }
}

async fn next_event(subscription: &mut relay::Subscription) -> Option<RelayEvent> {
    tokio::time::timeout(Duration::from_secs(1), subscription.recv())
        .await
        .ok()
        .flatten()
}

#[tokio::test]
async fn test_health() {
    let server = TestServer::start().await;
    let (status, body) = server.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_heartbeat_validation_and_unknown_restaurant() {
    let server = TestServer::start().await;

    let (status, body) = server
        .post("/api/printer-heartbeat", json!({ "restaurant_id": "r1" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "restaurant_id and client_id are required");

    let (status, body) = server
        .post("/api/printer-heartbeat", json!({ "restaurant_id": "nope", "client_id": "c1" }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Restaurant not found");

    let (status, body) = server.get("/api/printer-heartbeat").await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body["error"], "Method not allowed");
}

#[tokio::test]
async fn test_heartbeat_is_stored_and_published() {
    let server = TestServer::start().await;
    server.seed_restaurant("r1").await;
    let mut subscription = server.state.relay.subscribe("r1").unwrap();

    let (status, body) = server
        .post(
            "/api/printer-heartbeat",
            json!({
                "restaurant_id": "r1",
                "client_id": "c1",
                "client_name": "Caixa",
                "printers_count": 2,
                "pending_orders": 1
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["heartbeat"]["client_name"], "Caixa");
    assert_eq!(body["heartbeat"]["printers_count"], 2);

    match next_event(&mut subscription).await {
        Some(RelayEvent::HeartbeatChanged { op, heartbeat }) => {
            assert_eq!(op, ChangeOp::Insert);
            assert_eq!(heartbeat.client_id, "c1");
        }
        other => panic!("unexpected event: {:?}", other),
    }

    tokio::time::sleep(Duration::from_millis(5)).await;
    server
        .post("/api/printer-heartbeat", json!({ "restaurant_id": "r1", "client_id": "c1" }))
        .await;
    match next_event(&mut subscription).await {
        Some(RelayEvent::HeartbeatChanged { op, .. }) => assert_eq!(op, ChangeOp::Update),
        other => panic!("unexpected event: {:?}", other),
    }

    let (status, body) = server.get("/api/heartbeats?restaurant_id=r1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"]["is_connected"], true);
    assert_eq!(body["agents"].as_array().map(Vec::len), Some(1));
    assert_eq!(body["heartbeats"][0]["client_name"], "Print Agent");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_heartbeats_publish_in_commit_order() {
    let server = TestServer::start().await;
    server.seed_restaurant("r1").await;
    let mut subscription = server.state.relay.subscribe("r1").unwrap();

    let mut tasks = Vec::new();
    for pending in 0..24u32 {
        let http = server.http.clone();
        let url = server.url("/api/printer-heartbeat");
        tasks.push(tokio::spawn(async move {
            http.post(url)
                .json(&json!({ "restaurant_id": "r1", "client_id": "c1", "pending_orders": pending }))
                .send()
                .await
                .unwrap()
                .status()
        }));
    }
    for task in tasks {
        assert_eq!(task.await.unwrap(), StatusCode::OK);
    }

    let mut events = Vec::new();
    while let Some(event) = next_event(&mut subscription).await {
        match event {
            RelayEvent::HeartbeatChanged { heartbeat, .. } => events.push(heartbeat),
            other => panic!("unexpected event: {:?}", other),
        }
        if events.len() == 24 {
            break;
        }
    }
    assert_eq!(events.len(), 24);
    for pair in events.windows(2) {
        assert!(pair[0].last_heartbeat_at <= pair[1].last_heartbeat_at);
    }

    let (_, body) = server.get("/api/heartbeats?restaurant_id=r1").await;
    let stored = body["heartbeats"][0]["pending_orders"].as_u64().unwrap();
    let last = events.last().unwrap();
    assert_eq!(last.pending_orders.map(u64::from), Some(stored));
}

#[tokio::test]
async fn test_heartbeat_list_requires_known_restaurant() {
    let server = TestServer::start().await;

    let (status, _) = server.get("/api/heartbeats").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = server.get("/api/heartbeats?restaurant_id=nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_print_config() {
    let server = TestServer::start().await;
    server.seed_restaurant("r1").await;

    let (status, _) = server.get("/api/printer-config").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = server.get("/api/printer-config?restaurant_id=nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = server.get("/api/printer-config?restaurant_id=r1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["restaurant"]["name"], "Cantina Central");
    assert_eq!(body["settings"]["showAddress"], true);
    assert_eq!(body["settings"]["showCnpj"], false);
    assert_eq!(body["printers"], json!([]));
}

#[tokio::test]
async fn test_printer_sync_feeds_print_config() {
    let server = TestServer::start().await;
    server.seed_restaurant("r1").await;

    let (status, body) = server
        .post("/api/printer-sync", json!({ "restaurant_id": "r1", "client_id": "" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "client_id is required");

    let (status, _) = server
        .post("/api/printer-sync", json!({ "restaurant_id": "nope", "client_id": "c1" }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = server
        .post(
            "/api/printer-sync",
            json!({
                "restaurant_id": "r1",
                "client_id": "c1",
                "printers": [
                    { "name": "POS-80", "display_name": "Caixa", "is_default": true },
                    { "name": "Kitchen_ESC" }
                ]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": true, "synced": 2, "registered": 2 }));

    let (_, config) = server.get("/api/printer-config?restaurant_id=r1").await;
    let printers = config["printers"].as_array().unwrap();
    assert_eq!(printers.len(), 2);
    assert_eq!(printers[0]["name"], "Caixa");
    assert_eq!(printers[0]["printer_name"], "POS-80");
    assert_eq!(printers[0]["paper_width"], 48);
    assert_eq!(printers[0]["linked_order_types"], json!(["counter", "table", "delivery"]));

    let (status, body) = server.get("/api/printer-sync?restaurant_id=r1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["printers"].as_array().map(Vec::len), Some(2));
    assert_eq!(body["available"][0]["printer_name"], "Kitchen_ESC");
    assert_eq!(body["available"][1]["is_default"], true);
    assert_eq!(body["available"][1]["client_id"], "c1");

    let (status, _) = server.get("/api/printer-sync?restaurant_id=nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_print_queue_flow() {
    let server = TestServer::start().await;
    server.seed_restaurant("r1").await;
    server.seed_order("r1", "o1", "table").await;
    let mut subscription = server.state.relay.subscribe("r1").unwrap();

    let (status, body) = server
        .post(
            "/api/print-intents",
            json!({ "restaurant_id": "r1", "order_id": "o1", "event_type": "print" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["dispatched"], true);

    let (status, body) = server.get("/api/print-orders?restaurant_id=r1&action=get").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    assert_eq!(body["orders"][0]["id"], "o1");

    let (status, body) = server
        .post(
            "/api/print-orders?restaurant_id=r1&action=mark-printed",
            json!({ "order_ids": ["o1"] }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["marked"], 1);

    match next_event(&mut subscription).await {
        Some(RelayEvent::OrderPrinted { order_id, order_number, .. }) => {
            assert_eq!(order_id, "o1");
            assert_eq!(order_number, Some(17));
        }
        other => panic!("unexpected event: {:?}", other),
    }

    let (_, body) = server.get("/api/print-orders?restaurant_id=r1").await;
    assert_eq!(body["count"], 0);

    let (status, _) = server
        .post(
            "/api/print-orders?restaurant_id=r1&action=reprint",
            json!({ "order_id": "o1" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = server.get("/api/print-orders?restaurant_id=r1").await;
    assert_eq!(body["orders"][0]["print_event"], "reprint");

    let (status, body) = server
        .post("/api/print-orders?restaurant_id=r1&action=clear-pending", json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cleared"], 1);
}

#[tokio::test]
async fn test_print_queue_bad_requests() {
    let server = TestServer::start().await;
    server.seed_restaurant("r1").await;

    let (status, body) = server.get("/api/print-orders").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "restaurant_id is required");

    let (status, body) = server.get("/api/print-orders?restaurant_id=r1&action=bogus").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid action");

    let (status, _) = server
        .post("/api/print-orders?restaurant_id=r1&action=get", json!({}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = server
        .post(
            "/api/print-orders?restaurant_id=r1&action=mark-printed",
            json!({ "order_ids": [] }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "order_ids array is required");

    let (status, _) = server
        .post(
            "/api/print-orders?restaurant_id=r1&action=reprint",
            json!({ "order_id": "missing" }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_auto_print_follows_settings() {
    let server = TestServer::start().await;
    server.seed_restaurant("r1").await;
    server.seed_order("r1", "table-order", "table").await;
    server.seed_order("r1", "counter-order", "counter").await;

    let (status, body) = server.get("/api/print-settings?restaurant_id=r1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["auto_print_table"], true);

    let response = server
        .http
        .put(server.url("/api/print-settings"))
        .json(&json!({ "restaurant_id": "r1", "auto_print_table": false }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["auto_print_table"], false);
    assert_eq!(body["auto_print_counter"], true);

    let (_, body) = server
        .post(
            "/api/print-intents",
            json!({ "restaurant_id": "r1", "order_id": "table-order", "event_type": "auto_print" }),
        )
        .await;
    assert_eq!(body["dispatched"], false);

    let (_, body) = server
        .post(
            "/api/print-intents",
            json!({ "restaurant_id": "r1", "order_id": "counter-order", "event_type": "auto_print" }),
        )
        .await;
    assert_eq!(body["dispatched"], true);

    // An explicit print ignores the auto-print switch.
    let (_, body) = server
        .post(
            "/api/print-intents",
            json!({ "restaurant_id": "r1", "order_id": "table-order", "event_type": "print" }),
        )
        .await;
    assert_eq!(body["dispatched"], true);

    let (_, body) = server.get("/api/print-orders?restaurant_id=r1").await;
    assert_eq!(body["count"], 2);
}

#[tokio::test]
async fn test_print_logs() {
    let server = TestServer::start().await;
    server.seed_restaurant("r1").await;

    let (status, body) = server
        .post(
            "/api/print-logs",
            json!({
                "restaurant_id": "r1",
                "order_id": "o1",
                "order_number": "17",
                "printer_name": "EPSON",
                "items_count": 3,
                "status": "error",
                "error_message": "paper out",
                "event_type": "auto_print"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "error");
    assert!(body["id"].as_i64().is_some());

    let (status, _) = server
        .post(
            "/api/print-logs",
            json!({ "restaurant_id": "r1", "order_id": "o1", "status": "maybe" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = server.get("/api/print-logs?restaurant_id=r1&limit=10").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["logs"].as_array().map(Vec::len), Some(1));
    assert_eq!(body["logs"][0]["error_message"], "paper out");

    let (status, _) = server.get("/api/print-logs?restaurant_id=r1&limit=0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
