//! Client tests against a live service bound to an ephemeral port.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use database::models::{OrderRow, Restaurant};
use database::{heartbeat, order, restaurant, Database};
use print_client::{
    ClientConfig, ClientError, CloudClient, EventFeed, HeartbeatMonitor, MonitorConfig,
    PrintLogRecorder, ReconnectConfig, SettingsResolver,
};
use print_core::{
    evaluate, ChangeOp, ConnectionStatus, HeartbeatPayload, HeartbeatRecord, NewPrintLog, OrderType, PrintEventType, PrintSettings,
    PrintSettingsPatch, RelayEvent, SystemPrinter,
};
use print_server::{app, AppState};
use relay::Relay;

async fn start_server() -> (CloudClient, AppState) {
    let db = Database::connect_with_pool_size("sqlite::memory:", 1).await.unwrap();
    db.migrate().await.unwrap();
    let state = AppState::new(db, Relay::default());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = app(state.clone());
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    let client = CloudClient::new(ClientConfig::new(format!("http://{}", addr))).unwrap();
    (client, state)
}

async fn seed_restaurant(state: &AppState, id: &str) {
    let r = Restaurant {
        id: id.to_string(),
        name: "Cantina Central".to_string(),
        phone: None,
        address: None,
        cnpj: None,
        logo_url: None,
    };
    restaurant::create_restaurant(state.db.pool(), &r).await.unwrap();
}

async fn seed_order(state: &AppState, restaurant_id: &str, id: &str, order_type: &str) {
    let row = OrderRow {
        id: id.to_string(),
        restaurant_id: restaurant_id.to_string(),
        order_number: Some(42),
        order_type: Some(order_type.to_string()),
        customer_name: None,
        total: Some(12.5),
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
    order::create_order(state.db.pool(), &row, &[]).await.unwrap();
}

/// Serves one heartbeat list, then accepts requests and never answers them.
async fn start_stalling_server(last_heartbeat_at: chrono::DateTime<Utc>) -> (CloudClient, Arc<AtomicUsize>) {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let record = HeartbeatRecord::new("r1", "agent-1", last_heartbeat_at);
    let body = serde_json::json!({
        "status": evaluate(Some(&record), Utc::now()),
        "agents": [],
        "heartbeats": [record],
    })
    .to_string();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let requests = Arc::new(AtomicUsize::new(0));
    let counter = requests.clone();
    tokio::spawn(async move {
        loop {
            let (mut socket, _) = listener.accept().await.unwrap();
            let body = body.clone();
            let counter = counter.clone();
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                let mut head = Vec::new();
                while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => head.extend_from_slice(&buf[..n]),
                    }
                }
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    let response = format!(
                        "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                        body.len(),
                        body
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                } else {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    drop(socket);
                }
            });
        }
    });

    let config = ClientConfig::new(format!("http://{}", addr)).with_timeout(Duration::from_secs(10));
    (CloudClient::new(config).unwrap(), requests)
}

async fn wait_for_status(
    rx: &mut tokio::sync::watch::Receiver<ConnectionStatus>,
    within: Duration,
    connected: bool,
) -> bool {
    tokio::time::timeout(within, async {
        while rx.borrow().is_connected != connected {
            rx.changed().await.unwrap();
        }
    })
    .await
    .is_ok()
}

fn unreachable_client() -> CloudClient {
    let config = ClientConfig::new("http://127.0.0.1:1").with_timeout(Duration::from_secs(2));
    CloudClient::new(config).unwrap()
}

#[tokio::test]
async fn test_health_and_connectivity() {
    let (client, _state) = start_server().await;
    assert!(!client.is_connected());
    assert!(client.health_check().await.unwrap());
    assert!(client.is_connected());

    let offline = unreachable_client();
    let err = offline.health_check().await.unwrap_err();
    assert!(err.is_transient());
    assert!(!offline.is_connected());
}

#[tokio::test]
async fn test_heartbeat_round_trip() {
    let (client, state) = start_server().await;
    seed_restaurant(&state, "r1").await;

    let mut payload = HeartbeatPayload::new("r1", "agent-1");
    payload.printers_count = Some(2);
    let ack = client.send_heartbeat(&payload).await.unwrap();
    assert!(ack.success);
    assert_eq!(ack.heartbeat.client_id, "agent-1");
    assert_eq!(ack.heartbeat.printers_count, Some(2));

    let list = client.fetch_heartbeats("r1").await.unwrap();
    assert!(list.status.is_connected);
    assert_eq!(list.agents.len(), 1);
    assert_eq!(list.heartbeats[0].client_name.as_deref(), Some("Print Agent"));
}

#[tokio::test]
async fn test_unknown_restaurant_is_not_found() {
    let (client, _state) = start_server().await;

    let err = client
        .send_heartbeat(&HeartbeatPayload::new("missing", "agent-1"))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert!(!err.is_transient());

    let err = client.fetch_print_config("missing").await.unwrap_err();
    assert!(matches!(err, ClientError::Status { status: 404, .. }));
}

#[tokio::test]
async fn test_sync_printers() {
    let (client, state) = start_server().await;
    seed_restaurant(&state, "r1").await;

    let printers = vec![SystemPrinter::new("POS-80"), SystemPrinter::new("Kitchen")];
    let result = client.sync_printers("r1", "agent-1", &printers).await.unwrap();
    assert!(result.success);
    assert_eq!((result.synced, result.registered), (2, 2));

    let config = client.fetch_print_config("r1").await.unwrap();
    assert_eq!(config.printers.len(), 2);
    assert!(config.printers.iter().all(|p| p.paper_width == Some(48)));

    let err = client.sync_printers("missing", "agent-1", &printers).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_print_queue_calls() {
    let (client, state) = start_server().await;
    seed_restaurant(&state, "r1").await;
    seed_order(&state, "r1", "o1", "table").await;

    assert!(client
        .create_print_intent("r1", "o1", PrintEventType::Print)
        .await
        .unwrap());

    let pending = client.fetch_pending_orders("r1").await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, "o1");

    let marked = client.mark_printed("r1", &["o1".to_string()]).await.unwrap();
    assert_eq!(marked, 1);
    assert!(client.fetch_pending_orders("r1").await.unwrap().is_empty());

    client.reprint("r1", "o1").await.unwrap();
    assert_eq!(client.clear_pending("r1").await.unwrap(), 1);
    assert!(client.fetch_pending_orders("r1").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_monitor_follows_heartbeats() {
    let (client, state) = start_server().await;
    seed_restaurant(&state, "r1").await;

    let config = MonitorConfig {
        poll_interval: Duration::from_millis(50),
        tick_interval: Duration::from_millis(20),
    };
    let mut monitor = HeartbeatMonitor::start(client.clone(), "r1", config);
    assert!(!monitor.status().is_connected);

    client
        .send_heartbeat(&HeartbeatPayload::new("r1", "agent-1"))
        .await
        .unwrap();

    let mut rx = monitor.subscribe();
    tokio::time::timeout(Duration::from_secs(5), async {
        while !rx.borrow().is_connected {
            rx.changed().await.unwrap();
        }
    })
    .await
    .expect("monitor did not report the agent as connected");

    let status = monitor.status();
    assert_eq!(status.client_name.as_deref(), Some("Print Agent"));
    assert_eq!(monitor.restaurant_id(), "r1");

    monitor.stop();
    monitor.stop();
}

#[tokio::test]
async fn test_monitor_goes_stale_without_new_heartbeats() {
    let (client, state) = start_server().await;
    seed_restaurant(&state, "r1").await;

    // Liveness is measured against the wall clock, so the row is back-dated.
    let seen = Utc::now() - chrono::Duration::milliseconds(29_000);
    heartbeat::upsert_heartbeat(state.db.pool(), &HeartbeatPayload::new("r1", "agent-1"), seen)
        .await
        .unwrap();

    let config = MonitorConfig {
        poll_interval: Duration::from_millis(100),
        tick_interval: Duration::from_millis(50),
    };
    let monitor = HeartbeatMonitor::start(client, "r1", config);
    let mut rx = monitor.subscribe();

    assert!(wait_for_status(&mut rx, Duration::from_secs(2), true).await);
    assert!(wait_for_status(&mut rx, Duration::from_secs(5), false).await);

    let status = monitor.status();
    assert!(!status.is_connected);
    assert!(status.time_since_last_heartbeat.unwrap() >= 30);
    assert_eq!(status.last_seen.map(|t| t.timestamp_millis()), Some(seen.timestamp_millis()));
}

#[tokio::test]
async fn test_monitor_reevaluates_while_poll_hangs() {
    let seen = Utc::now() - chrono::Duration::milliseconds(29_000);
    let (client, requests) = start_stalling_server(seen).await;

    let config = MonitorConfig {
        poll_interval: Duration::from_millis(200),
        tick_interval: Duration::from_millis(50),
    };
    let monitor = HeartbeatMonitor::start(client, "r1", config);
    let mut rx = monitor.subscribe();

    assert!(wait_for_status(&mut rx, Duration::from_secs(2), true).await);
    // The second poll stalls well past the disconnect threshold.
    assert!(wait_for_status(&mut rx, Duration::from_secs(5), false).await);
    assert!(requests.load(Ordering::SeqCst) >= 2);
    assert!(monitor.status().time_since_last_heartbeat.unwrap() >= 30);
}

#[tokio::test]
async fn test_client_debug_omits_transport() {
    let (client, _state) = start_server().await;
    let rendered = format!("{:?}", client);
    assert!(rendered.starts_with("CloudClient"));
    assert!(rendered.contains("connected: false"));
}

#[tokio::test]
async fn test_settings_resolver() {
    let (client, state) = start_server().await;
    seed_restaurant(&state, "r1").await;
    let resolver = SettingsResolver::new(client);

    assert_eq!(resolver.get("r1").await, PrintSettings::default());

    let patch = PrintSettingsPatch {
        auto_print_delivery: Some(false),
        ..Default::default()
    };
    let updated = resolver.update("r1", &patch).await.unwrap();
    assert!(!updated.auto_print_delivery);
    assert!(updated.auto_print_counter);

    assert!(!resolver.should_auto_print("r1", &OrderType::Delivery).await);
    assert!(resolver.should_auto_print("r1", &OrderType::Table).await);

    resolver.invalidate("r1").await;
    assert!(!resolver.get("r1").await.auto_print_delivery);

    // Changes made elsewhere stay hidden until the entry is invalidated.
    let other = PrintSettingsPatch {
        auto_print_table: Some(false),
        ..Default::default()
    };
    database::print_settings::update_print_settings(state.db.pool(), "r1", &other, Utc::now())
        .await
        .unwrap();
    let shared = resolver.clone();
    assert!(shared.get("r1").await.auto_print_table);
    resolver.invalidate("r1").await;
    assert!(!shared.get("r1").await.auto_print_table);
}

#[tokio::test]
async fn test_settings_resolver_fails_open() {
    let resolver = SettingsResolver::new(unreachable_client());

    assert_eq!(resolver.get("r1").await, PrintSettings::default());
    assert!(resolver.should_auto_print("r1", &OrderType::Counter).await);
    assert!(resolver.refetch("r1").await.is_err());
}

#[tokio::test]
async fn test_recorder() {
    let (client, state) = start_server().await;
    seed_restaurant(&state, "r1").await;
    let recorder = PrintLogRecorder::new(client.clone());

    let entry = recorder
        .record(
            &NewPrintLog::failure("r1", "o1", "paper out")
                .with_printer("Kitchen")
                .with_event_type(PrintEventType::AutoPrint),
        )
        .await
        .unwrap();
    assert_eq!(entry.error_message.as_deref(), Some("paper out"));
    assert_eq!(entry.event_type, PrintEventType::AutoPrint);

    let logs = client.list_print_logs("r1", 10).await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].printer_name.as_deref(), Some("Kitchen"));

    let offline = PrintLogRecorder::new(unreachable_client());
    assert!(offline.record(&NewPrintLog::success("r1", "o1")).await.is_none());
}

#[tokio::test]
async fn test_event_feed_receives_heartbeats() {
    let (client, state) = start_server().await;
    seed_restaurant(&state, "r1").await;

    let (mut feed, mut events) = EventFeed::new(client.clone(), ReconnectConfig::default());
    feed.start("r1");
    assert!(feed.is_running());
    assert_eq!(feed.restaurant_id(), Some("r1"));

    // Keep publishing until the subscription is established.
    let event = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            client
                .send_heartbeat(&HeartbeatPayload::new("r1", "agent-1"))
                .await
                .unwrap();
            if let Ok(Some(event)) =
                tokio::time::timeout(Duration::from_millis(200), events.recv()).await
            {
                return event;
            }
        }
    })
    .await
    .expect("no event received");

    match event {
        RelayEvent::HeartbeatChanged { op, heartbeat } => {
            assert!(matches!(op, ChangeOp::Insert | ChangeOp::Update));
            assert_eq!(heartbeat.restaurant_id, "r1");
        }
        other => panic!("unexpected event: {:?}", other),
    }

    feed.stop();
    feed.stop();
    assert!(!feed.is_running());
}
