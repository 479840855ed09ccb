//! Agent tests against a live print service and a mock printer.

use std::sync::Arc;

use database::models::{OrderItemRow, OrderRow, PrinterRow, Restaurant};
use database::{heartbeat, order, print_config, print_log, print_settings, restaurant, Database};
use print_agent::{
    Agent, AgentConfig, AgentError, AgentEvent, Bridge, ConfigUpdate, MockDriver, PrintTarget,
};
use print_core::{PrintEventType, PrintOutcome, PrintSettings};
use print_server::{app, AppState};
use relay::Relay;

async fn start_server() -> (String, AppState) {
    let db = Database::connect_with_pool_size("sqlite::memory:", 1).await.unwrap();
    db.migrate().await.unwrap();
    let state = AppState::new(db, Relay::default());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = app(state.clone());
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    (format!("http://{}", addr), state)
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

async fn seed_pending_order(state: &AppState, restaurant_id: &str, id: &str, order_type: &str) {
    let row = OrderRow {
        id: id.to_string(),
        restaurant_id: restaurant_id.to_string(),
        order_number: Some(42),
        order_type: Some(order_type.to_string()),
        customer_name: Some("Ana".to_string()),
        total: Some(25.0),
        notes: None,
        delivery_address: None,
        delivery_phone: None,
        delivery_fee: None,
        table_number: Some(4),
        waiter_name: None,
        print_status: "pending".to_string(),
        print_event: None,
        printed_at: None,
        print_count: 0,
        created_at: 1_000,
    };
    let item = OrderItemRow {
        id: format!("{}-i1", id),
        order_id: id.to_string(),
        product_name: "Feijoada".to_string(),
        product_size: None,
        quantity: 2,
        notes: None,
        product_price: 12.5,
        category_id: None,
        position: 0,
    };
    order::create_order(state.db.pool(), &row, &[item]).await.unwrap();
}

fn agent_config(server_url: &str) -> AgentConfig {
    AgentConfig {
        server_url: server_url.to_string(),
        restaurant_id: "r1".to_string(),
        client_id: "agent-1".to_string(),
        printer_name: "Kitchen".to_string(),
        ..Default::default()
    }
}

fn drain(events: &mut tokio::sync::broadcast::Receiver<AgentEvent>) -> Vec<AgentEvent> {
    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    seen
}

#[tokio::test]
async fn test_prints_pending_order_once() {
    let (url, state) = start_server().await;
    seed_restaurant(&state, "r1").await;
    seed_pending_order(&state, "r1", "o1", "table").await;

    let driver = Arc::new(MockDriver::new().with_system_printer("Kitchen", true));
    let agent = Agent::new(agent_config(&url), driver.clone(), None);
    let mut events = agent.subscribe();

    assert!(agent.connect().await);
    let hb = heartbeat::get_heartbeat(state.db.pool(), "r1", "agent-1").await.unwrap();
    assert_eq!(hb.printers_count, 1);
    assert_eq!(hb.platform.as_deref(), Some(std::env::consts::OS));

    assert_eq!(agent.poll_once().await.unwrap(), 1);

    let jobs = driver.jobs();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].target, PrintTarget::Spooler("Kitchen".to_string()));
    assert_eq!(jobs[0].label, "#42");
    assert!(!jobs[0].data.is_empty());

    let pending = order::list_pending_orders(state.db.pool(), "r1").await.unwrap();
    assert!(pending.is_empty());

    let logs = print_log::list_print_logs(state.db.pool(), "r1", 10).await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].status, PrintOutcome::Success);
    assert_eq!(logs[0].event_type, PrintEventType::Print);
    assert_eq!(logs[0].order_number.as_deref(), Some("42"));
    assert_eq!(logs[0].printer_name.as_deref(), Some("Kitchen"));
    assert_eq!(logs[0].items_count, 1);

    let stats = agent.stats();
    assert_eq!(stats.printed_count, 1);
    assert!(stats.is_connected);
    assert!(!stats.is_printing);

    let seen = drain(&mut events);
    assert!(seen.contains(&AgentEvent::PrintSuccess {
        order_id: "o1".to_string(),
        order_type: "table".to_string(),
    }));

    // Printed orders leave the queue, nothing more to do.
    assert_eq!(agent.poll_once().await.unwrap(), 0);
    assert_eq!(driver.job_count(), 1);
}

#[tokio::test]
async fn test_failed_print_is_logged_and_held() {
    let (url, state) = start_server().await;
    seed_restaurant(&state, "r1").await;
    seed_pending_order(&state, "r1", "o1", "counter").await;

    let driver = Arc::new(MockDriver::new());
    driver.fail_next("paper out");
    let agent = Agent::new(agent_config(&url), driver.clone(), None);
    assert!(agent.connect().await);

    assert_eq!(agent.poll_once().await.unwrap(), 1);

    let logs = print_log::list_print_logs(state.db.pool(), "r1", 10).await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].status, PrintOutcome::Error);
    assert_eq!(logs[0].error_message.as_deref(), Some("paper out"));

    // Still queued, but held back from the next cycle.
    let pending = order::list_pending_orders(state.db.pool(), "r1").await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(agent.poll_once().await.unwrap(), 0);
    assert_eq!(driver.job_count(), 1);

    let stats = agent.stats();
    assert_eq!(stats.failed_count, 1);
    assert_eq!(stats.printed_count, 0);

    // The failure is reported without touching liveness or settings.
    let hb = heartbeat::get_heartbeat(state.db.pool(), "r1", "agent-1").await.unwrap();
    assert!(!hb.is_printing);
    assert_eq!(hb.pending_orders, 1);
    assert!(agent.is_connected());
    let settings = print_settings::get_print_settings(state.db.pool(), "r1").await.unwrap();
    assert_eq!(settings, PrintSettings::default());
}

#[tokio::test]
async fn test_no_printer_leaves_order_queued() {
    let (url, state) = start_server().await;
    seed_restaurant(&state, "r1").await;
    seed_pending_order(&state, "r1", "o1", "delivery").await;

    let driver = Arc::new(MockDriver::new());
    let config = AgentConfig {
        printer_name: String::new(),
        ..agent_config(&url)
    };
    let agent = Agent::new(config, driver.clone(), None);
    assert!(agent.connect().await);

    assert_eq!(agent.poll_once().await.unwrap(), 0);
    assert_eq!(driver.job_count(), 0);

    let logs = print_log::list_print_logs(state.db.pool(), "r1", 10).await.unwrap();
    assert!(logs.is_empty());
    let pending = order::list_pending_orders(state.db.pool(), "r1").await.unwrap();
    assert_eq!(pending.len(), 1);
}

#[tokio::test]
async fn test_service_printer_takes_precedence() {
    let (url, state) = start_server().await;
    seed_restaurant(&state, "r1").await;
    seed_pending_order(&state, "r1", "o1", "table").await;
    print_config::create_printer(
        state.db.pool(),
        &PrinterRow {
            id: "p1".to_string(),
            restaurant_id: "r1".to_string(),
            name: "Salon".to_string(),
            printer_name: Some("tcp://10.0.0.9".to_string()),
            paper_width: Some(32),
            linked_order_types: r#"["table"]"#.to_string(),
            is_active: true,
        },
    )
    .await
    .unwrap();

    let driver = Arc::new(MockDriver::new());
    let agent = Agent::new(agent_config(&url), driver.clone(), None);
    assert!(agent.connect().await);
    assert_eq!(agent.poll_once().await.unwrap(), 1);

    let jobs = driver.jobs();
    assert_eq!(
        jobs[0].target,
        PrintTarget::Network {
            host: "10.0.0.9".to_string(),
            port: 9100
        }
    );
    let logs = print_log::list_print_logs(state.db.pool(), "r1", 10).await.unwrap();
    assert_eq!(logs[0].printer_name.as_deref(), Some("tcp://10.0.0.9"));
}

#[tokio::test]
async fn test_connect_syncs_system_printers() {
    let (url, state) = start_server().await;
    seed_restaurant(&state, "r1").await;
    seed_pending_order(&state, "r1", "o1", "delivery").await;

    let driver = Arc::new(
        MockDriver::new()
            .with_system_printer("POS-80", true)
            .with_system_printer("Bar", false),
    );
    let config = AgentConfig {
        printer_name: String::new(),
        ..agent_config(&url)
    };
    let agent = Agent::new(config, driver.clone(), None);
    assert!(agent.connect().await);

    let printers = print_config::list_printers(state.db.pool(), "r1").await.unwrap();
    let names: Vec<_> = printers.iter().filter_map(|p| p.printer_name.as_deref()).collect();
    assert_eq!(names, vec!["Bar", "POS-80"]);
    assert!(printers.iter().all(|p| p.paper_width == Some(48) && p.is_active));
    let available = print_config::list_available_printers(state.db.pool(), "r1").await.unwrap();
    assert_eq!(available.len(), 2);
    assert!(available.iter().all(|p| p.client_id == "agent-1"));

    // Registered printers are usable without any local printer setting.
    assert_eq!(agent.poll_once().await.unwrap(), 1);
    assert_eq!(driver.jobs()[0].target, PrintTarget::Spooler("Bar".to_string()));

    let result = agent.sync_printers().await.unwrap();
    assert_eq!((result.synced, result.registered), (2, 0));
}

#[tokio::test]
async fn test_unreachable_service_is_transient() {
    let driver = Arc::new(MockDriver::new());
    let agent = Agent::new(agent_config("http://127.0.0.1:1"), driver.clone(), None);

    assert!(!agent.connect().await);
    assert!(!agent.stats().is_connected);

    match agent.poll_once().await {
        Err(AgentError::Client(e)) => assert!(e.is_transient()),
        other => panic!("expected a transient client error, got {:?}", other.map(|_| ())),
    }
    assert_eq!(driver.job_count(), 0);
}

#[tokio::test]
async fn test_bridge_save_config_connects() {
    let (url, state) = start_server().await;
    seed_restaurant(&state, "r1").await;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("print-agent.json");
    let config = AgentConfig {
        client_id: "agent-1".to_string(),
        ..Default::default()
    };
    let agent = Agent::new(config, Arc::new(MockDriver::new()), Some(path.clone()));
    let bridge = Bridge::new(agent.clone());

    let result = bridge
        .save_config(ConfigUpdate {
            server_url: Some(url),
            restaurant_id: Some("r1".to_string()),
            printer_name: Some("Kitchen".to_string()),
            ..Default::default()
        })
        .await;
    assert!(result.success);
    assert!(agent.is_connected());

    let saved = AgentConfig::load(&path).unwrap();
    assert_eq!(saved.restaurant_id, "r1");
    assert_eq!(saved.printer_name, "Kitchen");

    heartbeat::get_heartbeat(state.db.pool(), "r1", "agent-1").await.unwrap();
    assert!(bridge.test_print().await.success);
}
