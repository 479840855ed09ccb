//! The agent loop: heartbeats, print queue polling and printing.
//!
//! The agent owns no state on the service side. Every cycle it fetches the
//! pending orders of its restaurant, prints the ones it is not already
//! handling, marks them printed and reports each attempt with a print log
//! entry and a heartbeat. All reporting is best-effort: a failed upload is
//! logged and the next cycle carries on.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use print_client::{ClientConfig, CloudClient, PrintLogRecorder};
use print_core::{
    HeartbeatPayload, NewPrintLog, OrderType, PrintConfig, PrintOrder, PrinterConfig,
    PrinterSyncResult, RestaurantInfo, SystemPrinter,
};
use serde::Serialize;
use tokio::sync::{broadcast, oneshot};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, warn};

use crate::config::AgentConfig;
use crate::driver::{PrintJob, PrintTarget, PrinterDriver};
use crate::error::{AgentError, DeviceError, Result};
use crate::receipt::{render_order, render_test_page, PrintLayout};

/// How long an order stays claimed after an attempt, so a queue entry that
/// was not marked printed is not printed again by the next cycle.
pub const IN_FLIGHT_HOLD: Duration = Duration::from_secs(30);

/// Age after which the cached print config is fetched again.
pub const CONFIG_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

/// Consecutive heartbeat failures before the operator is told.
const HEARTBEAT_FAILURES_BEFORE_REPORT: u32 = 3;

const EVENT_CAPACITY: usize = 100;

/// Notification for the local control surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum AgentEvent {
    ConnectionStatus { connected: bool, message: String },
    Log { message: String },
    PrintSuccess { order_id: String, order_type: String },
    Stats(AgentStats),
}

/// Counters shown by the control surface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AgentStats {
    pub printed_count: u64,
    pub failed_count: u64,
    pub is_connected: bool,
    pub is_printing: bool,
    pub pending_orders: u32,
}

/// Printer chosen for an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedPrinter {
    pub name: String,
    /// Paper width set on the service for this printer.
    pub paper_width: Option<u32>,
}

impl SelectedPrinter {
    fn local(name: &str) -> Self {
        Self {
            name: name.to_string(),
            paper_width: None,
        }
    }
}

/// Choose the printer for an order.
///
/// Service printers come first: the first active one linked to the order
/// type, else the first active one. Then the local choices: the printer set
/// for the order type, the local default, the fallback printer name and
/// finally the first selected printer.
pub fn select_printer(
    order_type: &OrderType,
    cloud_printers: &[PrinterConfig],
    config: &AgentConfig,
) -> Option<SelectedPrinter> {
    let usable: Vec<(&PrinterConfig, &str)> = cloud_printers
        .iter()
        .filter(|p| p.is_active)
        .filter_map(|p| {
            p.printer_name
                .as_deref()
                .filter(|name| !name.trim().is_empty())
                .map(|name| (p, name))
        })
        .collect();

    let cloud = usable
        .iter()
        .find(|(p, _)| p.handles(order_type.as_str()))
        .or_else(|| usable.first());
    if let Some((printer, name)) = cloud {
        return Some(SelectedPrinter {
            name: name.to_string(),
            paper_width: printer.paper_width,
        });
    }

    if let Some(name) = config.printers.for_order_type(order_type) {
        return Some(SelectedPrinter::local(name));
    }

    [config.printers.default.as_str(), config.printer_name.as_str()]
        .into_iter()
        .chain(config.selected_printers.iter().map(String::as_str))
        .find(|name| !name.trim().is_empty())
        .map(SelectedPrinter::local)
}

struct CachedConfig {
    print_config: PrintConfig,
    fetched_at: Instant,
}

/// Connection to the print service.
#[derive(Clone)]
struct Connection {
    client: CloudClient,
    recorder: PrintLogRecorder,
}

enum Attempt {
    Printed,
    Failed,
    Skipped,
}

struct Inner {
    driver: Arc<dyn PrinterDriver>,
    config: Mutex<AgentConfig>,
    config_path: Option<PathBuf>,
    connection: Mutex<Option<Connection>>,
    cached: Mutex<Option<CachedConfig>>,
    /// Order id to the time its last attempt finished; `None` while printing.
    in_flight: Mutex<HashMap<String, Option<Instant>>>,
    poll_lock: tokio::sync::Mutex<()>,
    connected: AtomicBool,
    is_printing: AtomicBool,
    pending_orders: AtomicU32,
    printed_count: AtomicU64,
    failed_count: AtomicU64,
    heartbeat_failures: AtomicU32,
    events: broadcast::Sender<AgentEvent>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A print agent for one restaurant.
#[derive(Clone)]
pub struct Agent {
    inner: Arc<Inner>,
}

impl Agent {
    /// Create an agent. When `config_path` is set, configuration changes are
    /// written back to it.
    pub fn new(config: AgentConfig, driver: Arc<dyn PrinterDriver>, config_path: Option<PathBuf>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                driver,
                config: Mutex::new(config),
                config_path,
                connection: Mutex::new(None),
                cached: Mutex::new(None),
                in_flight: Mutex::new(HashMap::new()),
                poll_lock: tokio::sync::Mutex::new(()),
                connected: AtomicBool::new(false),
                is_printing: AtomicBool::new(false),
                pending_orders: AtomicU32::new(0),
                printed_count: AtomicU64::new(0),
                failed_count: AtomicU64::new(0),
                heartbeat_failures: AtomicU32::new(0),
                events,
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AgentEvent> {
        self.inner.events.subscribe()
    }

    pub fn driver(&self) -> &Arc<dyn PrinterDriver> {
        &self.inner.driver
    }

    /// Current configuration.
    pub fn config(&self) -> AgentConfig {
        lock(&self.inner.config).clone()
    }

    /// Change the configuration and persist it.
    pub fn update_config(&self, update: impl FnOnce(&mut AgentConfig)) -> Result<AgentConfig> {
        let config = {
            let mut config = lock(&self.inner.config);
            update(&mut config);
            config.clone()
        };
        if let Some(path) = &self.inner.config_path {
            config.save(path)?;
        }
        Ok(config)
    }

    pub fn stats(&self) -> AgentStats {
        AgentStats {
            printed_count: self.inner.printed_count.load(Ordering::SeqCst),
            failed_count: self.inner.failed_count.load(Ordering::SeqCst),
            is_connected: self.inner.connected.load(Ordering::SeqCst),
            is_printing: self.inner.is_printing.load(Ordering::SeqCst),
            pending_orders: self.inner.pending_orders.load(Ordering::SeqCst),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    fn emit(&self, event: AgentEvent) {
        // No receiver is fine.
        let _ = self.inner.events.send(event);
    }

    fn log(&self, message: impl Into<String>) {
        self.emit(AgentEvent::Log {
            message: message.into(),
        });
    }

    fn connection(&self) -> Option<Connection> {
        lock(&self.inner.connection).clone()
    }

    fn set_connected(&self, connected: bool, message: &str) {
        let previous = self.inner.connected.swap(connected, Ordering::SeqCst);
        if previous != connected {
            if connected {
                info!("Print service reachable again");
            } else {
                warn!(reason = %message, "Print service unreachable");
            }
            self.emit(AgentEvent::ConnectionStatus {
                connected,
                message: message.to_string(),
            });
        }
    }

    /// (Re)connect to the print service with the current configuration.
    ///
    /// On success a heartbeat is sent right away and the print config is
    /// fetched again on the next poll.
    pub async fn connect(&self) -> bool {
        let config = self.config();
        let status = |connected: bool, message: String| AgentEvent::ConnectionStatus { connected, message };

        if !config.is_configured() {
            self.inner.connected.store(false, Ordering::SeqCst);
            self.emit(status(false, "Restaurant not configured".to_string()));
            return false;
        }

        let client = match CloudClient::new(ClientConfig::new(config.server_url.as_str())) {
            Ok(client) => client,
            Err(e) => {
                error!(error = %e, "Failed to create service client");
                self.inner.connected.store(false, Ordering::SeqCst);
                self.emit(status(false, e.to_string()));
                return false;
            }
        };

        // Keep the client even when the service is down so polling can
        // pick up once it is back.
        *lock(&self.inner.connection) = Some(Connection {
            recorder: PrintLogRecorder::new(client.clone()),
            client: client.clone(),
        });
        *lock(&self.inner.cached) = None;

        let reachable = match client.health_check().await {
            Ok(ok) => ok,
            Err(e) => {
                warn!(server = %config.server_url, error = %e, "Health check failed");
                false
            }
        };

        self.inner.connected.store(reachable, Ordering::SeqCst);
        if reachable {
            info!(server = %config.server_url, restaurant_id = %config.restaurant_id, "Connected to print service");
            self.emit(status(true, "Connected".to_string()));
            if let Err(e) = self.sync_printers().await {
                warn!(error = %e, "Printer sync failed");
                self.log(format!("Printer sync failed: {}", e));
            }
            self.send_heartbeat().await;
        } else {
            self.emit(status(false, format!("Cannot reach {}", config.server_url)));
        }
        reachable
    }

    /// Report the spooler printers to the service, which registers the ones
    /// it does not know yet. Nothing is sent when no printer is found.
    pub async fn sync_printers(&self) -> Result<PrinterSyncResult> {
        let connection = self.connection().ok_or(AgentError::NotConfigured("server_url"))?;
        let config = self.config();

        let printers: Vec<SystemPrinter> = self
            .inner
            .driver
            .list_system_printers()
            .await?
            .into_iter()
            .map(|printer| SystemPrinter {
                name: printer.name,
                display_name: None,
                description: None,
                is_default: printer.is_default,
            })
            .collect();

        if printers.is_empty() {
            self.log("No system printers found to sync");
            return Ok(PrinterSyncResult {
                success: true,
                ..Default::default()
            });
        }

        let result = connection
            .client
            .sync_printers(&config.restaurant_id, &config.client_id, &printers)
            .await?;
        info!(
            restaurant_id = %config.restaurant_id,
            synced = result.synced,
            registered = result.registered,
            "Printers synced"
        );
        self.log(format!(
            "Synced {} printer(s) with the server, {} new",
            result.synced, result.registered
        ));
        if result.registered > 0 {
            *lock(&self.inner.cached) = None;
        }
        Ok(result)
    }

    /// Report liveness. Failures are counted and surfaced after a few in a row.
    pub async fn send_heartbeat(&self) -> bool {
        let Some(connection) = self.connection() else {
            return false;
        };
        let config = self.config();

        let printers_count = match self.inner.driver.list_system_printers().await {
            Ok(printers) => printers.len() as u32,
            Err(e) => {
                debug!(error = %e, "Printer enumeration failed, reporting none");
                0
            }
        };

        let payload = HeartbeatPayload {
            restaurant_id: config.restaurant_id.clone(),
            client_id: config.client_id.clone(),
            client_name: Some(config.client_name.clone()),
            client_version: Some(env!("CARGO_PKG_VERSION").to_string()),
            platform: Some(std::env::consts::OS.to_string()),
            printers_count: Some(printers_count),
            is_printing: Some(self.inner.is_printing.load(Ordering::SeqCst)),
            pending_orders: Some(self.inner.pending_orders.load(Ordering::SeqCst)),
        };

        match connection.client.send_heartbeat(&payload).await {
            Ok(_) => {
                self.inner.heartbeat_failures.store(0, Ordering::SeqCst);
                self.set_connected(true, "Connected");
                true
            }
            Err(e) => {
                let failures = self.inner.heartbeat_failures.fetch_add(1, Ordering::SeqCst) + 1;
                if e.is_transient() {
                    self.set_connected(false, "Print service unreachable");
                }
                if failures >= HEARTBEAT_FAILURES_BEFORE_REPORT {
                    warn!(error = %e, failures, "Heartbeat failed");
                    self.log(format!("Heartbeat failed: {}", e));
                } else {
                    debug!(error = %e, failures, "Heartbeat failed");
                }
                false
            }
        }
    }

    /// Fetch the print config from the service now.
    pub async fn refresh_config(&self) -> bool {
        let Some(connection) = self.connection() else {
            return false;
        };
        let restaurant_id = self.config().restaurant_id;

        match connection.client.fetch_print_config(&restaurant_id).await {
            Ok(print_config) => {
                info!(
                    restaurant_id = %restaurant_id,
                    printers = print_config.printers.len(),
                    "Print config loaded"
                );
                self.log(format!("Restaurant: {}", print_config.restaurant.name));
                self.log(format!(
                    "{} printer(s) configured on the server",
                    print_config.printers.len()
                ));
                *lock(&self.inner.cached) = Some(CachedConfig {
                    print_config,
                    fetched_at: Instant::now(),
                });
                true
            }
            Err(e) => {
                warn!(restaurant_id = %restaurant_id, error = %e, "Failed to load print config");
                self.log(format!("Failed to load print config: {}", e));
                false
            }
        }
    }

    fn config_is_stale(&self) -> bool {
        lock(&self.inner.cached)
            .as_ref()
            .map_or(true, |cached| cached.fetched_at.elapsed() >= CONFIG_REFRESH_INTERVAL)
    }

    /// Restaurant identity, effective layout and service printers.
    ///
    /// The layout is the saved local layout with the service's stored layout
    /// laid over it. Without a fetched config only local settings apply.
    pub fn print_context(&self) -> (RestaurantInfo, PrintLayout, Vec<PrinterConfig>) {
        let local_layout = lock(&self.inner.config).layout.clone();
        match lock(&self.inner.cached).as_ref() {
            Some(cached) => (
                cached.print_config.restaurant.clone(),
                local_layout.merged(&cached.print_config.settings.print_layout),
                cached.print_config.printers.clone(),
            ),
            None => (RestaurantInfo::default(), local_layout, Vec::new()),
        }
    }

    fn prune_in_flight(&self, now: Instant) {
        lock(&self.inner.in_flight)
            .retain(|_, finished| finished.map_or(true, |at| now.duration_since(at) < IN_FLIGHT_HOLD));
    }

    fn claim(&self, order_id: &str) -> bool {
        let mut in_flight = lock(&self.inner.in_flight);
        if in_flight.contains_key(order_id) {
            return false;
        }
        in_flight.insert(order_id.to_string(), None);
        true
    }

    fn release(&self, order_id: &str) {
        lock(&self.inner.in_flight).insert(order_id.to_string(), Some(Instant::now()));
    }

    /// Run one queue cycle. Returns the number of print attempts made.
    ///
    /// A cycle that starts while another is still running does nothing.
    pub async fn poll_once(&self) -> Result<usize> {
        let Ok(_guard) = self.inner.poll_lock.try_lock() else {
            debug!("Previous poll still running, skipping");
            return Ok(0);
        };

        let config = self.config();
        if !config.is_configured() {
            return Ok(0);
        }
        let Some(connection) = self.connection() else {
            return Ok(0);
        };

        if self.config_is_stale() {
            self.refresh_config().await;
        }

        let orders = connection
            .client
            .fetch_pending_orders(&config.restaurant_id)
            .await?;
        self.set_connected(true, "Connected");
        self.inner
            .pending_orders
            .store(orders.len() as u32, Ordering::SeqCst);

        self.prune_in_flight(Instant::now());
        let new_orders: Vec<PrintOrder> = {
            let in_flight = lock(&self.inner.in_flight);
            orders
                .into_iter()
                .filter(|order| !in_flight.contains_key(&order.id))
                .collect()
        };
        if new_orders.is_empty() {
            return Ok(0);
        }

        self.log(format!("{} pending order(s)", new_orders.len()));

        let mut attempts = 0;
        for order in &new_orders {
            if !self.claim(&order.id) {
                continue;
            }
            match self.print_order(&connection, &config, order).await {
                Attempt::Printed | Attempt::Failed => attempts += 1,
                Attempt::Skipped => {}
            }
            self.release(&order.id);
        }
        Ok(attempts)
    }

    async fn print_order(&self, connection: &Connection, config: &AgentConfig, order: &PrintOrder) -> Attempt {
        let label = order.label();
        let order_type = order.order_type();
        let (restaurant, layout, printers) = self.print_context();

        let Some(printer) = select_printer(&order_type, &printers, config) else {
            error!(order = %label, order_type = %order_type, "No printer configured");
            self.log(format!("{}: no printer configured", label));
            return Attempt::Skipped;
        };

        let layout = match printer.paper_width {
            Some(width) => layout.with_paper_width(width as usize),
            None => layout,
        };
        let receipt = render_order(order, &layout, &restaurant);
        let job = PrintJob {
            target: PrintTarget::parse(&printer.name),
            data: receipt.to_escpos(&layout),
            label: label.clone(),
        };

        info!(order = %label, printer = %printer.name, "Printing order");
        self.log(format!("Printing order {}...", label));

        self.inner.is_printing.store(true, Ordering::SeqCst);
        let result = self.inner.driver.print(&job).await;
        self.inner.is_printing.store(false, Ordering::SeqCst);

        let error_message = result.error_message.as_deref().unwrap_or("print failed");
        let entry = if result.is_success() {
            NewPrintLog::success(&config.restaurant_id, &order.id)
        } else {
            NewPrintLog::failure(&config.restaurant_id, &order.id, error_message)
        }
        .with_order_number(order.display_number())
        .with_printer(&printer.name)
        .with_items_count(order.items_count())
        .with_event_type(order.print_event);

        let attempt = if result.is_success() {
            match connection
                .client
                .mark_printed(&config.restaurant_id, &[order.id.clone()])
                .await
            {
                Ok(_) => self.log(format!("Order {} marked as printed", label)),
                Err(e) => {
                    warn!(order = %label, error = %e, "Failed to mark order as printed");
                    self.log(format!("Failed to mark order {} as printed: {}", label, e));
                }
            }

            let _ = self.inner.pending_orders.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                Some(n.saturating_sub(1))
            });
            self.inner.printed_count.fetch_add(1, Ordering::SeqCst);
            self.log(format!("Order {} printed", label));
            self.emit(AgentEvent::PrintSuccess {
                order_id: order.id.clone(),
                order_type: order_type.to_string(),
            });
            self.emit(AgentEvent::Stats(self.stats()));
            Attempt::Printed
        } else {
            self.inner.failed_count.fetch_add(1, Ordering::SeqCst);
            error!(order = %label, printer = %printer.name, error = %error_message, "Print failed");
            self.log(format!("{}: {}", label, error_message));
            Attempt::Failed
        };

        connection.recorder.record(&entry).await;
        self.send_heartbeat().await;
        attempt
    }

    /// Print a test page on the fallback printer.
    ///
    /// Uses `layout` when given, else the saved layout. Returns the printer
    /// name.
    pub async fn test_print(&self, layout: Option<PrintLayout>) -> Result<String> {
        let config = self.config();
        let printer = [config.printer_name.as_str(), config.printers.default.as_str()]
            .into_iter()
            .chain(config.selected_printers.iter().map(String::as_str))
            .find(|name| !name.trim().is_empty())
            .map(str::to_string)
            .ok_or(AgentError::NoPrinter)?;
        let layout = layout.unwrap_or(config.layout);

        let receipt = render_test_page(&layout, &printer, Utc::now());
        let job = PrintJob {
            target: PrintTarget::parse(&printer),
            data: receipt.to_escpos(&layout),
            label: "test page".to_string(),
        };

        self.log(format!("Test print on \"{}\" ({} columns)", printer, layout.paper_width));
        let result = self.inner.driver.print(&job).await;
        if result.is_success() {
            self.log("Test page sent");
            Ok(printer)
        } else {
            let message = result.error_message.unwrap_or_else(|| "print failed".to_string());
            self.log(format!("Test print failed: {}", message));
            Err(DeviceError::Print(message).into())
        }
    }

    fn report_poll_error(&self, e: &AgentError) {
        match e {
            AgentError::Client(client_error) if client_error.is_transient() => {
                debug!(error = %e, "Poll failed");
                self.set_connected(false, "Print service unreachable");
            }
            _ => {
                warn!(error = %e, "Poll failed");
                self.log(format!("Poll failed: {}", e));
            }
        }
    }

    /// Run until `shutdown` fires.
    ///
    /// Heartbeats run on their own task so a slow print never delays them.
    /// Polls are awaited back to back with the check interval in between.
    pub async fn run(&self, mut shutdown: oneshot::Receiver<()>) {
        self.connect().await;

        let heartbeat = {
            let agent = self.clone();
            tokio::spawn(async move {
                loop {
                    tokio::time::sleep(agent.config().heartbeat_interval()).await;
                    if agent.connection().is_some() && agent.is_connected() {
                        agent.send_heartbeat().await;
                    } else {
                        agent.connect().await;
                    }
                }
            })
        };

        let mut next_poll = Instant::now();
        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = sleep_until(next_poll) => {
                    if let Err(e) = self.poll_once().await {
                        self.report_poll_error(&e);
                    }
                    next_poll = Instant::now() + self.config().check_interval();
                }
            }
        }

        heartbeat.abort();
        info!("Print agent stopped");
    }
}
